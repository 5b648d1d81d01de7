// src/sack/set.rs

//! Bitmap set of pool package ids

use super::PackageId;
use std::ops::{BitAndAssign, BitOrAssign, SubAssign};

const BITS: usize = 64;

/// A set of packages, stored as a bitmap over pool ids
#[derive(Debug, Clone, Default)]
pub struct PackageSet {
    words: Vec<u64>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set able to hold `capacity` ids without reallocating
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: Vec::with_capacity(capacity.div_ceil(BITS)),
        }
    }

    /// Set containing every id below `len`
    pub fn full(len: usize) -> Self {
        let mut words = vec![u64::MAX; len / BITS];
        let rest = len % BITS;
        if rest != 0 {
            words.push((1u64 << rest) - 1);
        }
        Self { words }
    }

    pub fn add(&mut self, id: PackageId) {
        let (word, bit) = position(id);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << bit;
    }

    pub fn remove(&mut self, id: PackageId) {
        let (word, bit) = position(id);
        if let Some(w) = self.words.get_mut(word) {
            *w &= !(1 << bit);
        }
    }

    pub fn contains(&self, id: PackageId) -> bool {
        let (word, bit) = position(id);
        self.words
            .get(word)
            .map(|w| w & (1 << bit) != 0)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    pub fn clear(&mut self) {
        self.words.clear();
    }

    /// Iterate ids in ascending order
    pub fn iter(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            let mut w = *word;
            std::iter::from_fn(move || {
                if w == 0 {
                    return None;
                }
                let bit = w.trailing_zeros() as usize;
                w &= w - 1;
                Some(PackageId::new(i * BITS + bit))
            })
        })
    }

    pub fn union_with(&mut self, other: &PackageSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
    }

    pub fn intersect_with(&mut self, other: &PackageSet) {
        for (i, a) in self.words.iter_mut().enumerate() {
            *a &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    pub fn difference_with(&mut self, other: &PackageSet) {
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
    }

    pub fn is_subset(&self, other: &PackageSet) -> bool {
        self.words
            .iter()
            .enumerate()
            .all(|(i, a)| a & !other.words.get(i).copied().unwrap_or(0) == 0)
    }
}

fn position(id: PackageId) -> (usize, usize) {
    (id.index() / BITS, id.index() % BITS)
}

impl PartialEq for PackageSet {
    fn eq(&self, other: &Self) -> bool {
        let len = self.words.len().max(other.words.len());
        (0..len).all(|i| {
            self.words.get(i).copied().unwrap_or(0) == other.words.get(i).copied().unwrap_or(0)
        })
    }
}

impl Eq for PackageSet {}

impl FromIterator<PackageId> for PackageSet {
    fn from_iter<I: IntoIterator<Item = PackageId>>(iter: I) -> Self {
        let mut set = PackageSet::new();
        for id in iter {
            set.add(id);
        }
        set
    }
}

impl Extend<PackageId> for PackageSet {
    fn extend<I: IntoIterator<Item = PackageId>>(&mut self, iter: I) {
        for id in iter {
            self.add(id);
        }
    }
}

impl BitOrAssign<&PackageSet> for PackageSet {
    fn bitor_assign(&mut self, rhs: &PackageSet) {
        self.union_with(rhs);
    }
}

impl BitAndAssign<&PackageSet> for PackageSet {
    fn bitand_assign(&mut self, rhs: &PackageSet) {
        self.intersect_with(rhs);
    }
}

impl SubAssign<&PackageSet> for PackageSet {
    fn sub_assign(&mut self, rhs: &PackageSet) {
        self.difference_with(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[usize]) -> PackageSet {
        ids.iter().map(|i| PackageId::new(*i)).collect()
    }

    fn ids(s: &PackageSet) -> Vec<usize> {
        s.iter().map(|id| id.index()).collect()
    }

    #[test]
    fn test_add_remove_contains() {
        let mut s = PackageSet::new();
        s.add(PackageId::new(3));
        s.add(PackageId::new(130));
        assert!(s.contains(PackageId::new(3)));
        assert!(s.contains(PackageId::new(130)));
        assert!(!s.contains(PackageId::new(4)));
        assert_eq!(s.len(), 2);

        s.remove(PackageId::new(3));
        assert!(!s.contains(PackageId::new(3)));
        s.remove(PackageId::new(9999));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let s = set(&[70, 1, 64, 5]);
        assert_eq!(ids(&s), vec![1, 5, 64, 70]);
    }

    #[test]
    fn test_set_algebra() {
        let a = set(&[1, 2, 3, 100]);
        let b = set(&[2, 3, 4]);

        let mut u = a.clone();
        u |= &b;
        assert_eq!(ids(&u), vec![1, 2, 3, 4, 100]);

        let mut i = a.clone();
        i &= &b;
        assert_eq!(ids(&i), vec![2, 3]);

        let mut d = a.clone();
        d -= &b;
        assert_eq!(ids(&d), vec![1, 100]);
    }

    #[test]
    fn test_union_is_idempotent() {
        let a = set(&[1, 2, 65]);
        let mut u = a.clone();
        u |= &a;
        assert_eq!(u, a);
    }

    #[test]
    fn test_equality_ignores_trailing_words() {
        let mut a = set(&[1, 200]);
        a.remove(PackageId::new(200));
        assert_eq!(a, set(&[1]));
    }

    #[test]
    fn test_full_and_subset() {
        let full = PackageSet::full(70);
        assert_eq!(full.len(), 70);
        assert!(full.contains(PackageId::new(69)));
        assert!(!full.contains(PackageId::new(70)));
        assert!(set(&[0, 69]).is_subset(&full));
        assert!(!set(&[70]).is_subset(&full));
    }
}
