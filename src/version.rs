// src/version.rs

//! RPM version comparison
//!
//! Implements the segment-wise comparison used by rpm (`rpmvercmp`) and the
//! epoch:version-release triple built on top of it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Compare two version (or release) strings the way rpm does.
///
/// Strings are split into alternating numeric and alphabetic segments;
/// separators are skipped. Numeric segments compare numerically and always
/// beat alphabetic ones. `~` sorts before anything (even the end of the
/// string) and `^` sorts after the end of the string but before anything
/// else.
pub fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    let is_sep = |c: u8| !c.is_ascii_alphanumeric() && c != b'~' && c != b'^';

    while i < one.len() || j < two.len() {
        while i < one.len() && is_sep(one[i]) {
            i += 1;
        }
        while j < two.len() && is_sep(two[j]) {
            j += 1;
        }

        let c1 = one.get(i).copied();
        let c2 = two.get(j).copied();

        if c1 == Some(b'~') || c2 == Some(b'~') {
            if c1 != Some(b'~') {
                return Ordering::Greater;
            }
            if c2 != Some(b'~') {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if c1 == Some(b'^') || c2 == Some(b'^') {
            if c1.is_none() {
                return Ordering::Less;
            }
            if c2.is_none() {
                return Ordering::Greater;
            }
            if c1 != Some(b'^') {
                return Ordering::Greater;
            }
            if c2 != Some(b'^') {
                return Ordering::Less;
            }
            i += 1;
            j += 1;
            continue;
        }

        if c1.is_none() || c2.is_none() {
            break;
        }

        let start1 = i;
        let start2 = j;
        let numeric = one[i].is_ascii_digit();
        if numeric {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        // Segments of different kinds: numeric is newer
        if start2 == j {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg1 = &one[start1..i];
        let mut seg2 = &two[start2..j];

        if numeric {
            while seg1.len() > 1 && seg1[0] == b'0' {
                seg1 = &seg1[1..];
            }
            while seg2.len() > 1 && seg2[0] == b'0' {
                seg2 = &seg2[1..];
            }
            match seg1.len().cmp(&seg2.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }

        match seg1.cmp(seg2) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    let rest1 = i < one.len();
    let rest2 = j < two.len();
    match (rest1, rest2) {
        (false, false) => Ordering::Equal,
        (false, true) => Ordering::Less,
        _ => Ordering::Greater,
    }
}

/// Epoch, version and release of a package
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evr {
    pub epoch: u32,
    pub version: String,
    pub release: String,
}

impl Evr {
    pub fn new(epoch: u32, version: impl Into<String>, release: impl Into<String>) -> Self {
        Self {
            epoch,
            version: version.into(),
            release: release.into(),
        }
    }

    /// Parse `[epoch:]version[-release]`
    ///
    /// A non-numeric epoch is rejected; a missing release is left empty.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let (epoch, rest) = match s.split_once(':') {
            Some((e, rest)) => {
                if e.is_empty() {
                    (0, rest)
                } else {
                    (e.parse::<u32>().ok()?, rest)
                }
            }
            None => (0, s),
        };

        let (version, release) = match rest.rsplit_once('-') {
            Some((v, r)) => (v, r),
            None => (rest, ""),
        };

        if version.is_empty() {
            return None;
        }

        Some(Self::new(epoch, version, release))
    }

    /// Compare ignoring the release when either side does not carry one
    pub fn compare_loose(&self, other: &Self) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            other => return other,
        }
        match rpmvercmp(&self.version, &other.version) {
            Ordering::Equal => {}
            other => return other,
        }
        if self.release.is_empty() || other.release.is_empty() {
            return Ordering::Equal;
        }
        rpmvercmp(&self.release, &other.release)
    }

    /// Render with the epoch always present (`0:1.0-1`)
    pub fn to_full_string(&self) -> String {
        if self.release.is_empty() {
            format!("{}:{}", self.epoch, self.version)
        } else {
            format!("{}:{}-{}", self.epoch, self.version, self.release)
        }
    }
}

impl fmt::Display for Evr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.version)?;
        if !self.release.is_empty() {
            write!(f, "-{}", self.release)?;
        }
        Ok(())
    }
}

impl Ord for Evr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| rpmvercmp(&self.version, &other.version))
            .then_with(|| rpmvercmp(&self.release, &other.release))
    }
}

impl PartialOrd for Evr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpmvercmp_basic() {
        assert_eq!(rpmvercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0", "2.0"), Ordering::Less);
        assert_eq!(rpmvercmp("2.0.1", "2.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(rpmvercmp("010", "10"), Ordering::Equal);
        assert_eq!(rpmvercmp("1.0a", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0", "1.0a"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_numeric_beats_alpha() {
        assert_eq!(rpmvercmp("1.1", "1.a"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.a", "1.1"), Ordering::Less);
        assert_eq!(rpmvercmp("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_separators_are_equivalent() {
        assert_eq!(rpmvercmp("1.0", "1_0"), Ordering::Equal);
        assert_eq!(rpmvercmp("1+0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_rpmvercmp_tilde() {
        assert_eq!(rpmvercmp("1.0~rc1", "1.0"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0", "1.0~rc1"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0~rc1", "1.0~rc2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~~", "1.0~"), Ordering::Less);
    }

    #[test]
    fn test_rpmvercmp_caret() {
        assert_eq!(rpmvercmp("1.0^", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0^git1", "1.0"), Ordering::Greater);
        assert_eq!(rpmvercmp("1.0^git1", "1.0.1"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0^git1", "1.0^git2"), Ordering::Less);
        assert_eq!(rpmvercmp("1.0~rc1^git1", "1.0~rc1"), Ordering::Greater);
    }

    #[test]
    fn test_evr_parse() {
        let evr = Evr::parse("2:1.4.3-5.fc40").unwrap();
        assert_eq!(evr.epoch, 2);
        assert_eq!(evr.version, "1.4.3");
        assert_eq!(evr.release, "5.fc40");

        let evr = Evr::parse("1.0").unwrap();
        assert_eq!(evr.epoch, 0);
        assert_eq!(evr.release, "");

        assert!(Evr::parse("x:1.0").is_none());
        assert!(Evr::parse("").is_none());
    }

    #[test]
    fn test_evr_display() {
        assert_eq!(Evr::new(0, "1.0", "1").to_string(), "1.0-1");
        assert_eq!(Evr::new(3, "1.0", "1").to_string(), "3:1.0-1");
        assert_eq!(Evr::new(0, "1.0", "1").to_full_string(), "0:1.0-1");
    }

    #[test]
    fn test_evr_ordering() {
        let a = Evr::new(0, "1.0", "2");
        let b = Evr::new(0, "1.0", "10");
        let c = Evr::new(1, "0.1", "1");
        assert!(a < b);
        assert!(b < c);
        assert_eq!(
            Evr::new(0, "1.0", "").compare_loose(&Evr::new(0, "1.0", "7")),
            Ordering::Equal
        );
    }
}
