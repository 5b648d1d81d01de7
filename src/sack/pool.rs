// src/sack/pool.rs

//! Package pool: owns every loaded package and the lookup indexes over them

use super::{PackageId, PackageSet, RepoKind};
use crate::advisory::Advisory;
use crate::comps::Group;
use crate::db::models::Reason;
use crate::rpm::{Changelog, Package, PackageData, Reldep};
use std::collections::HashMap;
use tracing::debug;

/// A repository as seen by the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRepo {
    pub id: String,
    pub kind: RepoKind,
    /// Lower value wins
    pub priority: i32,
    pub cost: i32,
}

impl PoolRepo {
    pub fn new(id: impl Into<String>, kind: RepoKind) -> Self {
        Self {
            id: id.into(),
            kind,
            priority: 99,
            cost: 1000,
        }
    }
}

#[derive(Debug)]
struct Solvable {
    data: PackageData,
    repo: usize,
    reason: Reason,
    from_repo: Option<String>,
}

/// The package pool
#[derive(Debug, Default)]
pub struct Pool {
    arch: String,
    repos: Vec<PoolRepo>,
    solvables: Vec<Solvable>,
    provides: HashMap<String, Vec<PackageId>>,
    files: HashMap<String, Vec<PackageId>>,
    excluded: PackageSet,
    installonly: Vec<String>,
    groups: Vec<(usize, Group)>,
    advisories: Vec<(usize, Advisory)>,
}

impl Pool {
    pub fn new(arch: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            ..Default::default()
        }
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Whether packages built for `arch` can be installed on this pool's arch
    pub fn is_arch_compatible(&self, arch: &str) -> bool {
        matches!(arch, "noarch" | "src" | "nosrc") || compatible_arches(&self.arch).contains(&arch)
    }

    /// Register a repository, returning its index. An already known id
    /// returns the existing index.
    pub fn add_repo(&mut self, repo: PoolRepo) -> usize {
        if let Some(idx) = self.find_repo(&repo.id) {
            return idx;
        }
        self.repos.push(repo);
        self.repos.len() - 1
    }

    pub fn find_repo(&self, id: &str) -> Option<usize> {
        self.repos.iter().position(|r| r.id == id)
    }

    pub fn repos(&self) -> &[PoolRepo] {
        &self.repos
    }

    pub fn repo(&self, idx: usize) -> &PoolRepo {
        &self.repos[idx]
    }

    /// Add an available or command-line package
    pub fn add_package(&mut self, repo: usize, data: PackageData) -> PackageId {
        self.push_solvable(repo, data, Reason::None, None)
    }

    /// Add an installed package with its recorded reason
    pub fn add_installed(
        &mut self,
        repo: usize,
        data: PackageData,
        reason: Reason,
        from_repo: Option<String>,
    ) -> PackageId {
        self.push_solvable(repo, data, reason, from_repo)
    }

    fn push_solvable(
        &mut self,
        repo: usize,
        mut data: PackageData,
        reason: Reason,
        from_repo: Option<String>,
    ) -> PackageId {
        data.ensure_self_provide();
        let id = PackageId::new(self.solvables.len());
        for dep in &data.provides {
            self.provides.entry(dep.name.clone()).or_default().push(id);
        }
        for file in &data.files {
            self.files.entry(file.clone()).or_default().push(id);
        }
        self.solvables.push(Solvable {
            data,
            repo,
            reason,
            from_repo,
        });
        id
    }

    /// Attach file lists loaded from `filelists.xml`
    pub fn add_files(&mut self, id: PackageId, files: Vec<String>) {
        for file in &files {
            let owners = self.files.entry(file.clone()).or_default();
            if !owners.contains(&id) {
                owners.push(id);
            }
        }
        let data = &mut self.solvables[id.index()].data;
        for file in files {
            if !data.files.contains(&file) {
                data.files.push(file);
            }
        }
    }

    /// Attach changelogs loaded from `other.xml`
    pub fn add_changelogs(&mut self, id: PackageId, changelogs: Vec<Changelog>) {
        self.solvables[id.index()].data.changelogs = changelogs;
    }

    pub fn len(&self) -> usize {
        self.solvables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solvables.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        (0..self.solvables.len()).map(PackageId::new)
    }

    pub fn package(&self, id: PackageId) -> Package<'_> {
        Package::new(self, id)
    }

    pub fn data(&self, id: PackageId) -> &PackageData {
        &self.solvables[id.index()].data
    }

    pub fn repo_index(&self, id: PackageId) -> usize {
        self.solvables[id.index()].repo
    }

    pub fn repo_of(&self, id: PackageId) -> &PoolRepo {
        &self.repos[self.solvables[id.index()].repo]
    }

    pub fn reason(&self, id: PackageId) -> Reason {
        self.solvables[id.index()].reason
    }

    pub fn set_reason(&mut self, id: PackageId, reason: Reason) {
        self.solvables[id.index()].reason = reason;
    }

    pub fn from_repo(&self, id: PackageId) -> Option<&str> {
        self.solvables[id.index()].from_repo.as_deref()
    }

    /// Ids of packages in the repository at `repo`
    pub fn repo_packages(&self, repo: usize) -> PackageSet {
        self.ids()
            .filter(|id| self.solvables[id.index()].repo == repo)
            .collect()
    }

    /// All packages of the given repository kind
    pub fn packages_of_kind(&self, kind: RepoKind) -> PackageSet {
        self.ids()
            .filter(|id| self.repo_of(*id).kind == kind)
            .collect()
    }

    /// Packages whose provides (or owned files, for path dependencies)
    /// satisfy `dep`, in id order
    pub fn whatprovides(&self, dep: &Reldep) -> Vec<PackageId> {
        let mut result: Vec<PackageId> = self
            .provides
            .get(&dep.name)
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|id| self.data(*id).provides.iter().any(|p| dep.intersects(p)))
                    .collect()
            })
            .unwrap_or_default();
        if dep.is_file() {
            result.extend(self.whatowns(&dep.name));
        }
        result.sort();
        result.dedup();
        result
    }

    /// Packages owning the file `path`
    pub fn whatowns(&self, path: &str) -> &[PackageId] {
        self.files.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every provide name known to the pool
    pub fn provide_names(&self) -> impl Iterator<Item = &str> {
        self.provides.keys().map(String::as_str)
    }

    /// Every file path known to the pool
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn exclude(&mut self, id: PackageId) {
        debug!("Excluding {}", self.data(id).nevra());
        self.excluded.add(id);
    }

    pub fn excluded(&self) -> &PackageSet {
        &self.excluded
    }

    /// Set the provide names marking install-only packages
    pub fn set_installonly(&mut self, names: Vec<String>) {
        self.installonly = names;
    }

    pub fn is_installonly(&self, id: PackageId) -> bool {
        let data = self.data(id);
        self.installonly.iter().any(|name| {
            data.name == *name || data.provides.iter().any(|p| p.name == *name)
        })
    }

    pub fn add_group(&mut self, repo: usize, group: Group) {
        self.groups.push((repo, group));
    }

    /// Comps groups with the id of the repository that defines them
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Group)> {
        self.groups
            .iter()
            .map(|(repo, group)| (self.repos[*repo].id.as_str(), group))
    }

    pub fn add_advisory(&mut self, repo: usize, advisory: Advisory) {
        self.advisories.push((repo, advisory));
    }

    pub fn advisories(&self) -> impl Iterator<Item = &Advisory> {
        self.advisories.iter().map(|(_, advisory)| advisory)
    }

    /// Groups merged across repositories by id, sorted by id
    pub fn merged_groups(&self) -> Vec<Group> {
        let mut merged: Vec<Group> = Vec::new();
        for (_, group) in &self.groups {
            match merged.iter_mut().find(|g| g.id == group.id) {
                Some(existing) => existing.merge(group.clone()),
                None => merged.push(group.clone()),
            }
        }
        merged.sort_by(|a, b| a.id.cmp(&b.id));
        merged
    }
}

/// Architectures installable on `arch`, best first
pub fn compatible_arches(arch: &str) -> &'static [&'static str] {
    match arch {
        "x86_64" => &["x86_64", "athlon", "i686", "i586", "i486", "i386"],
        "i686" => &["i686", "i586", "i486", "i386"],
        "i586" => &["i586", "i486", "i386"],
        "aarch64" => &["aarch64"],
        "armv7hl" => &["armv7hl", "armv7l", "armv6l", "armv5tel"],
        "ppc64le" => &["ppc64le"],
        "ppc64" => &["ppc64", "ppc"],
        "s390x" => &["s390x"],
        "riscv64" => &["riscv64"],
        "noarch" => &[],
        _ => &[],
    }
}

/// Base architecture used for `$basearch`
pub fn basearch(arch: &str) -> &str {
    match arch {
        "i386" | "i486" | "i586" | "i686" | "athlon" => "i386",
        "armv7hl" | "armv7l" | "armv6l" | "armv5tel" => "armhfp",
        "ppc64" | "ppc" => "ppc64",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Evr;

    fn pkg(name: &str, version: &str) -> PackageData {
        PackageData::new(name, Evr::new(0, version, "1"), "x86_64")
    }

    #[test]
    fn test_add_repo_is_idempotent() {
        let mut pool = Pool::new("x86_64");
        let a = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let b = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        assert_eq!(a, b);
        assert_eq!(pool.repos().len(), 1);
    }

    #[test]
    fn test_whatprovides_uses_index_and_ranges() {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let mut data = pkg("bash", "5.2");
        data.provides.push(Reldep::parse("/bin/sh").unwrap());
        data.files.push("/usr/bin/bash".to_string());
        let bash = pool.add_package(repo, data);
        let zsh = pool.add_package(repo, pkg("zsh", "5.9"));

        assert_eq!(pool.whatprovides(&Reldep::parse("bash >= 5").unwrap()), vec![bash]);
        assert!(pool.whatprovides(&Reldep::parse("bash > 6").unwrap()).is_empty());
        assert_eq!(pool.whatprovides(&Reldep::new("/bin/sh")), vec![bash]);
        assert_eq!(pool.whatprovides(&Reldep::new("/usr/bin/bash")), vec![bash]);
        assert_eq!(pool.whatprovides(&Reldep::new("zsh")), vec![zsh]);
    }

    #[test]
    fn test_add_files_updates_index() {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let id = pool.add_package(repo, pkg("vim", "9.0"));
        pool.add_files(id, vec!["/usr/bin/vim".to_string(), "/usr/bin/vim".to_string()]);

        assert_eq!(pool.whatowns("/usr/bin/vim"), &[id]);
        assert_eq!(pool.data(id).files, vec!["/usr/bin/vim".to_string()]);
    }

    #[test]
    fn test_arch_compatibility() {
        let pool = Pool::new("x86_64");
        assert!(pool.is_arch_compatible("x86_64"));
        assert!(pool.is_arch_compatible("i686"));
        assert!(pool.is_arch_compatible("noarch"));
        assert!(!pool.is_arch_compatible("aarch64"));
        assert_eq!(basearch("i686"), "i386");
        assert_eq!(basearch("x86_64"), "x86_64");
    }

    #[test]
    fn test_installonly_by_provide() {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let mut kernel_core = pkg("kernel-core", "6.8");
        kernel_core.provides.push(Reldep::new("installonlypkg(kernel)"));
        let id = pool.add_package(repo, kernel_core);
        let other = pool.add_package(repo, pkg("bash", "5.2"));

        pool.set_installonly(vec!["installonlypkg(kernel)".to_string()]);
        assert!(pool.is_installonly(id));
        assert!(!pool.is_installonly(other));
    }
}
