// src/rpm/package.rs

//! Package metadata and the pool-backed package handle

use crate::db::models::Reason;
use crate::rpm::reldep::Reldep;
use crate::sack::{PackageId, Pool, RepoKind};
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A changelog entry from `other.xml` or an RPM header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changelog {
    pub timestamp: i64,
    pub author: String,
    pub text: String,
}

/// Dependency kinds a package can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepKind {
    Provides,
    Requires,
    RequiresPre,
    Conflicts,
    Obsoletes,
    Recommends,
    Suggests,
    Enhances,
    Supplements,
}

impl DepKind {
    /// Kinds making up `depends`
    pub const DEPENDS: [DepKind; 5] = [
        DepKind::Requires,
        DepKind::Recommends,
        DepKind::Suggests,
        DepKind::Enhances,
        DepKind::Supplements,
    ];

    /// Name of the primary.xml element holding this kind
    pub fn from_element(name: &str) -> Option<Self> {
        match name {
            "provides" => Some(DepKind::Provides),
            "requires" => Some(DepKind::Requires),
            "conflicts" => Some(DepKind::Conflicts),
            "obsoletes" => Some(DepKind::Obsoletes),
            "recommends" => Some(DepKind::Recommends),
            "suggests" => Some(DepKind::Suggests),
            "enhances" => Some(DepKind::Enhances),
            "supplements" => Some(DepKind::Supplements),
            _ => None,
        }
    }
}

/// Owned metadata of one package
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageData {
    pub name: String,
    pub evr: Evr,
    pub arch: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub packager: Option<String>,
    #[serde(default)]
    pub sourcerpm: Option<String>,
    /// Location relative to the repository base URL, or an absolute path
    #[serde(default)]
    pub location: Option<String>,
    /// Package checksum (`pkgid` in repodata)
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub download_size: u64,
    #[serde(default)]
    pub install_size: u64,
    #[serde(default)]
    pub build_time: i64,
    #[serde(default)]
    pub provides: Vec<Reldep>,
    #[serde(default)]
    pub requires: Vec<Reldep>,
    /// Subset of `requires` flagged as pre-install requirements
    #[serde(default)]
    pub requires_pre: Vec<Reldep>,
    #[serde(default)]
    pub conflicts: Vec<Reldep>,
    #[serde(default)]
    pub obsoletes: Vec<Reldep>,
    #[serde(default)]
    pub recommends: Vec<Reldep>,
    #[serde(default)]
    pub suggests: Vec<Reldep>,
    #[serde(default)]
    pub enhances: Vec<Reldep>,
    #[serde(default)]
    pub supplements: Vec<Reldep>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub changelogs: Vec<Changelog>,
}

impl PackageData {
    pub fn new(name: impl Into<String>, evr: Evr, arch: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            evr,
            arch: arch.into(),
            ..Default::default()
        }
    }

    pub fn deps(&self, kind: DepKind) -> &[Reldep] {
        match kind {
            DepKind::Provides => &self.provides,
            DepKind::Requires => &self.requires,
            DepKind::RequiresPre => &self.requires_pre,
            DepKind::Conflicts => &self.conflicts,
            DepKind::Obsoletes => &self.obsoletes,
            DepKind::Recommends => &self.recommends,
            DepKind::Suggests => &self.suggests,
            DepKind::Enhances => &self.enhances,
            DepKind::Supplements => &self.supplements,
        }
    }

    pub fn deps_mut(&mut self, kind: DepKind) -> &mut Vec<Reldep> {
        match kind {
            DepKind::Provides => &mut self.provides,
            DepKind::Requires => &mut self.requires,
            DepKind::RequiresPre => &mut self.requires_pre,
            DepKind::Conflicts => &mut self.conflicts,
            DepKind::Obsoletes => &mut self.obsoletes,
            DepKind::Recommends => &mut self.recommends,
            DepKind::Suggests => &mut self.suggests,
            DepKind::Enhances => &mut self.enhances,
            DepKind::Supplements => &mut self.supplements,
        }
    }

    /// `name-[epoch:]version-release.arch`
    pub fn nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr, self.arch)
    }

    /// `name-epoch:version-release.arch` with the epoch always present
    pub fn full_nevra(&self) -> String {
        format!("{}-{}.{}", self.name, self.evr.to_full_string(), self.arch)
    }

    /// Whether the package provides `dep`, counting owned files as provides
    pub fn provides_dep(&self, dep: &Reldep) -> bool {
        if dep.is_file() && self.files.iter().any(|f| f == &dep.name) {
            return true;
        }
        self.provides.iter().any(|p| dep.intersects(p))
    }

    /// Name of the source package, derived from `sourcerpm`
    pub fn source_name(&self) -> Option<String> {
        let srpm = self.sourcerpm.as_deref()?;
        let stem = srpm
            .strip_suffix(".src.rpm")
            .or_else(|| srpm.strip_suffix(".nosrc.rpm"))?;
        let mut parts = stem.rsplitn(3, '-');
        let _release = parts.next()?;
        let _version = parts.next()?;
        parts.next().map(|s| s.to_string())
    }

    /// Add the implicit `name = evr` self-provide if missing
    pub fn ensure_self_provide(&mut self) {
        if self.arch == "src" {
            return;
        }
        let has_self = self
            .provides
            .iter()
            .any(|p| p.name == self.name && p.constraint.is_some());
        if !has_self {
            self.provides.push(Reldep::versioned(
                self.name.clone(),
                crate::rpm::reldep::CmpOp::Eq,
                self.evr.clone(),
            ));
        }
    }
}

/// A lightweight handle to a package in a `Pool`
#[derive(Clone, Copy)]
pub struct Package<'a> {
    pool: &'a Pool,
    id: PackageId,
}

impl<'a> Package<'a> {
    pub(crate) fn new(pool: &'a Pool, id: PackageId) -> Self {
        Self { pool, id }
    }

    pub fn id(&self) -> PackageId {
        self.id
    }

    pub fn pool(&self) -> &'a Pool {
        self.pool
    }

    pub fn data(&self) -> &'a PackageData {
        self.pool.data(self.id)
    }

    pub fn name(&self) -> &'a str {
        &self.data().name
    }

    pub fn evr(&self) -> &'a Evr {
        &self.data().evr
    }

    pub fn arch(&self) -> &'a str {
        &self.data().arch
    }

    pub fn nevra(&self) -> String {
        self.data().nevra()
    }

    pub fn full_nevra(&self) -> String {
        self.data().full_nevra()
    }

    /// `name.arch`
    pub fn na(&self) -> String {
        format!("{}.{}", self.name(), self.arch())
    }

    pub fn repo_id(&self) -> &'a str {
        &self.pool.repo_of(self.id).id
    }

    pub fn repo_kind(&self) -> RepoKind {
        self.pool.repo_of(self.id).kind
    }

    pub fn is_installed(&self) -> bool {
        self.repo_kind() == RepoKind::System
    }

    pub fn reason(&self) -> Reason {
        self.pool.reason(self.id)
    }

    /// Repository the installed package came from, or the repo id otherwise
    pub fn from_repo(&self) -> &'a str {
        self.pool.from_repo(self.id).unwrap_or_else(|| self.repo_id())
    }

    pub fn deps(&self, kind: DepKind) -> &'a [crate::rpm::reldep::Reldep] {
        self.data().deps(kind)
    }
}

impl fmt::Debug for Package<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Package({}, {})", self.id.index(), self.nevra())
    }
}

impl PartialEq for Package<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.pool, other.pool) && self.id == other.id
    }
}

impl Eq for Package<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nevra_strings() {
        let pkg = PackageData::new("bash", Evr::new(0, "5.2", "1.fc40"), "x86_64");
        assert_eq!(pkg.nevra(), "bash-5.2-1.fc40.x86_64");
        assert_eq!(pkg.full_nevra(), "bash-0:5.2-1.fc40.x86_64");
    }

    #[test]
    fn test_source_name() {
        let mut pkg = PackageData::new("python3-libs", Evr::new(0, "3.12", "1"), "x86_64");
        pkg.sourcerpm = Some("python3.12-3.12.1-2.fc40.src.rpm".to_string());
        assert_eq!(pkg.source_name().as_deref(), Some("python3.12"));

        pkg.sourcerpm = None;
        assert!(pkg.source_name().is_none());
    }

    #[test]
    fn test_provides_dep_counts_files() {
        let mut pkg = PackageData::new("bash", Evr::new(0, "5.2", "1"), "x86_64");
        pkg.files.push("/usr/bin/bash".to_string());
        pkg.ensure_self_provide();

        assert!(pkg.provides_dep(&Reldep::new("/usr/bin/bash")));
        assert!(pkg.provides_dep(&Reldep::parse("bash >= 5").unwrap()));
        assert!(!pkg.provides_dep(&Reldep::parse("bash > 6").unwrap()));
    }

    #[test]
    fn test_self_provide_not_added_for_source() {
        let mut pkg = PackageData::new("bash", Evr::new(0, "5.2", "1"), "src");
        pkg.ensure_self_provide();
        assert!(pkg.provides.is_empty());
    }
}
