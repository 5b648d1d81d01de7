// src/advisory.rs

//! Update advisories from updateinfo metadata
//!
//! An advisory names the package versions fixing a set of issues. Queries
//! narrow packages to those at or above a version some selected advisory
//! lists.

use crate::sack::{Pool, QueryCmp, match_string};
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisoryKind {
    Security,
    Bugfix,
    Enhancement,
    Newpackage,
    #[default]
    Unknown,
}

impl AdvisoryKind {
    pub fn as_str(&self) -> &str {
        match self {
            AdvisoryKind::Security => "security",
            AdvisoryKind::Bugfix => "bugfix",
            AdvisoryKind::Enhancement => "enhancement",
            AdvisoryKind::Newpackage => "newpackage",
            AdvisoryKind::Unknown => "unknown",
        }
    }

    /// Kind from the `type` attribute of an `<update>` element
    pub fn parse(s: &str) -> Self {
        match s {
            "security" => AdvisoryKind::Security,
            "bugfix" => AdvisoryKind::Bugfix,
            "enhancement" => AdvisoryKind::Enhancement,
            "newpackage" => AdvisoryKind::Newpackage,
            _ => AdvisoryKind::Unknown,
        }
    }
}

impl fmt::Display for AdvisoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An issue tracker entry an advisory refers to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvisoryReference {
    pub id: String,
    /// `bugzilla`, `cve`, `vendor`, ...
    pub kind: String,
    pub title: String,
    pub url: String,
}

/// A package version fixing the advisory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvisoryPackage {
    pub name: String,
    pub evr: Evr,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Advisory {
    pub id: String,
    pub kind: AdvisoryKind,
    pub title: String,
    pub severity: String,
    pub status: String,
    pub references: Vec<AdvisoryReference>,
    pub packages: Vec<AdvisoryPackage>,
}

impl Advisory {
    pub fn new(id: impl Into<String>, kind: AdvisoryKind) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Default::default()
        }
    }

    fn has_reference(&self, kind: &str, ids: &[String]) -> bool {
        self.references
            .iter()
            .any(|r| r.kind == kind && ids.iter().any(|id| *id == r.id))
    }
}

/// Advisory selection given on the command line.
///
/// Names, bugzilla ids and CVEs each add advisories; kinds and severities
/// then narrow what was added. Kinds and severities alone narrow all
/// advisories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvisoryFilter {
    pub names: Vec<String>,
    pub security: bool,
    pub bugfix: bool,
    pub enhancement: bool,
    pub newpackage: bool,
    pub severities: Vec<String>,
    pub bzs: Vec<String>,
    pub cves: Vec<String>,
}

impl AdvisoryFilter {
    /// Whether no advisory option is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn kinds(&self) -> Vec<AdvisoryKind> {
        [
            (self.security, AdvisoryKind::Security),
            (self.bugfix, AdvisoryKind::Bugfix),
            (self.enhancement, AdvisoryKind::Enhancement),
            (self.newpackage, AdvisoryKind::Newpackage),
        ]
        .into_iter()
        .filter_map(|(on, kind)| on.then_some(kind))
        .collect()
    }

    pub fn matches(&self, advisory: &Advisory) -> bool {
        let by_id = self.names.is_empty() && self.bzs.is_empty() && self.cves.is_empty()
            || self
                .names
                .iter()
                .any(|n| match_string(&advisory.id, n, QueryCmp::Glob))
            || advisory.has_reference("bugzilla", &self.bzs)
            || advisory.has_reference("cve", &self.cves);
        let kinds = self.kinds();
        by_id
            && (kinds.is_empty() || kinds.contains(&advisory.kind))
            && (self.severities.is_empty()
                || self
                    .severities
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(&advisory.severity)))
    }

    /// Advisories of `pool` this filter selects
    pub fn select<'a>(&self, pool: &'a Pool) -> Vec<&'a Advisory> {
        pool.advisories().filter(|a| self.matches(a)).collect()
    }
}
