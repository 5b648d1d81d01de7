// src/comps.rs

//! Package groups from comps metadata

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strongly a group requires one of its packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Mandatory,
    Default,
    Optional,
    Conditional,
}

impl PackageType {
    pub fn as_str(&self) -> &str {
        match self {
            PackageType::Mandatory => "mandatory",
            PackageType::Default => "default",
            PackageType::Optional => "optional",
            PackageType::Conditional => "conditional",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PackageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mandatory" => Ok(PackageType::Mandatory),
            "default" => Ok(PackageType::Default),
            "optional" => Ok(PackageType::Optional),
            "conditional" => Ok(PackageType::Conditional),
            _ => Err(format!("Unknown group package type: {}", s)),
        }
    }
}

/// A package listed in a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPackage {
    pub name: String,
    pub kind: PackageType,
    /// For conditional packages, the package whose presence triggers it
    pub requires: Option<String>,
}

/// A comps group
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    pub uservisible: bool,
    pub default: bool,
    pub packages: Vec<GroupPackage>,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uservisible: true,
            ..Default::default()
        }
    }

    /// Packages installed by `group install`: mandatory and default ones,
    /// plus optional ones when `with_optional` is set
    pub fn install_packages(&self, with_optional: bool) -> impl Iterator<Item = &GroupPackage> {
        self.packages.iter().filter(move |p| match p.kind {
            PackageType::Mandatory | PackageType::Default => true,
            PackageType::Optional => with_optional,
            PackageType::Conditional => false,
        })
    }

    pub fn packages_of_type(&self, kind: PackageType) -> impl Iterator<Item = &GroupPackage> {
        self.packages.iter().filter(move |p| p.kind == kind)
    }

    /// Group merge for repositories defining the same group id. Packages
    /// not yet listed are appended; the first definition keeps its texts.
    pub fn merge(&mut self, other: Group) {
        if self.name.is_empty() {
            self.name = other.name;
        }
        if self.description.is_empty() {
            self.description = other.description;
        }
        for pkg in other.packages {
            if !self.packages.iter().any(|p| p.name == pkg.name) {
                self.packages.push(pkg);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> Group {
        let mut group = Group::new("core");
        group.name = "Core".to_string();
        for (name, kind) in [
            ("bash", PackageType::Mandatory),
            ("vim-minimal", PackageType::Default),
            ("emacs", PackageType::Optional),
            ("langpack-de", PackageType::Conditional),
        ] {
            group.packages.push(GroupPackage {
                name: name.to_string(),
                kind,
                requires: None,
            });
        }
        group
    }

    #[test]
    fn test_install_packages() {
        let group = group();
        let names: Vec<_> = group.install_packages(false).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["bash", "vim-minimal"]);
        assert_eq!(group.install_packages(true).count(), 3);
    }

    #[test]
    fn test_merge() {
        let mut a = group();
        let mut b = Group::new("core");
        b.name = "Other".to_string();
        b.packages.push(GroupPackage {
            name: "bash".to_string(),
            kind: PackageType::Optional,
            requires: None,
        });
        b.packages.push(GroupPackage {
            name: "zsh".to_string(),
            kind: PackageType::Optional,
            requires: None,
        });
        a.merge(b);
        assert_eq!(a.name, "Core");
        assert_eq!(a.packages.len(), 5);
        assert_eq!(a.packages_of_type(PackageType::Mandatory).count(), 1);
    }

    #[test]
    fn test_package_type_roundtrip() {
        assert_eq!("optional".parse::<PackageType>().unwrap(), PackageType::Optional);
        assert!("weird".parse::<PackageType>().is_err());
    }
}
