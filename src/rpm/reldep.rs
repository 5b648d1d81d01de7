// src/rpm/reldep.rs

//! Relational dependencies (`name [op evr]`)

use crate::error::{Error, Result};
use crate::version::Evr;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a versioned dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    const LT: u8 = 1;
    const GT: u8 = 2;
    const EQ: u8 = 4;

    fn flags(self) -> u8 {
        match self {
            CmpOp::Eq => Self::EQ,
            CmpOp::Lt => Self::LT,
            CmpOp::Le => Self::LT | Self::EQ,
            CmpOp::Gt => Self::GT,
            CmpOp::Ge => Self::GT | Self::EQ,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "=" | "==" => Some(CmpOp::Eq),
            "<" => Some(CmpOp::Lt),
            "<=" | "=<" => Some(CmpOp::Le),
            ">" => Some(CmpOp::Gt),
            ">=" | "=>" => Some(CmpOp::Ge),
            _ => None,
        }
    }

    /// Map repodata `flags` attribute values (`EQ`, `LT`, `LE`, `GT`, `GE`)
    pub fn from_repodata(s: &str) -> Option<Self> {
        match s {
            "EQ" => Some(CmpOp::Eq),
            "LT" => Some(CmpOp::Lt),
            "LE" => Some(CmpOp::Le),
            "GT" => Some(CmpOp::Gt),
            "GE" => Some(CmpOp::Ge),
            _ => None,
        }
    }
}

/// A dependency: a capability name with an optional version constraint.
///
/// Rich dependencies (`(a or b)`) are stored verbatim in `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reldep {
    pub name: String,
    pub constraint: Option<(CmpOp, Evr)>,
}

impl Reldep {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraint: None,
        }
    }

    pub fn versioned(name: impl Into<String>, op: CmpOp, evr: Evr) -> Self {
        Self {
            name: name.into(),
            constraint: Some((op, evr)),
        }
    }

    /// Parse `name`, `name op evr` or a parenthesised rich dependency
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("Empty dependency".to_string()));
        }
        if s.starts_with('(') {
            return Ok(Self::new(s));
        }

        let tokens: Vec<&str> = s.split_whitespace().collect();
        match tokens.as_slice() {
            [name] => Ok(Self::new(*name)),
            [name, op, evr] => {
                let op = CmpOp::parse(op).ok_or_else(|| {
                    Error::ParseError(format!("Invalid comparison operator in \"{}\"", s))
                })?;
                let evr = Evr::parse(evr)
                    .ok_or_else(|| Error::ParseError(format!("Invalid version in \"{}\"", s)))?;
                Ok(Self::versioned(*name, op, evr))
            }
            _ => Err(Error::ParseError(format!("Invalid dependency \"{}\"", s))),
        }
    }

    pub fn is_rich(&self) -> bool {
        self.name.starts_with('(')
    }

    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// Whether two dependencies on the same name describe overlapping
    /// version ranges. An unversioned side matches every version.
    pub fn intersects(&self, other: &Reldep) -> bool {
        if self.name != other.name || self.is_rich() {
            return false;
        }
        match (&self.constraint, &other.constraint) {
            (Some((op1, evr1)), Some((op2, evr2))) => ranges_overlap(*op1, evr1, *op2, evr2),
            _ => true,
        }
    }
}

/// libsolv-style intersection of two version ranges
fn ranges_overlap(op1: CmpOp, evr1: &Evr, op2: CmpOp, evr2: &Evr) -> bool {
    let f1 = op1.flags();
    let f2 = op2.flags();
    match evr1.compare_loose(evr2) {
        Ordering::Less => f1 & CmpOp::GT != 0 || f2 & CmpOp::LT != 0,
        Ordering::Greater => f1 & CmpOp::LT != 0 || f2 & CmpOp::GT != 0,
        Ordering::Equal => f1 & f2 != 0,
    }
}

impl fmt::Display for Reldep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, evr)) => write!(f, "{} {} {}", self.name, op.as_str(), evr),
            None => write!(f, "{}", self.name),
        }
    }
}

impl From<Reldep> for String {
    fn from(dep: Reldep) -> Self {
        dep.to_string()
    }
}

impl TryFrom<String> for Reldep {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Reldep::parse(&s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(s: &str) -> Reldep {
        Reldep::parse(s).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(dep("glibc").to_string(), "glibc");
        assert_eq!(dep("glibc >= 2.34").to_string(), "glibc >= 2.34");
        assert_eq!(dep("foo == 1:2-3").to_string(), "foo = 1:2-3");
        assert_eq!(dep("(a or b)").name, "(a or b)");
        assert!(Reldep::parse("foo ~ 1").is_err());
        assert!(Reldep::parse("foo >=").is_err());
    }

    #[test]
    fn test_intersects_ranges() {
        assert!(dep("foo = 1.0-1").intersects(&dep("foo >= 1.0")));
        assert!(!dep("foo = 1.0-1").intersects(&dep("foo > 1.0")));
        assert!(dep("foo = 2.0").intersects(&dep("foo > 1.0")));
        assert!(!dep("foo = 0.9").intersects(&dep("foo >= 1.0")));
        assert!(dep("foo < 2").intersects(&dep("foo > 1")));
        assert!(!dep("foo < 1").intersects(&dep("foo > 2")));
        assert!(dep("foo <= 1").intersects(&dep("foo >= 1")));
    }

    #[test]
    fn test_unversioned_matches_everything() {
        assert!(dep("foo").intersects(&dep("foo >= 5")));
        assert!(dep("foo = 1").intersects(&dep("foo")));
        assert!(!dep("foo").intersects(&dep("bar")));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&dep("foo >= 1.0")).unwrap();
        assert_eq!(json, "\"foo >= 1.0\"");
        let back: Reldep = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dep("foo >= 1.0"));
    }
}
