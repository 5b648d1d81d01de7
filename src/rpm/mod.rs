// src/rpm/mod.rs

//! RPM package model: NEVRA specs, relational dependencies and the
//! pool-backed `Package` handle.

pub mod nevra;
pub mod package;
pub mod reldep;

pub use nevra::{Nevra, NevraForm};
pub use package::{Changelog, DepKind, Package, PackageData};
pub use reldep::{CmpOp, Reldep};
