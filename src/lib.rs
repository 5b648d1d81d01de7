// src/lib.rs

//! rsdnf: an RPM package manager
//!
//! Repository metadata (repomd, primary, filelists, other, comps) is
//! downloaded and cached per repository, loaded together with the installed
//! system into a package pool, and queried through composable filters.
//!
//! # Architecture
//!
//! - `config`: layered option values with priorities, INI files, variables
//! - `base`: the session object owning configuration and the repository sack
//! - `repository`: repository definitions, metadata download and parsing
//! - `sack`: the package pool, package sets and queries
//! - `advisory`: update advisories and their selection
//! - `goal` / `transaction`: dependency resolution and recording the result
//! - `db`: installed packages, groups and transaction history in SQLite
//! - `service`: a line-oriented JSON interface over a session

pub mod advisory;
pub mod base;
pub mod comps;
pub mod config;
pub mod db;
mod error;
pub mod goal;
pub mod output;
pub mod packages;
pub mod repoquery;
pub mod repository;
pub mod rpm;
pub mod sack;
pub mod service;
pub mod transaction;
pub mod version;

pub use base::Base;
pub use error::{Error, Result};
