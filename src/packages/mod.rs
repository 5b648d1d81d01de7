// src/packages/mod.rs

//! Package file support
//!
//! Command-line packages are read from `.rpm` files with the `rpm` crate.
//! Several files are parsed in parallel.

pub mod rpm;

pub use rpm::{file_sha256, read_rpm};

use crate::error::Result;
use crate::rpm::PackageData;
use rayon::prelude::*;
use std::path::PathBuf;

/// Whether `spec` names a package file (a local path or URL ending in `.rpm`)
pub fn is_package_file(spec: &str) -> bool {
    spec.ends_with(".rpm")
}

/// Whether `spec` is a remote URL
pub fn is_url(spec: &str) -> bool {
    spec.starts_with("http://") || spec.starts_with("https://") || spec.starts_with("ftp://")
}

/// Read several RPM files in parallel, keeping input order
pub fn read_rpms(paths: &[PathBuf]) -> Vec<(PathBuf, Result<PackageData>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), read_rpm(path)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_package_file_detection() {
        assert!(is_package_file("/tmp/bash-5.2-1.x86_64.rpm"));
        assert!(is_package_file("https://example.com/bash.rpm"));
        assert!(!is_package_file("bash"));
        assert!(is_url("https://example.com/bash.rpm"));
        assert!(!is_url("./bash.rpm"));
    }

    #[test]
    fn test_read_rpms_keeps_order_and_errors() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..4)
            .map(|i| {
                let path = dir.path().join(format!("pkg{}.rpm", i));
                std::fs::write(&path, b"garbage").unwrap();
                path
            })
            .collect();

        let results = read_rpms(&paths);
        assert_eq!(results.len(), 4);
        for ((path, result), expected) in results.iter().zip(&paths) {
            assert_eq!(path, expected);
            assert!(result.is_err());
        }
    }
}
