// src/packages/rpm.rs

//! Reading `.rpm` files given on the command line

use crate::error::{Error, Result};
use crate::rpm::{Changelog, CmpOp, DepKind, PackageData, Reldep};
use crate::version::Evr;
use rpm::{DependencyFlags, Package};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use tracing::debug;

/// Extract file list from RPM package
fn extract_files(pkg: &Package) -> Vec<String> {
    pkg.metadata
        .get_file_paths()
        .map(|paths| {
            paths
                .into_iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn to_reldep(dep: &rpm::Dependency) -> Reldep {
    let flags = dep.flags;
    let op = if flags.contains(DependencyFlags::LESS | DependencyFlags::EQUAL) {
        Some(CmpOp::Le)
    } else if flags.contains(DependencyFlags::GREATER | DependencyFlags::EQUAL) {
        Some(CmpOp::Ge)
    } else if flags.contains(DependencyFlags::LESS) {
        Some(CmpOp::Lt)
    } else if flags.contains(DependencyFlags::GREATER) {
        Some(CmpOp::Gt)
    } else if flags.contains(DependencyFlags::EQUAL) {
        Some(CmpOp::Eq)
    } else {
        None
    };

    match (op, Evr::parse(&dep.version)) {
        (Some(op), Some(evr)) => Reldep::versioned(dep.name.clone(), op, evr),
        _ => Reldep::new(dep.name.clone()),
    }
}

/// Extract dependencies of every kind from RPM package
fn extract_dependencies(pkg: &Package, data: &mut PackageData) {
    let md = &pkg.metadata;
    let lists = [
        (DepKind::Provides, md.get_provides()),
        (DepKind::Requires, md.get_requires()),
        (DepKind::Conflicts, md.get_conflicts()),
        (DepKind::Obsoletes, md.get_obsoletes()),
        (DepKind::Recommends, md.get_recommends()),
        (DepKind::Suggests, md.get_suggests()),
        (DepKind::Enhances, md.get_enhances()),
        (DepKind::Supplements, md.get_supplements()),
    ];

    for (kind, deps) in lists {
        let Ok(deps) = deps else {
            continue;
        };
        for dep in deps {
            if kind == DepKind::Requires {
                if dep.name.starts_with("rpmlib(") {
                    continue;
                }
                if dep.flags.intersects(DependencyFlags::PREREQ | DependencyFlags::SCRIPT_PRE) {
                    data.requires_pre.push(to_reldep(&dep));
                }
            }
            data.deps_mut(kind).push(to_reldep(&dep));
        }
    }
}

fn extract_changelogs(pkg: &Package) -> Vec<Changelog> {
    pkg.metadata
        .get_changelog_entries()
        .map(|entries| {
            entries
                .into_iter()
                .map(|entry| Changelog {
                    timestamp: entry.timestamp as i64,
                    author: entry.name,
                    text: entry.description,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// sha256 of a file
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Read an RPM file into package metadata
pub fn read_rpm(path: &Path) -> Result<PackageData> {
    debug!("Parsing RPM package: {}", path.display());

    let file = File::open(path).map_err(|e| {
        Error::ParseError(format!("Failed to open RPM file {}: {}", path.display(), e))
    })?;
    let mut buf_reader = BufReader::new(file);

    let pkg = Package::parse(&mut buf_reader).map_err(|e| {
        Error::ParseError(format!("Failed to parse RPM {}: {}", path.display(), e))
    })?;

    let md = &pkg.metadata;
    let name = md
        .get_name()
        .map_err(|e| Error::ParseError(format!("Failed to get package name: {}", e)))?
        .to_string();
    let version = md
        .get_version()
        .map_err(|e| Error::ParseError(format!("Failed to get package version: {}", e)))?
        .to_string();
    let release = md.get_release().map(|s| s.to_string()).unwrap_or_default();
    let epoch = md.get_epoch().unwrap_or(0);
    let arch = if md.is_source_package() {
        "src".to_string()
    } else {
        md.get_arch().map(|s| s.to_string()).unwrap_or_else(|_| "noarch".to_string())
    };

    let mut data = PackageData::new(name, Evr::new(epoch, version, release), arch);
    data.summary = md.get_summary().map(|s| s.to_string()).unwrap_or_default();
    data.description = md.get_description().map(|s| s.to_string()).unwrap_or_default();
    data.url = md.get_url().ok().map(|s| s.to_string());
    data.license = md.get_license().ok().map(|s| s.to_string());
    data.vendor = md.get_vendor().ok().map(|s| s.to_string());
    data.packager = md.get_packager().ok().map(|s| s.to_string());
    data.sourcerpm = md.get_source_rpm().ok().map(|s| s.to_string());
    data.build_time = md.get_build_time().map(|t| t as i64).unwrap_or(0);
    data.install_size = md.get_installed_size().unwrap_or(0);
    data.download_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    data.location = Some(path.to_string_lossy().to_string());
    data.checksum = Some(file_sha256(path)?);

    extract_dependencies(&pkg, &mut data);
    data.files = extract_files(&pkg);
    data.changelogs = extract_changelogs(&pkg);

    debug!(
        "Parsed RPM: {} ({} files, {} requires)",
        data.nevra(),
        data.files.len(),
        data.requires.len()
    );
    Ok(data)
}
