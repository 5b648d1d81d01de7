// src/repository/loader.rs

//! Internalizing repository metadata into the pool
//!
//! `download_and_load` overlaps I/O with parsing: the calling thread fetches
//! metadata repository by repository and hands every finished download to a
//! loader thread, which parses it and adds the packages to the pool.
//! A repository enters the pool only once all of its metadata parsed.

use super::download::{RepoMetadata, download_metadata};
use super::parsers::comps::parse_comps;
use super::parsers::filelists::parse_filelists;
use super::parsers::other::parse_other;
use super::parsers::primary::parse_primary;
use super::parsers::read_metadata;
use super::parsers::updateinfo::parse_updateinfo;
use super::{Repo, join_url};
use crate::db::models::InstalledPackage;
use crate::error::{Error, Result};
use crate::sack::{PackageId, Pool, PoolRepo, RepoKind, SYSTEM_REPO_ID};
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info, warn};

/// Downloads that may wait for the loader before the downloader blocks
const PIPELINE_DEPTH: usize = 2;

/// Settings shared by every download of one load run
#[derive(Debug, Clone, Copy)]
pub struct DownloadSettings<'a> {
    pub cachedir: &'a Path,
    pub optional_metadata: &'a [String],
    pub cacheonly: bool,
}

/// Fetch and load the metadata of `repos`.
///
/// Returns the metadata of every repository that was loaded, tagged with the
/// caller's index. A failing repository aborts the run unless it sets
/// `skip_if_unavailable`, in which case it is skipped with a warning.
pub fn download_and_load(
    pool: &mut Pool,
    repos: &[(usize, &Repo)],
    settings: DownloadSettings<'_>,
) -> Result<Vec<(usize, RepoMetadata)>> {
    let (tx, rx) = mpsc::sync_channel::<(usize, &Repo, RepoMetadata)>(PIPELINE_DEPTH);

    thread::scope(|s| {
        let loader = s.spawn(move || -> Result<Vec<(usize, RepoMetadata)>> {
            let mut loaded = Vec::new();
            for (idx, repo, metadata) in rx {
                match load_repo(pool, repo, &metadata) {
                    Ok(count) => {
                        info!("Loaded {} packages from repository {}", count, repo.id());
                        loaded.push((idx, metadata));
                    }
                    Err(e) if *repo.config().skip_if_unavailable.get() => {
                        warn!("Skipping repository {}: {}", repo.id(), e);
                    }
                    Err(e) => {
                        return Err(Error::ParseError(format!(
                            "Failed to load repository {}: {}",
                            repo.id(),
                            e
                        )));
                    }
                }
            }
            Ok(loaded)
        });

        let mut download_error = None;
        for &(idx, repo) in repos {
            match download_metadata(
                repo,
                settings.cachedir,
                settings.optional_metadata,
                settings.cacheonly,
            ) {
                Ok(metadata) => {
                    // A closed channel means the loader gave up; its error wins
                    if tx.send((idx, repo, metadata)).is_err() {
                        break;
                    }
                }
                Err(e) if *repo.config().skip_if_unavailable.get() => {
                    warn!("Skipping unavailable repository {}: {}", repo.id(), e);
                }
                Err(e) => {
                    download_error = Some(Error::DownloadError(format!(
                        "Failed to download metadata for repository {}: {}",
                        repo.id(),
                        e
                    )));
                    break;
                }
            }
        }
        drop(tx);

        let loaded = loader
            .join()
            .map_err(|_| Error::InitError("Metadata loader thread panicked".to_string()))??;
        match download_error {
            Some(e) => Err(e),
            None => Ok(loaded),
        }
    })
}

/// Parse the metadata of one repository into the pool, returning the number
/// of packages added. Packages for incompatible architectures are skipped.
///
/// Every metadata file is parsed before the pool is touched, so a repository
/// failing to load leaves no packages behind.
pub fn load_repo(pool: &mut Pool, repo: &Repo, metadata: &RepoMetadata) -> Result<usize> {
    let primary_path = metadata.path("primary").ok_or_else(|| {
        Error::ParseError(format!("No primary metadata for repository {}", repo.id()))
    })?;
    let packages = parse_primary(&read_metadata(primary_path)?)?;
    let filelists = match metadata.path("filelists") {
        Some(path) => parse_filelists(&read_metadata(path)?)?,
        None => Vec::new(),
    };
    let others = match metadata.path("other") {
        Some(path) => parse_other(&read_metadata(path)?)?,
        None => Vec::new(),
    };
    let advisories = match metadata.path("updateinfo") {
        Some(path) => parse_updateinfo(&read_metadata(path)?)?,
        None => Vec::new(),
    };
    let groups = match metadata.path("comps") {
        Some(path) => read_metadata(path)
            .and_then(|xml| parse_comps(&xml))
            .unwrap_or_else(|e| {
                warn!("Ignoring broken comps in repository {}: {}", repo.id(), e);
                Vec::new()
            }),
        None => Vec::new(),
    };

    let mut pool_repo = PoolRepo::new(repo.id(), RepoKind::Available);
    pool_repo.priority = repo.priority();
    pool_repo.cost = repo.cost();
    let repo_idx = pool.add_repo(pool_repo);

    let mut by_pkgid: HashMap<String, PackageId> = HashMap::new();
    let mut by_nevra: HashMap<String, PackageId> = HashMap::new();
    let mut skipped = 0;
    for mut data in packages {
        if !pool.is_arch_compatible(&data.arch) {
            skipped += 1;
            continue;
        }
        if let Some(location) = data.location.take() {
            data.location = Some(join_url(&metadata.base_url, &location));
        }
        let checksum = data.checksum.clone();
        let nevra = data.full_nevra();
        let id = pool.add_package(repo_idx, data);
        if let Some(checksum) = checksum {
            by_pkgid.insert(checksum, id);
        }
        by_nevra.insert(nevra, id);
    }
    if skipped > 0 {
        debug!(
            "Skipped {} packages of incompatible architectures in {}",
            skipped,
            repo.id()
        );
    }

    let lookup = |pkgid: &str, nevra: String| -> Option<PackageId> {
        by_pkgid.get(pkgid).or_else(|| by_nevra.get(&nevra)).copied()
    };

    for entry in filelists {
        let nevra = format!("{}-{}.{}", entry.name, entry.evr.to_full_string(), entry.arch);
        if let Some(id) = lookup(&entry.pkgid, nevra) {
            pool.add_files(id, entry.files);
        }
    }
    for entry in others {
        let nevra = format!("{}-{}.{}", entry.name, entry.evr.to_full_string(), entry.arch);
        if let Some(id) = lookup(&entry.pkgid, nevra) {
            pool.add_changelogs(id, entry.changelogs);
        }
    }
    for advisory in advisories {
        pool.add_advisory(repo_idx, advisory);
    }
    for group in groups {
        pool.add_group(repo_idx, group);
    }

    Ok(by_nevra.len())
}

/// Load the installed packages recorded in the system state database
pub fn load_system(pool: &mut Pool, conn: &Connection) -> Result<usize> {
    let repo_idx = pool.add_repo(PoolRepo::new(SYSTEM_REPO_ID, RepoKind::System));
    let installed = InstalledPackage::list_all(conn)?;
    let count = installed.len();
    for pkg in installed {
        pool.add_installed(repo_idx, pkg.data, pkg.reason, pkg.from_repo);
    }
    info!("Loaded {} installed packages", count);
    Ok(count)
}
