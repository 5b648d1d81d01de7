// src/repository/download.rs

//! Fetching repository metadata
//!
//! Local repositories (`file://` URLs or absolute paths) are read in place.
//! Remote repositories are mirrored into `<cachedir>/<id>-<hash>/` and the
//! cached copy is reused until `metadata_expire` elapses. Every metadata
//! file is verified against the checksum recorded in repomd.xml.

use super::parsers::repomd::{RepoMd, RepoMdRecord};
use super::{Repo, RepositoryClient, join_url, local_path, verify_checksum};
use crate::config::Seconds;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const REPOMD_PATH: &str = "repodata/repomd.xml";

/// Metadata of one repository, ready to be loaded
#[derive(Debug, Clone)]
pub struct RepoMetadata {
    /// Directory holding `repodata/`
    pub root: PathBuf,
    /// URL package locations are relative to
    pub base_url: String,
    pub repomd: RepoMd,
    /// Metadata type to local file
    pub files: Vec<(String, PathBuf)>,
}

impl RepoMetadata {
    pub fn path(&self, kind: &str) -> Option<&Path> {
        self.files
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, p)| p.as_path())
    }
}

/// Metadata types to fetch: `primary` plus the requested optional types.
/// `comps` maps to the repomd `group` record.
pub fn select_records<'a>(repomd: &'a RepoMd, optional: &[String]) -> Vec<(String, &'a RepoMdRecord)> {
    let mut selected = Vec::new();
    if let Some(primary) = repomd.record("primary") {
        selected.push(("primary".to_string(), primary));
    }
    for kind in optional {
        let record = match kind.as_str() {
            "comps" | "group" => ["group_gz", "group_xz", "group_zst", "group"]
                .iter()
                .find_map(|k| repomd.record(k)),
            "filelists" => repomd.record("filelists"),
            "other" => repomd.record("other"),
            "updateinfo" => repomd.record("updateinfo"),
            unknown => {
                debug!("Ignoring unsupported metadata type {}", unknown);
                None
            }
        };
        let name = if kind == "group" { "comps" } else { kind.as_str() };
        if let Some(record) = record {
            if !selected.iter().any(|(k, _)| k == name) {
                selected.push((name.to_string(), record));
            }
        }
    }
    selected
}

/// Whether a cached file is older than `expire`
pub fn is_expired(path: &Path, expire: Seconds) -> bool {
    if expire.is_never() {
        return false;
    }
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return true;
    };
    let modified: DateTime<Utc> = modified.into();
    (Utc::now() - modified).num_seconds() > expire.0
}

/// Fetch the metadata of `repo`
pub fn download_metadata(
    repo: &Repo,
    cachedir: &Path,
    optional: &[String],
    cacheonly: bool,
) -> Result<RepoMetadata> {
    let urls = repo.config().baseurl.get();
    if urls.is_empty() {
        let reason = if !repo.config().mirrorlist.get().is_empty()
            || !repo.config().metalink.get().is_empty()
        {
            "mirrorlist and metalink are not supported, set baseurl"
        } else {
            "no baseurl configured"
        };
        return Err(Error::DownloadError(format!(
            "Repository {}: {}",
            repo.id(),
            reason
        )));
    }

    let mut last_error = None;
    for url in urls {
        let result = match local_path(url) {
            Some(root) => load_local(&root, url, optional),
            None => download_remote(repo, url, cachedir, optional, cacheonly),
        };
        match result {
            Ok(metadata) => return Ok(metadata),
            Err(e) => {
                warn!("Repository {}: {} failed: {}", repo.id(), url, e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::DownloadError(repo.id().to_string())))
}

fn read_repomd(path: &Path) -> Result<RepoMd> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::DownloadError(format!("Cannot read {}: {}", path.display(), e))
    })?;
    RepoMd::parse(&content)
}

fn load_local(root: &Path, url: &str, optional: &[String]) -> Result<RepoMetadata> {
    debug!("Reading local repository at {}", root.display());
    let repomd = read_repomd(&root.join(REPOMD_PATH))?;

    let mut files = Vec::new();
    for (kind, record) in select_records(&repomd, optional) {
        let path = root.join(&record.location);
        verify_checksum(&path, &record.checksum_type, &record.checksum)?;
        files.push((kind, path));
    }

    Ok(RepoMetadata {
        root: root.to_path_buf(),
        base_url: url.to_string(),
        repomd,
        files,
    })
}

fn download_remote(
    repo: &Repo,
    url: &str,
    cachedir: &Path,
    optional: &[String],
    cacheonly: bool,
) -> Result<RepoMetadata> {
    let cache = repo.cache_dir(cachedir);
    let repomd_path = cache.join(REPOMD_PATH);
    let mut client = None;

    if cacheonly {
        if !repomd_path.exists() {
            return Err(Error::DownloadError(format!(
                "Cache-only enabled but no cache for repository {}",
                repo.id()
            )));
        }
    } else if repo.is_expired()
        || is_expired(&repomd_path, *repo.config().metadata_expire.get())
    {
        info!("Updating metadata for repository {}", repo.id());
        let c = RepositoryClient::new()?;
        c.download_file(&join_url(url, REPOMD_PATH), &repomd_path)?;
        client = Some(c);
    } else {
        debug!("Using cached metadata for repository {}", repo.id());
    }

    let repomd = read_repomd(&repomd_path)?;
    let mut files = Vec::new();
    for (kind, record) in select_records(&repomd, optional) {
        let path = cache.join(&record.location);
        let cached_ok = path.exists()
            && verify_checksum(&path, &record.checksum_type, &record.checksum).is_ok();
        if !cached_ok {
            if cacheonly {
                return Err(Error::DownloadError(format!(
                    "Cache-only enabled but {} is not cached for repository {}",
                    record.location,
                    repo.id()
                )));
            }
            if client.is_none() {
                client = Some(RepositoryClient::new()?);
            }
            if let Some(c) = &client {
                c.download_file(&join_url(url, &record.location), &path)?;
            }
            verify_checksum(&path, &record.checksum_type, &record.checksum)?;
        }
        files.push((kind, path));
    }

    remove_stale_files(&cache, &files);

    Ok(RepoMetadata {
        root: cache,
        base_url: url.to_string(),
        repomd,
        files,
    })
}

/// Remove cached metadata files not referenced by the current repomd.xml
fn remove_stale_files(cache: &Path, keep: &[(String, PathBuf)]) {
    let keep: HashSet<&Path> = keep.iter().map(|(_, p)| p.as_path()).collect();
    let Ok(entries) = fs::read_dir(cache.join("repodata")) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.file_name().is_some_and(|n| n == "repomd.xml") || keep.contains(path.as_path()) {
            continue;
        }
        debug!("Removing stale metadata {}", path.display());
        if let Err(e) = fs::remove_file(&path) {
            warn!("Cannot remove {}: {}", path.display(), e);
        }
    }
}
