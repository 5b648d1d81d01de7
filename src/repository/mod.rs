// src/repository/mod.rs

//! Repositories and their metadata
//!
//! This module provides functionality for:
//! - Configured repositories and their lifecycle (`Repo`, `RepoState`)
//! - The repository registry feeding the package pool (`RepoSack`)
//! - Downloading and caching rpm-md metadata with retry support
//! - Verifying metadata checksums
//! - Loading metadata into the pool while later repos are still downloading

pub mod download;
pub mod loader;
pub mod parsers;
pub mod sack;

pub use download::RepoMetadata;
pub use sack::RepoSack;

use crate::config::{Priority, RepoConfig};
use crate::error::{Error, Result};
use crate::sack::RepoKind;
use reqwest::blocking::Client;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed downloads
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Lifecycle of a repository. A repository only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RepoState {
    Created,
    MetadataDownloaded,
    Loaded,
}

/// A configured repository
#[derive(Debug, Clone)]
pub struct Repo {
    id: String,
    kind: RepoKind,
    config: RepoConfig,
    state: RepoState,
    metadata: Option<RepoMetadata>,
    expired: bool,
}

impl Repo {
    pub fn new(id: impl Into<String>, kind: RepoKind, config: RepoConfig) -> Self {
        Self {
            id: id.into(),
            kind,
            config,
            state: RepoState::Created,
            metadata: None,
            expired: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> RepoKind {
        self.kind
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RepoConfig {
        &mut self.config
    }

    pub fn state(&self) -> RepoState {
        self.state
    }

    /// Move to `state`; a request to go backwards is ignored
    pub fn advance(&mut self, state: RepoState) {
        if state > self.state {
            debug!("Repository {}: {:?} -> {:?}", self.id, self.state, state);
            self.state = state;
        }
    }

    /// Display name, falling back to the id
    pub fn name(&self) -> &str {
        let name = self.config.name.get();
        if name.is_empty() { &self.id } else { name }
    }

    pub fn is_enabled(&self) -> bool {
        *self.config.enabled.get()
    }

    pub fn enable(&mut self) {
        self.set_enabled(true);
    }

    pub fn disable(&mut self) {
        self.set_enabled(false);
    }

    fn set_enabled(&mut self, enabled: bool) {
        if let Err(e) = self.config.enabled.set(Priority::Runtime, enabled) {
            warn!("Cannot change state of repository {}: {}", self.id, e);
        }
    }

    /// Force the next load to refresh cached metadata
    pub fn expire(&mut self) {
        self.expired = true;
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn priority(&self) -> i32 {
        *self.config.priority.get()
    }

    pub fn cost(&self) -> i32 {
        *self.config.cost.get()
    }

    /// First configured base URL
    pub fn base_url(&self) -> Option<&str> {
        self.config.baseurl.get().first().map(String::as_str)
    }

    /// Whether the repository is read in place from the local filesystem
    pub fn is_local(&self) -> bool {
        self.base_url().and_then(local_path).is_some()
    }

    /// Downloaded metadata, once available
    pub fn metadata(&self) -> Option<&RepoMetadata> {
        self.metadata.as_ref()
    }

    pub(crate) fn set_metadata(&mut self, metadata: RepoMetadata) {
        self.metadata = Some(metadata);
        self.expired = false;
        self.advance(RepoState::MetadataDownloaded);
    }

    /// Cache directory under `cachedir`: `<id>-<hash of the base URL>`
    pub fn cache_dir(&self, cachedir: &Path) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(self.config.baseurl.get().join("\n").as_bytes());
        let hash = format!("{:x}", hasher.finalize());
        cachedir.join(format!("{}-{}", self.id, &hash[..16]))
    }
}

/// Local directory named by a `file://` URL or an absolute path
pub fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.starts_with('/') {
        return Some(PathBuf::from(url));
    }
    None
}

/// Join a base URL and a relative location
pub fn join_url(base: &str, location: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), location.trim_start_matches('/'))
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("rsdnf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download a file to the specified path with retry support
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(mut response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    // Write to temporary file first
                    let temp_path = dest_path.with_extension("tmp");
                    let mut file = File::create(&temp_path)?;
                    io::copy(&mut response, &mut file).map_err(|e| {
                        Error::DownloadError(format!("Failed to write data from {}: {}", url, e))
                    })?;

                    fs::rename(&temp_path, dest_path)?;

                    debug!("Downloaded {}", dest_path.display());
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

fn hex_digest<D: Digest + io::Write>(file: &mut File) -> io::Result<String> {
    let mut hasher = D::new();
    io::copy(file, &mut hasher)?;
    Ok(hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect())
}

/// Verify a file checksum. `kind` is the repomd checksum type; unknown
/// types cannot be verified and are accepted with a warning.
pub fn verify_checksum(path: &Path, kind: &str, expected: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)?;
    let actual = match kind {
        "sha256" => hex_digest::<Sha256>(&mut file)?,
        "sha512" => hex_digest::<Sha512>(&mut file)?,
        "sha1" | "sha" => hex_digest::<Sha1>(&mut file)?,
        "md5" => hex_digest::<Md5>(&mut file)?,
        other => {
            warn!(
                "Unsupported checksum type {} for {}, not verified",
                other,
                path.display()
            );
            return Ok(());
        }
    };

    if actual != expected {
        return Err(Error::ChecksumMismatch {
            path: path.display().to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Checksum verified: {}", expected);
    Ok(())
}
