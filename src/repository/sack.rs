// src/repository/sack.rs

//! Repository registry
//!
//! `RepoSack` owns every configured repository together with the package
//! pool their metadata is loaded into. Besides the repositories created from
//! configuration it manages two pseudo repositories: `@System` holding the
//! installed packages and `@commandline` holding `.rpm` files given by the
//! user.

use super::loader::{self, DownloadSettings};
use super::{Repo, RepoState, RepositoryClient};
use crate::config::{
    ConfigMain, ConfigParser, Priority, RepoConfig, Vars, create_sorted_file_list,
};
use crate::db;
use crate::error::{Error, Result};
use crate::packages::{is_package_file, is_url, read_rpms};
use crate::sack::{
    CMDLINE_REPO_ID, PackageId, Pool, PoolRepo, QueryCmp, RepoKind, SYSTEM_REPO_ID, match_string,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Configured repositories and the pool of their packages
#[derive(Debug)]
pub struct RepoSack {
    repos: Vec<Repo>,
    pool: Pool,
    config: ConfigMain,
    vars: Vars,
}

impl RepoSack {
    /// Empty registry; the pool architecture is taken from `$arch`
    pub fn new(config: ConfigMain, vars: Vars) -> Self {
        let arch = vars
            .get("arch")
            .unwrap_or(std::env::consts::ARCH)
            .to_string();
        let mut pool = Pool::new(arch);
        pool.set_installonly(config.installonlypkgs.get().clone());
        Self {
            repos: Vec::new(),
            pool,
            config,
            vars,
        }
    }

    pub fn config(&self) -> &ConfigMain {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigMain {
        &mut self.config
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        &mut self.pool
    }

    /// Configured repositories in creation order
    pub fn repos(&self) -> &[Repo] {
        &self.repos
    }

    pub fn repo(&self, id: &str) -> Option<&Repo> {
        self.repos.iter().find(|r| r.id() == id)
    }

    pub fn repo_mut(&mut self, id: &str) -> Option<&mut Repo> {
        self.repos.iter_mut().find(|r| r.id() == id)
    }

    /// Repositories whose id matches one of the glob `patterns`
    pub fn matching_repos(&self, patterns: &[impl AsRef<str>]) -> Vec<&Repo> {
        self.repos
            .iter()
            .filter(|r| {
                patterns
                    .iter()
                    .any(|p| match_string(r.id(), p.as_ref(), QueryCmp::Glob))
            })
            .collect()
    }

    /// Create an empty repository with options inherited from the main
    /// configuration
    pub fn create_repo(&mut self, id: &str) -> Result<&mut Repo> {
        if self.repo(id).is_some() {
            return Err(Error::RepoIdAlreadyExists(id.to_string()));
        }
        debug!("Creating repository {}", id);
        let config = RepoConfig::new(&self.config);
        self.repos.push(Repo::new(id, RepoKind::Available, config));
        let idx = self.repos.len() - 1;
        Ok(&mut self.repos[idx])
    }

    /// Create one repository per section of the `.repo` file at `path`
    pub fn create_repos_from_file(&mut self, path: &Path) -> Result<()> {
        let mut parser = ConfigParser::new();
        parser.read(path)?;
        self.create_repos_from_parser(&parser, path)
    }

    fn create_repos_from_parser(&mut self, parser: &ConfigParser, origin: &Path) -> Result<()> {
        let sections: Vec<String> = parser
            .section_names()
            .filter(|s| *s != "main")
            .map(str::to_string)
            .collect();
        for section in sections {
            let id = self.vars.substitute(&section);
            debug!("Creating repository {} from {}", id, origin.display());
            let vars = self.vars.clone();
            let repo = self.create_repo(&id)?;
            repo.config_mut().load_from_parser(parser, &section, &vars);
        }
        Ok(())
    }

    /// Create repositories from the non-`main` sections of the main
    /// configuration file. A missing or unreadable file is only an error
    /// when its path was given on the command line.
    pub fn create_repos_from_config_file(&mut self) -> Result<()> {
        let path = PathBuf::from(self.config.config_file_path.get());
        let user_defined = self.config.config_file_path.priority() >= Priority::Commandline;
        let mut parser = ConfigParser::new();
        match parser.read(&path) {
            Ok(()) => {}
            Err(e @ (Error::MissingConfig(_) | Error::InaccessibleConfig { .. }))
                if !user_defined =>
            {
                debug!("Skipping repositories from main config: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        self.create_repos_from_parser(&parser, &path)
    }

    /// Create repositories from the `.repo` files in `dir`, in alphabetical
    /// order. A missing directory holds no repositories.
    pub fn create_repos_from_dir(&mut self, dir: &Path) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read repository directory {}: {}", dir.display(), e);
                return Ok(());
            }
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "repo"))
            .collect();
        paths.sort();
        for path in paths {
            self.create_repos_from_file(&path)?;
        }
        Ok(())
    }

    /// Create repositories from every `reposdir` directory. Files are
    /// processed sorted by name and a file name seen in an earlier directory
    /// shadows the same name in later ones.
    pub fn create_repos_from_reposdir(&mut self) -> Result<()> {
        let dirs = self.config.reposdir.get().clone();
        for path in create_sorted_file_list(&dirs, "repo") {
            self.create_repos_from_file(&path)?;
        }
        Ok(())
    }

    /// Create a repository for each `(id, path)` pair, with the path as its
    /// only baseurl
    pub fn create_repos_from_paths(
        &mut self,
        pairs: &[(String, String)],
        priority: Priority,
    ) -> Result<()> {
        for (id, path) in pairs {
            let id = self.vars.substitute(id);
            let path = self.vars.substitute(path);
            let repo = self.create_repo(&id)?;
            let config = repo.config_mut();
            config.name.set(priority, id.clone())?;
            config.baseurl.set(priority, vec![path])?;
        }
        Ok(())
    }

    /// Repositories from the main configuration file and `reposdir`
    pub fn create_repos_from_system_configuration(&mut self) -> Result<()> {
        self.create_repos_from_config_file()?;
        self.create_repos_from_reposdir()?;
        info!("Configured {} repositories", self.repos.len());
        Ok(())
    }

    /// Pool index of the `@System` repository, creating it when needed
    pub fn get_system_repo(&mut self) -> usize {
        self.pool
            .add_repo(PoolRepo::new(SYSTEM_REPO_ID, RepoKind::System))
    }

    pub fn has_system_repo(&self) -> bool {
        self.pool.find_repo(SYSTEM_REPO_ID).is_some()
    }

    fn get_cmdline_repo(&mut self) -> usize {
        self.pool
            .add_repo(PoolRepo::new(CMDLINE_REPO_ID, RepoKind::Cmdline))
    }

    pub fn has_cmdline_repo(&self) -> bool {
        self.pool.find_repo(CMDLINE_REPO_ID).is_some()
    }

    /// Add the `.rpm` files among `specs` (local paths or URLs) to the
    /// `@commandline` repository. Other specs are ignored. Remote files are
    /// downloaded into the cache first; all files are parsed in parallel.
    /// Returns the spec each package was added from.
    pub fn add_cmdline_packages(&mut self, specs: &[String]) -> Result<Vec<(String, PackageId)>> {
        let specs: Vec<&String> = specs.iter().filter(|s| is_package_file(s)).collect();
        if specs.is_empty() {
            return Ok(Vec::new());
        }

        let client = if specs.iter().any(|s| is_url(s)) {
            Some(RepositoryClient::new()?)
        } else {
            None
        };
        let download_dir = Path::new(self.config.cachedir.get()).join(CMDLINE_REPO_ID);

        let mut paths = Vec::with_capacity(specs.len());
        for spec in &specs {
            match &client {
                Some(client) if is_url(spec) => {
                    let file_name = spec.rsplit('/').next().unwrap_or(spec.as_str());
                    let dest = download_dir.join(file_name);
                    client.download_file(spec, &dest)?;
                    paths.push(dest);
                }
                _ => paths.push(PathBuf::from(spec.as_str())),
            }
        }

        let repo_idx = self.get_cmdline_repo();
        let mut added = Vec::with_capacity(paths.len());
        for ((path, result), spec) in read_rpms(&paths).into_iter().zip(specs) {
            let data = result?;
            debug!("Adding command-line package {} from {}", data.nevra(), path.display());
            let id = self.pool.add_package(repo_idx, data);
            added.push((spec.clone(), id));
        }
        Ok(added)
    }

    /// Enable `<id>-source` for every enabled repository that has one
    pub fn enable_source_repos(&mut self) {
        let source_ids: Vec<String> = self
            .repos
            .iter()
            .filter(|r| r.is_enabled() && !r.id().ends_with("-source"))
            .map(|r| format!("{}-source", r.id()))
            .collect();
        for id in source_ids {
            if let Some(repo) = self.repo_mut(&id) {
                debug!("Enabling source repository {}", id);
                repo.enable();
            }
        }
    }

    /// Enable the repositories matching `patterns`
    pub fn enable_repos(&mut self, patterns: &[impl AsRef<str>]) -> Result<()> {
        self.set_repos_enabled(patterns, true)
    }

    /// Disable the repositories matching `patterns`
    pub fn disable_repos(&mut self, patterns: &[impl AsRef<str>]) -> Result<()> {
        self.set_repos_enabled(patterns, false)
    }

    fn set_repos_enabled(&mut self, patterns: &[impl AsRef<str>], enabled: bool) -> Result<()> {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let mut matched = false;
            for repo in self
                .repos
                .iter_mut()
                .filter(|r| match_string(r.id(), pattern, QueryCmp::Glob))
            {
                matched = true;
                if enabled {
                    repo.enable();
                } else {
                    repo.disable();
                }
            }
            if !matched {
                return Err(Error::RepoNotFound(pattern.to_string()));
            }
        }
        Ok(())
    }

    /// Forget every loaded package, keeping the repository definitions.
    /// Repositories start over as freshly created ones.
    pub fn reset(&mut self) {
        debug!("Resetting repository sack");
        let mut pool = Pool::new(self.pool.arch());
        pool.set_installonly(self.config.installonlypkgs.get().clone());
        self.pool = pool;
        self.repos = self
            .repos
            .iter()
            .map(|r| Repo::new(r.id(), r.kind(), r.config().clone()))
            .collect();
    }

    /// Force the next load of every repository to refresh its metadata
    pub fn expire_all(&mut self) {
        for repo in &mut self.repos {
            repo.expire();
        }
    }

    /// Load the installed system (when `load_system`) and every enabled
    /// repository not loaded yet
    pub fn update_and_load_enabled_repos(&mut self, load_system: bool) -> Result<()> {
        if load_system {
            self.load_system_repo()?;
        }
        let indexes: Vec<usize> = self
            .repos
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_enabled() && r.state() < RepoState::Loaded)
            .map(|(i, _)| i)
            .collect();
        self.load_repos(indexes)
    }

    /// Load the repositories with the given ids
    pub fn update_and_load_repos(&mut self, ids: &[impl AsRef<str>]) -> Result<()> {
        let mut indexes = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            let idx = self
                .repos
                .iter()
                .position(|r| r.id() == id)
                .ok_or_else(|| Error::RepoNotFound(id.to_string()))?;
            if self.repos[idx].state() < RepoState::Loaded {
                indexes.push(idx);
            }
        }
        self.load_repos(indexes)
    }

    /// Load the installed system from the system state database
    pub fn load_system_repo(&mut self) -> Result<()> {
        if self.has_system_repo() {
            return Ok(());
        }
        let path = self.config.system_state_path();
        if path.exists() {
            let conn = db::open(&path)?;
            loader::load_system(&mut self.pool, &conn)?;
        } else {
            debug!("No system state at {}, system is empty", path.display());
            self.get_system_repo();
        }
        Ok(())
    }

    fn load_repos(&mut self, indexes: Vec<usize>) -> Result<()> {
        if indexes.is_empty() {
            return Ok(());
        }

        let cachedir = PathBuf::from(self.config.cachedir.get());
        let optional = self.config.optional_metadata_types.get().clone();
        let settings = DownloadSettings {
            cachedir: &cachedir,
            optional_metadata: &optional,
            cacheonly: *self.config.cacheonly.get(),
        };
        let jobs: Vec<(usize, &Repo)> = indexes.iter().map(|i| (*i, &self.repos[*i])).collect();
        let loaded = loader::download_and_load(&mut self.pool, &jobs, settings)?;

        for (idx, metadata) in loaded {
            let repo = &mut self.repos[idx];
            repo.set_metadata(metadata);
            repo.advance(RepoState::Loaded);
        }
        self.apply_excludes();
        Ok(())
    }

    /// Mark packages excluded by the main and per-repository
    /// `excludepkgs` / `includepkgs` name globs. Installed packages are
    /// never excluded.
    fn apply_excludes(&mut self) {
        let main_excludes = self.config.excludepkgs.get();
        let main_includes = self.config.includepkgs.get();
        let matches = |name: &str, patterns: &[String]| {
            patterns
                .iter()
                .any(|p| match_string(name, p, QueryCmp::Glob))
        };

        let mut excluded: Vec<PackageId> = Vec::new();
        for id in self.pool.ids() {
            let pool_repo = self.pool.repo_of(id);
            if pool_repo.kind != RepoKind::Available {
                continue;
            }
            let name = self.pool.data(id).name.as_str();
            let mut exclude = matches(name, main_excludes)
                || (!main_includes.is_empty() && !matches(name, main_includes));
            if let Some(repo) = self.repos.iter().find(|r| r.id() == pool_repo.id) {
                let includes = repo.config().includepkgs.get();
                exclude = exclude
                    || matches(name, repo.config().excludepkgs.get())
                    || (!includes.is_empty() && !matches(name, includes));
            }
            if exclude {
                excluded.push(id);
            }
        }
        for id in excluded {
            self.pool.exclude(id);
        }
    }
}
