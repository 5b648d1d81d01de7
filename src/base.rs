// src/base.rs

//! Session root
//!
//! A `Base` holds the main configuration and the substitution variables,
//! loads the configuration files and, once `setup` has run, owns the
//! `RepoSack` every query and transaction works on.

use crate::config::{
    CONF_DIRECTORY, ConfigMain, ConfigParser, DISTRIBUTION_CONF_DIRECTORY, Priority, Vars,
    create_sorted_file_list, under_root,
};
use crate::db;
use crate::error::{Error, Result};
use crate::repository::RepoSack;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Base {
    config: ConfigMain,
    vars: Vars,
    repo_sack: Option<RepoSack>,
}

impl Default for Base {
    fn default() -> Self {
        Self::new()
    }
}

impl Base {
    pub fn new() -> Self {
        Self {
            config: ConfigMain::new(),
            vars: Vars::new(),
            repo_sack: None,
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

    pub fn vars_mut(&mut self) -> &mut Vars {
        &mut self.vars
    }

    /// Directory configuration paths are resolved under: the installroot,
    /// or `/` with `use_host_config`
    fn config_root(&self) -> PathBuf {
        if *self.config.use_host_config.get() {
            PathBuf::from("/")
        } else {
            PathBuf::from(self.config.installroot.get())
        }
    }

    /// Load the drop-in directories and then the main configuration file.
    ///
    /// Drop-ins (`*.conf`) come from the administrator directory and the
    /// distribution directory, sorted by file name; a name present in both
    /// is taken from the administrator directory. The main file is read
    /// when it was given on the command line or when it exists. Unless the
    /// host configuration is requested, all of these are looked up inside
    /// the installroot; a main file given on the command line is used as is.
    pub fn load_config(&mut self) -> Result<()> {
        let root = self.config_root();
        let dirs = [
            under_root(&root, CONF_DIRECTORY),
            under_root(&root, DISTRIBUTION_CONF_DIRECTORY),
        ];
        for path in create_sorted_file_list(&dirs, "conf") {
            debug!("Loading drop-in {}", path.display());
            self.load_config_file(&path)?;
        }

        let user_defined = self.config.config_file_path.priority() >= Priority::Commandline;
        let configured = self.config.config_file_path.get();
        let main_path = if user_defined {
            PathBuf::from(configured)
        } else {
            under_root(&root, configured)
        };
        match self.load_config_file(&main_path) {
            Ok(()) => {
                info!("Loaded configuration from {}", main_path.display());
                Ok(())
            }
            Err(e @ (Error::MissingConfig(_) | Error::InaccessibleConfig { .. }))
                if !user_defined =>
            {
                debug!("Skipping main configuration: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn load_config_file(&mut self, path: &Path) -> Result<()> {
        let mut parser = ConfigParser::new();
        parser.read(path)?;
        self.config.load_from_parser(&parser, "main", &self.vars);
        Ok(())
    }

    /// Finish configuration and create the repository sack.
    ///
    /// Paths are moved under the installroot (values set on the command
    /// line are kept), variables are loaded, and `installroot` and
    /// `varsdir` are locked for the rest of the session.
    pub fn setup(&mut self) -> Result<()> {
        if self.repo_sack.is_some() {
            return Err(Error::InitError("Base is already set up".to_string()));
        }

        let installroot = PathBuf::from(self.config.installroot.get());
        if !*self.config.use_host_config.get() {
            let reposdirs: Vec<String> = self
                .config
                .reposdir
                .get()
                .iter()
                .map(|dir| under_root(&installroot, dir).display().to_string())
                .collect();
            self.config.reposdir.set(Priority::Installroot, reposdirs)?;
        }

        let vars_root = if self.config.varsdir.priority() >= Priority::Commandline {
            PathBuf::from("/")
        } else {
            installroot.clone()
        };
        let varsdirs = self.config.varsdir.get().clone();
        self.vars.load(&vars_root, &varsdirs);

        for option in [&mut self.config.cachedir, &mut self.config.logdir] {
            if option.priority() < Priority::Commandline {
                let rerooted = under_root(&installroot, option.get()).display().to_string();
                option.set(Priority::Installroot, rerooted)?;
            }
        }

        self.config
            .installroot
            .lock("installroot cannot be changed after setup");
        self.config
            .varsdir
            .lock("varsdir cannot be changed after setup");

        info!(
            "Setup done: installroot {}, arch {}",
            installroot.display(),
            self.vars.get("arch").unwrap_or("unknown")
        );
        self.repo_sack = Some(RepoSack::new(self.config.clone(), self.vars.clone()));
        Ok(())
    }

    pub fn is_setup(&self) -> bool {
        self.repo_sack.is_some()
    }

    pub fn repo_sack(&self) -> Result<&RepoSack> {
        self.repo_sack
            .as_ref()
            .ok_or_else(|| Error::InitError("Base is not set up".to_string()))
    }

    pub fn repo_sack_mut(&mut self) -> Result<&mut RepoSack> {
        self.repo_sack
            .as_mut()
            .ok_or_else(|| Error::InitError("Base is not set up".to_string()))
    }

    /// Path of the system state database
    pub fn system_state_path(&self) -> PathBuf {
        self.config.system_state_path()
    }

    /// Open the system state database, creating it when missing
    pub fn open_system_state(&self) -> Result<Connection> {
        db::open_or_init(&self.system_state_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_in(root: &Path) -> Base {
        let mut base = Base::new();
        base.config_mut()
            .set_by_name("installroot", &root.display().to_string(), Priority::Commandline)
            .unwrap();
        base.vars_mut().set_arch("x86_64", Priority::Commandline);
        base
    }

    fn write(root: &Path, path: &str, content: &str) {
        let path = under_root(root, path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_config_under_installroot() {
        let root = TempDir::new().unwrap();
        write(root.path(), "/etc/dnf/dnf.conf", "[main]\nbest=1\ninstallonly_limit=5\n");
        write(
            root.path(),
            "/usr/share/dnf5/libdnf.conf.d/20-distro.conf",
            "[main]\ninstallonly_limit=2\ngpgcheck=1\n",
        );
        write(
            root.path(),
            "/etc/dnf/libdnf5.conf.d/20-distro.conf",
            "[main]\ninstallonly_limit=4\n",
        );

        let mut base = base_in(root.path());
        base.load_config().unwrap();

        assert!(*base.config().best.get());
        assert_eq!(*base.config().installonly_limit.get(), 5);
        // shadowed by the administrator drop-in of the same name
        assert!(!*base.config().gpgcheck.get());
    }

    #[test]
    fn test_missing_main_config() {
        let root = TempDir::new().unwrap();
        let mut base = base_in(root.path());
        base.load_config().unwrap();

        base.config_mut()
            .config_file_path
            .set(
                Priority::Commandline,
                root.path().join("missing.conf").display().to_string(),
            )
            .unwrap();
        assert!(matches!(base.load_config(), Err(Error::MissingConfig(_))));
    }

    #[test]
    fn test_user_config_path_not_rerooted() {
        let root = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let conf = elsewhere.path().join("my.conf");
        fs::write(&conf, "[main]\nassumeyes=1\n").unwrap();

        let mut base = base_in(root.path());
        base.config_mut()
            .config_file_path
            .set(Priority::Commandline, conf.display().to_string())
            .unwrap();
        base.load_config().unwrap();
        assert!(*base.config().assumeyes.get());
    }

    #[test]
    fn test_setup_reroots_and_locks() {
        let root = TempDir::new().unwrap();
        write(root.path(), "/etc/dnf/vars/contentdir", "fedora\n");
        let mut base = base_in(root.path());
        base.config_mut()
            .set_by_name("logdir", "/tmp/rsdnf-logs", Priority::Commandline)
            .unwrap();
        base.setup().unwrap();

        let cachedir = PathBuf::from(base.config().cachedir.get());
        assert!(cachedir.starts_with(root.path()));
        assert_eq!(base.config().logdir.get(), "/tmp/rsdnf-logs");
        assert!(base.config().reposdir.get()[0].starts_with(&root.path().display().to_string()));
        assert_eq!(base.vars().get("contentdir"), Some("fedora"));
        assert_eq!(base.repo_sack().unwrap().pool().arch(), "x86_64");

        assert!(matches!(
            base.config_mut()
                .installroot
                .set(Priority::Runtime, "/".to_string()),
            Err(Error::OptionLocked(_))
        ));
        assert!(base.setup().is_err());
    }

    #[test]
    fn test_repo_sack_requires_setup() {
        let base = Base::new();
        assert!(!base.is_setup());
        assert!(matches!(base.repo_sack(), Err(Error::InitError(_))));
    }
}
