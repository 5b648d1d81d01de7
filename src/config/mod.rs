// src/config/mod.rs

//! Configuration
//!
//! `ConfigMain` holds the `[main]` options of `dnf.conf` and its drop-ins,
//! `RepoConfig` the options of one `.repo` section. Options are set by name
//! from config files, `--setopt` and the command line; each write carries a
//! `Priority` and never overrides a higher-priority value.

pub mod option;
pub mod parser;
pub mod repo;
pub mod vars;

pub use option::{AnyOption, ConfigOption, OptionValue, Priority, Seconds};
pub use parser::ConfigParser;
pub use repo::RepoConfig;
pub use vars::Vars;

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default location of the main configuration file
pub const CONFIG_FILE_PATH: &str = "/etc/dnf/dnf.conf";

/// Drop-in directory for administrator overrides
pub const CONF_DIRECTORY: &str = "/etc/dnf/libdnf5.conf.d";

/// Drop-in directory for distribution defaults
pub const DISTRIBUTION_CONF_DIRECTORY: &str = "/usr/share/dnf5/libdnf.conf.d";

/// Name of the system state database inside `system_state_dir`
pub const SYSTEM_STATE_DB: &str = "system.db";

/// Options of the `[main]` section
#[derive(Debug, Clone)]
pub struct ConfigMain {
    pub config_file_path: ConfigOption<String>,
    pub use_host_config: ConfigOption<bool>,
    pub installroot: ConfigOption<String>,
    pub reposdir: ConfigOption<Vec<String>>,
    pub varsdir: ConfigOption<Vec<String>>,
    pub cachedir: ConfigOption<String>,
    pub system_state_dir: ConfigOption<String>,
    pub logdir: ConfigOption<String>,
    pub metadata_expire: ConfigOption<Seconds>,
    pub skip_if_unavailable: ConfigOption<bool>,
    pub excludepkgs: ConfigOption<Vec<String>>,
    pub includepkgs: ConfigOption<Vec<String>>,
    pub installonlypkgs: ConfigOption<Vec<String>>,
    pub installonly_limit: ConfigOption<u32>,
    pub install_weak_deps: ConfigOption<bool>,
    pub best: ConfigOption<bool>,
    pub clean_requirements_on_remove: ConfigOption<bool>,
    pub gpgcheck: ConfigOption<bool>,
    pub assumeyes: ConfigOption<bool>,
    pub cacheonly: ConfigOption<bool>,
    pub optional_metadata_types: ConfigOption<Vec<String>>,
    /// Days a package counts as recent for `repoquery --recent`
    pub recent: ConfigOption<u32>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ConfigMain {
    fn default() -> Self {
        Self {
            config_file_path: ConfigOption::new(CONFIG_FILE_PATH.to_string()),
            use_host_config: ConfigOption::new(false),
            installroot: ConfigOption::new("/".to_string()),
            reposdir: ConfigOption::new(strings(&[
                "/etc/yum.repos.d",
                "/etc/distro.repos.d",
                "/usr/share/dnf5/repos.d",
            ])),
            varsdir: ConfigOption::new(strings(&["/etc/dnf/vars", "/usr/share/dnf5/vars.d"])),
            cachedir: ConfigOption::new("/var/cache/rsdnf".to_string()),
            system_state_dir: ConfigOption::new("/usr/lib/sysimage/rsdnf".to_string()),
            logdir: ConfigOption::new("/var/log".to_string()),
            metadata_expire: ConfigOption::new(Seconds(48 * 60 * 60)),
            skip_if_unavailable: ConfigOption::new(false),
            excludepkgs: ConfigOption::new(Vec::new()),
            includepkgs: ConfigOption::new(Vec::new()),
            installonlypkgs: ConfigOption::new(strings(&[
                "kernel",
                "kernel-PAE",
                "installonlypkg(kernel)",
                "installonlypkg(kernel-module)",
                "installonlypkg(vm)",
                "multiversion(kernel)",
            ])),
            installonly_limit: ConfigOption::new(3),
            install_weak_deps: ConfigOption::new(true),
            best: ConfigOption::new(false),
            clean_requirements_on_remove: ConfigOption::new(true),
            gpgcheck: ConfigOption::new(false),
            assumeyes: ConfigOption::new(false),
            cacheonly: ConfigOption::new(false),
            optional_metadata_types: ConfigOption::new(strings(&["comps"])),
            recent: ConfigOption::new(7),
        }
    }
}

impl ConfigMain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all options, in the order they are listed in `dump`
    pub const OPTION_NAMES: [&'static str; 22] = [
        "config_file_path",
        "use_host_config",
        "installroot",
        "reposdir",
        "varsdir",
        "cachedir",
        "system_state_dir",
        "logdir",
        "metadata_expire",
        "skip_if_unavailable",
        "excludepkgs",
        "includepkgs",
        "installonlypkgs",
        "installonly_limit",
        "install_weak_deps",
        "best",
        "clean_requirements_on_remove",
        "gpgcheck",
        "assumeyes",
        "cacheonly",
        "optional_metadata_types",
        "recent",
    ];

    /// Look up an option by its config file name
    pub fn option(&self, name: &str) -> Option<&dyn AnyOption> {
        let opt: &dyn AnyOption = match name {
            "config_file_path" => &self.config_file_path,
            "use_host_config" => &self.use_host_config,
            "installroot" => &self.installroot,
            "reposdir" => &self.reposdir,
            "varsdir" => &self.varsdir,
            "cachedir" => &self.cachedir,
            "system_state_dir" => &self.system_state_dir,
            "logdir" => &self.logdir,
            "metadata_expire" => &self.metadata_expire,
            "skip_if_unavailable" => &self.skip_if_unavailable,
            "excludepkgs" | "exclude" => &self.excludepkgs,
            "includepkgs" => &self.includepkgs,
            "installonlypkgs" => &self.installonlypkgs,
            "installonly_limit" => &self.installonly_limit,
            "install_weak_deps" => &self.install_weak_deps,
            "best" => &self.best,
            "clean_requirements_on_remove" => &self.clean_requirements_on_remove,
            "gpgcheck" => &self.gpgcheck,
            "assumeyes" => &self.assumeyes,
            "cacheonly" => &self.cacheonly,
            "optional_metadata_types" => &self.optional_metadata_types,
            "recent" => &self.recent,
            _ => return None,
        };
        Some(opt)
    }

    pub fn option_mut(&mut self, name: &str) -> Option<&mut dyn AnyOption> {
        let opt: &mut dyn AnyOption = match name {
            "config_file_path" => &mut self.config_file_path,
            "use_host_config" => &mut self.use_host_config,
            "installroot" => &mut self.installroot,
            "reposdir" => &mut self.reposdir,
            "varsdir" => &mut self.varsdir,
            "cachedir" => &mut self.cachedir,
            "system_state_dir" => &mut self.system_state_dir,
            "logdir" => &mut self.logdir,
            "metadata_expire" => &mut self.metadata_expire,
            "skip_if_unavailable" => &mut self.skip_if_unavailable,
            "excludepkgs" | "exclude" => &mut self.excludepkgs,
            "includepkgs" => &mut self.includepkgs,
            "installonlypkgs" => &mut self.installonlypkgs,
            "installonly_limit" => &mut self.installonly_limit,
            "install_weak_deps" => &mut self.install_weak_deps,
            "best" => &mut self.best,
            "clean_requirements_on_remove" => &mut self.clean_requirements_on_remove,
            "gpgcheck" => &mut self.gpgcheck,
            "assumeyes" => &mut self.assumeyes,
            "cacheonly" => &mut self.cacheonly,
            "optional_metadata_types" => &mut self.optional_metadata_types,
            "recent" => &mut self.recent,
            _ => return None,
        };
        Some(opt)
    }

    /// Set an option from its textual value
    pub fn set_by_name(&mut self, name: &str, value: &str, priority: Priority) -> Result<()> {
        let opt = self
            .option_mut(name)
            .ok_or_else(|| Error::UnknownOption(name.to_string()))?;
        opt.set_str(priority, value)
            .map_err(|_| Error::InvalidOptionValue {
                option: name.to_string(),
                value: value.to_string(),
            })
    }

    /// Apply the entries of `section` at `Priority::MainConfig`, expanding
    /// variables. Unknown options and invalid values are logged and skipped.
    pub fn load_from_parser(&mut self, parser: &ConfigParser, section: &str, vars: &Vars) {
        let Some(entries) = parser.section(section) else {
            return;
        };
        for (key, value) in entries {
            let value = vars.substitute(value);
            if let Err(e) = self.set_by_name(key, &value, Priority::MainConfig) {
                warn!("Config error in section [{}]: {}", section, e);
            }
        }
    }

    /// `(name, value)` of every option
    pub fn dump(&self) -> Vec<(&'static str, String)> {
        Self::OPTION_NAMES
            .iter()
            .filter_map(|name| self.option(name).map(|opt| (*name, opt.value_string())))
            .collect()
    }

    /// `path` placed under the installroot
    pub fn installroot_path(&self, path: &str) -> PathBuf {
        under_root(Path::new(self.installroot.get()), path)
    }

    /// Location of the system state database
    pub fn system_state_path(&self) -> PathBuf {
        self.installroot_path(self.system_state_dir.get())
            .join(SYSTEM_STATE_DB)
    }
}

/// Join `path` below `root`, treating an absolute `path` as relative
pub fn under_root(root: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    root.join(path.strip_prefix("/").unwrap_or(path))
}

/// Files with extension `ext` found in `dirs`, sorted by file name. When
/// several directories hold a file of the same name, the one in the earliest
/// directory wins. Missing directories are skipped.
pub fn create_sorted_file_list<P: AsRef<Path>>(dirs: &[P], ext: &str) -> Vec<PathBuf> {
    let mut seen: HashSet<OsString> = HashSet::new();
    let mut files: Vec<PathBuf> = Vec::new();

    for dir in dirs {
        let dir = dir.as_ref();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Skipping directory {}: {}", dir.display(), e);
                continue;
            }
        };
        let mut found: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == ext))
            .collect();
        found.sort();
        for path in found {
            if let Some(name) = path.file_name() {
                if seen.insert(name.to_os_string()) {
                    files.push(path);
                }
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConfigMain::new();
        assert_eq!(config.config_file_path.get(), CONFIG_FILE_PATH);
        assert_eq!(config.installroot.get(), "/");
        assert_eq!(config.reposdir.get().len(), 3);
        assert!(*config.install_weak_deps.get());
        assert_eq!(config.installroot.priority(), Priority::Default);
    }

    #[test]
    fn test_set_by_name() {
        let mut config = ConfigMain::new();
        config
            .set_by_name("installonly_limit", "5", Priority::MainConfig)
            .unwrap();
        assert_eq!(*config.installonly_limit.get(), 5);

        config.set_by_name("exclude", "kernel*", Priority::Commandline).unwrap();
        assert_eq!(config.excludepkgs.get(), &vec!["kernel*".to_string()]);

        assert!(matches!(
            config.set_by_name("nonsense", "1", Priority::MainConfig),
            Err(Error::UnknownOption(_))
        ));
        assert!(matches!(
            config.set_by_name("best", "perhaps", Priority::MainConfig),
            Err(Error::InvalidOptionValue { .. })
        ));
    }

    #[test]
    fn test_load_from_parser_respects_commandline() {
        let mut config = ConfigMain::new();
        config.set_by_name("best", "0", Priority::Commandline).unwrap();

        let mut parser = ConfigParser::new();
        parser
            .read_str(
                "[main]\nbest=1\ncachedir=/var/cache/$basearch\nbogus=1\n",
                "dnf.conf",
            )
            .unwrap();
        let mut vars = Vars::new();
        vars.set_arch("x86_64", Priority::Default);

        config.load_from_parser(&parser, "main", &vars);
        assert!(!config.best.get());
        assert_eq!(config.cachedir.get(), "/var/cache/x86_64");
        assert_eq!(config.cachedir.priority(), Priority::MainConfig);
    }

    #[test]
    fn test_system_state_path_under_installroot() {
        let mut config = ConfigMain::new();
        config
            .set_by_name("installroot", "/mnt/sysroot", Priority::Commandline)
            .unwrap();
        assert_eq!(
            config.system_state_path(),
            PathBuf::from("/mnt/sysroot/usr/lib/sysimage/rsdnf/system.db")
        );
    }

    #[test]
    fn test_sorted_file_list_first_directory_wins() {
        let etc = tempfile::TempDir::new().unwrap();
        let usr = tempfile::TempDir::new().unwrap();
        fs::write(etc.path().join("20-local.conf"), "[main]\n").unwrap();
        fs::write(etc.path().join("notes.txt"), "").unwrap();
        fs::write(usr.path().join("20-local.conf"), "[main]\n").unwrap();
        fs::write(usr.path().join("10-distro.conf"), "[main]\n").unwrap();

        let files = create_sorted_file_list(
            &[etc.path(), usr.path(), Path::new("/nonexistent/rsdnf")],
            "conf",
        );
        assert_eq!(
            files,
            vec![
                usr.path().join("10-distro.conf"),
                etc.path().join("20-local.conf"),
            ]
        );
    }

    #[test]
    fn test_dump_lists_every_option() {
        let config = ConfigMain::new();
        let dump = config.dump();
        assert_eq!(dump.len(), ConfigMain::OPTION_NAMES.len());
        assert!(dump.contains(&("metadata_expire", "172800".to_string())));
    }
}
