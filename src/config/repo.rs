// src/config/repo.rs

//! Per-repository options from `.repo` sections

use super::option::{AnyOption, ConfigOption, Priority, Seconds};
use super::parser::ConfigParser;
use super::vars::Vars;
use super::ConfigMain;
use crate::error::{Error, Result};
use tracing::warn;

/// Options of one repository section
#[derive(Debug, Clone)]
pub struct RepoConfig {
    pub name: ConfigOption<String>,
    pub baseurl: ConfigOption<Vec<String>>,
    pub mirrorlist: ConfigOption<String>,
    pub metalink: ConfigOption<String>,
    pub enabled: ConfigOption<bool>,
    pub priority: ConfigOption<i32>,
    pub cost: ConfigOption<i32>,
    pub metadata_expire: ConfigOption<Seconds>,
    pub skip_if_unavailable: ConfigOption<bool>,
    pub excludepkgs: ConfigOption<Vec<String>>,
    pub includepkgs: ConfigOption<Vec<String>>,
    pub gpgcheck: ConfigOption<bool>,
    pub gpgkey: ConfigOption<Vec<String>>,
}

impl RepoConfig {
    /// Repository options, with inheritable values taken from `main`
    pub fn new(main: &ConfigMain) -> Self {
        Self {
            name: ConfigOption::new(String::new()),
            baseurl: ConfigOption::new(Vec::new()),
            mirrorlist: ConfigOption::new(String::new()),
            metalink: ConfigOption::new(String::new()),
            enabled: ConfigOption::new(true),
            priority: ConfigOption::new(99),
            cost: ConfigOption::new(1000),
            metadata_expire: ConfigOption::new(*main.metadata_expire.get()),
            skip_if_unavailable: ConfigOption::new(*main.skip_if_unavailable.get()),
            excludepkgs: ConfigOption::new(Vec::new()),
            includepkgs: ConfigOption::new(Vec::new()),
            gpgcheck: ConfigOption::new(*main.gpgcheck.get()),
            gpgkey: ConfigOption::new(Vec::new()),
        }
    }

    pub const OPTION_NAMES: [&'static str; 13] = [
        "name",
        "baseurl",
        "mirrorlist",
        "metalink",
        "enabled",
        "priority",
        "cost",
        "metadata_expire",
        "skip_if_unavailable",
        "excludepkgs",
        "includepkgs",
        "gpgcheck",
        "gpgkey",
    ];

    pub fn option(&self, name: &str) -> Option<&dyn AnyOption> {
        let opt: &dyn AnyOption = match name {
            "name" => &self.name,
            "baseurl" => &self.baseurl,
            "mirrorlist" => &self.mirrorlist,
            "metalink" => &self.metalink,
            "enabled" => &self.enabled,
            "priority" => &self.priority,
            "cost" => &self.cost,
            "metadata_expire" => &self.metadata_expire,
            "skip_if_unavailable" => &self.skip_if_unavailable,
            "excludepkgs" | "exclude" => &self.excludepkgs,
            "includepkgs" => &self.includepkgs,
            "gpgcheck" => &self.gpgcheck,
            "gpgkey" => &self.gpgkey,
            _ => return None,
        };
        Some(opt)
    }

    pub fn option_mut(&mut self, name: &str) -> Option<&mut dyn AnyOption> {
        let opt: &mut dyn AnyOption = match name {
            "name" => &mut self.name,
            "baseurl" => &mut self.baseurl,
            "mirrorlist" => &mut self.mirrorlist,
            "metalink" => &mut self.metalink,
            "enabled" => &mut self.enabled,
            "priority" => &mut self.priority,
            "cost" => &mut self.cost,
            "metadata_expire" => &mut self.metadata_expire,
            "skip_if_unavailable" => &mut self.skip_if_unavailable,
            "excludepkgs" | "exclude" => &mut self.excludepkgs,
            "includepkgs" => &mut self.includepkgs,
            "gpgcheck" => &mut self.gpgcheck,
            "gpgkey" => &mut self.gpgkey,
            _ => return None,
        };
        Some(opt)
    }

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

    /// Apply a `.repo` section at `Priority::Repoconfig`
    pub fn load_from_parser(&mut self, parser: &ConfigParser, section: &str, vars: &Vars) {
        let Some(entries) = parser.section(section) else {
            return;
        };
        for (key, value) in entries {
            let value = vars.substitute(value);
            if let Err(e) = self.set_by_name(key, &value, Priority::Repoconfig) {
                warn!("Config error in repository [{}]: {}", section, e);
            }
        }
    }

    pub fn dump(&self) -> Vec<(&'static str, String)> {
        Self::OPTION_NAMES
            .iter()
            .filter_map(|name| self.option(name).map(|opt| (*name, opt.value_string())))
            .collect()
    }
}
