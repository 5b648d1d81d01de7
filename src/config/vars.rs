// src/config/vars.rs

//! Substitution variables (`$releasever`, `$basearch`, ...)

use super::option::Priority;
use crate::sack::basearch;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Variable {
    value: String,
    priority: Priority,
}

/// Variables substituted into repo ids and config values
#[derive(Debug, Clone, Default)]
pub struct Vars {
    vars: HashMap<String, Variable>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` unless it already holds a higher-priority value
    pub fn set(&mut self, name: &str, value: impl Into<String>, priority: Priority) {
        if let Some(existing) = self.vars.get(name) {
            if existing.priority > priority {
                return;
            }
        }
        self.vars.insert(
            name.to_string(),
            Variable {
                value: value.into(),
                priority,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|v| v.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Sorted `(name, value)` pairs
    pub fn iter_sorted(&self) -> Vec<(&str, &str)> {
        let mut all: Vec<(&str, &str)> = self
            .vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.value.as_str()))
            .collect();
        all.sort();
        all
    }

    /// Set `arch` and `basearch`
    pub fn set_arch(&mut self, arch: &str, priority: Priority) {
        self.set("arch", arch, priority);
        self.set("basearch", basearch(arch), priority);
    }

    /// Load the built-in variables and the variables found in
    /// `installroot`: `releasever` from os-release, then files in
    /// `varsdirs` (the first directory defining a name wins), then the
    /// `DNF_VAR_*` environment.
    pub fn load(&mut self, installroot: &Path, varsdirs: &[String]) {
        if !self.contains("arch") {
            self.set_arch(std::env::consts::ARCH, Priority::Default);
        }
        if !self.contains("releasever") {
            if let Some(releasever) = detect_releasever(installroot) {
                debug!("Detected releasever {}", releasever);
                self.set("releasever", releasever, Priority::Default);
            }
        }

        for dir in varsdirs.iter().rev() {
            let dir = installroot.join(Path::new(dir).strip_prefix("/").unwrap_or(Path::new(dir)));
            self.load_from_dir(&dir);
        }
        self.load_from_env();
    }

    /// Each file in `dir` defines a variable named after the file, with the
    /// first line of its content as value
    pub fn load_from_dir(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_valid_name(name) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => {
                    let value = content.lines().next().unwrap_or("").trim().to_string();
                    self.set(name, value, Priority::MainConfig);
                }
                Err(e) => warn!("Cannot read variable file {}: {}", path.display(), e),
            }
        }
    }

    /// `DNF_VAR_<name>` and `DNF0`..`DNF9` environment variables
    pub fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix("DNF_VAR_") {
                if is_valid_name(name) {
                    self.set(name, value, Priority::Commandline);
                }
            } else if key.len() == 4 && key.starts_with("DNF") && key.as_bytes()[3].is_ascii_digit() {
                self.set(&key, value, Priority::Commandline);
            }
        }
    }

    /// Expand `$name`, `${name}`, `${name:-default}` and
    /// `${name:+alternate}`. Unknown variables are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(braced) = after.strip_prefix('{') {
                if let Some(end) = braced.find('}') {
                    let inner = &braced[..end];
                    if let Some(expanded) = self.expand_braced(inner) {
                        out.push_str(&expanded);
                        rest = &braced[end + 1..];
                        continue;
                    }
                }
                out.push('$');
                rest = after;
                continue;
            }

            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..len];
            match self.get(name) {
                Some(value) if !name.is_empty() => {
                    out.push_str(value);
                    rest = &after[len..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn expand_braced(&self, inner: &str) -> Option<String> {
        if let Some((name, default)) = inner.split_once(":-") {
            return Some(match self.get(name) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => self.substitute(default),
            });
        }
        if let Some((name, alternate)) = inner.split_once(":+") {
            return Some(match self.get(name) {
                Some(value) if !value.is_empty() => self.substitute(alternate),
                _ => String::new(),
            });
        }
        if is_valid_name(inner) {
            return self.get(inner).map(str::to_string);
        }
        None
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `VERSION_ID` from the installroot's os-release
fn detect_releasever(installroot: &Path) -> Option<String> {
    for candidate in ["etc/os-release", "usr/lib/os-release"] {
        if let Ok(content) = fs::read_to_string(installroot.join(candidate)) {
            for line in content.lines() {
                if let Some(value) = line.strip_prefix("VERSION_ID=") {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() {
                        return Some(value.to_string());
                    }
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars() -> Vars {
        let mut vars = Vars::new();
        vars.set("releasever", "40", Priority::Default);
        vars.set_arch("x86_64", Priority::Default);
        vars
    }

    #[test]
    fn test_substitute_forms() {
        let vars = vars();
        assert_eq!(
            vars.substitute("fedora-$releasever-$basearch"),
            "fedora-40-x86_64"
        );
        assert_eq!(vars.substitute("${releasever}x"), "40x");
        assert_eq!(vars.substitute("$unknown/$"), "$unknown/$");
        assert_eq!(vars.substitute("${missing:-fallback}"), "fallback");
        assert_eq!(vars.substitute("${arch:+has-arch}"), "has-arch");
        assert_eq!(vars.substitute("${missing:+x}"), "");
        assert_eq!(vars.substitute("${unclosed"), "${unclosed");
    }

    #[test]
    fn test_priority() {
        let mut vars = vars();
        vars.set("releasever", "41", Priority::Commandline);
        vars.set("releasever", "39", Priority::MainConfig);
        assert_eq!(vars.get("releasever"), Some("41"));
    }

    #[test]
    fn test_load_from_installroot() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("etc/dnf/vars")).unwrap();
        std::fs::create_dir_all(root.path().join("usr/share/dnf5/vars.d")).unwrap();
        std::fs::write(root.path().join("etc/dnf/vars/stream"), "9-stream\n").unwrap();
        std::fs::write(root.path().join("usr/share/dnf5/vars.d/stream"), "8\n").unwrap();
        std::fs::write(root.path().join("usr/share/dnf5/vars.d/contentdir"), "pub\n").unwrap();
        std::fs::write(root.path().join("etc/os-release"), "NAME=Test\nVERSION_ID=\"12\"\n").unwrap();

        let mut vars = Vars::new();
        vars.load(
            root.path(),
            &["/etc/dnf/vars".to_string(), "/usr/share/dnf5/vars.d".to_string()],
        );

        assert_eq!(vars.get("stream"), Some("9-stream"));
        assert_eq!(vars.get("contentdir"), Some("pub"));
        assert_eq!(vars.get("releasever"), Some("12"));
        assert!(vars.get("basearch").is_some());
    }
}
