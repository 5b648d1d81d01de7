// src/config/parser.rs

//! INI parser for `dnf.conf`, drop-ins and `.repo` files
//!
//! Sections are `[name]`, entries `key = value` (or `key: value`). Lines
//! starting with `#` or `;` are comments. An indented line continues the
//! previous value, joined with a newline.

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Parsed INI document, keeping section and key order
#[derive(Debug, Clone, Default)]
pub struct ConfigParser {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl ConfigParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse the file at `path`, adding its sections
    pub fn read(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::MissingConfig(path.display().to_string()),
            _ => Error::InaccessibleConfig {
                path: path.display().to_string(),
                reason: e.to_string(),
            },
        })?;
        self.read_str(&content, &path.display().to_string())
    }

    /// Parse `content`; `origin` names the source in error messages
    pub fn read_str(&mut self, content: &str, origin: &str) -> Result<()> {
        let error = |line: usize, message: &str| Error::ConfigParse {
            path: origin.to_string(),
            line,
            message: message.to_string(),
        };

        let mut current: Option<usize> = None;
        let mut last_key: Option<usize> = None;

        for (idx, raw) in content.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = raw.trim();

            if trimmed.is_empty() {
                last_key = None;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if raw.starts_with([' ', '\t']) {
                if let (Some(section), Some(key)) = (current, last_key) {
                    let value = &mut self.sections[section].1[key].1;
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                    continue;
                }
            }

            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| error(lineno, "Malformed section header"))?;
                if self.has_section(name) {
                    return Err(error(lineno, &format!("Duplicate section \"{}\"", name)));
                }
                self.sections.push((name.to_string(), Vec::new()));
                current = Some(self.sections.len() - 1);
                last_key = None;
                continue;
            }

            let section = current.ok_or_else(|| error(lineno, "Key outside of a section"))?;
            let (key, value) = trimmed
                .split_once(['=', ':'])
                .ok_or_else(|| error(lineno, "Expected \"key = value\""))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(error(lineno, "Empty key"));
            }

            let entries = &mut self.sections[section].1;
            match entries.iter().position(|(k, _)| k == key) {
                Some(pos) => {
                    entries[pos].1 = value.trim().to_string();
                    last_key = Some(pos);
                }
                None => {
                    entries.push((key.to_string(), value.trim().to_string()));
                    last_key = Some(entries.len() - 1);
                }
            }
        }

        Ok(())
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.sections.iter().any(|(s, _)| s == name)
    }

    /// Section names in file order
    pub fn section_names(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|(s, _)| s.as_str())
    }

    /// Entries of a section in file order
    pub fn section(&self, name: &str) -> Option<&[(String, String)]> {
        self.sections
            .iter()
            .find(|(s, _)| s == name)
            .map(|(_, entries)| entries.as_slice())
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
