// src/config/option.rs

//! Prioritized configuration options
//!
//! Every option remembers the priority of the source that last set it. A
//! write with a lower priority than the current one is ignored, so values
//! given on the command line survive later loading of config files.

use crate::error::{Error, Result};

/// Source of an option value, in increasing precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Empty,
    Default,
    MainConfig,
    Repoconfig,
    Installroot,
    Commandline,
    Runtime,
}

/// A value type that can be parsed from and rendered to config text
pub trait OptionValue: Clone {
    fn parse_value(s: &str) -> Option<Self>;
    fn to_value_string(&self) -> String;
}

impl OptionValue for String {
    fn parse_value(s: &str) -> Option<Self> {
        Some(s.trim().to_string())
    }

    fn to_value_string(&self) -> String {
        self.clone()
    }
}

impl OptionValue for bool {
    fn parse_value(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Some(true),
            "0" | "no" | "false" | "off" => Some(false),
            _ => None,
        }
    }

    fn to_value_string(&self) -> String {
        let s = if *self { "1" } else { "0" };
        s.to_string()
    }
}

impl OptionValue for i32 {
    fn parse_value(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }

    fn to_value_string(&self) -> String {
        self.to_string()
    }
}

impl OptionValue for u32 {
    fn parse_value(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }

    fn to_value_string(&self) -> String {
        self.to_string()
    }
}

/// Lists are separated by commas and/or whitespace
impl OptionValue for Vec<String> {
    fn parse_value(s: &str) -> Option<Self> {
        Some(
            s.split(|c: char| c == ',' || c.is_whitespace())
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    fn to_value_string(&self) -> String {
        self.join(", ")
    }
}

/// A duration in seconds. Accepts `s`, `m`, `h` and `d` suffixes; `never`
/// and `-1` mean the value never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seconds(pub i64);

impl Seconds {
    pub const NEVER: Seconds = Seconds(-1);

    pub fn is_never(&self) -> bool {
        self.0 < 0
    }
}

impl OptionValue for Seconds {
    fn parse_value(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s == "never" || s == "-1" {
            return Some(Seconds::NEVER);
        }
        let (number, multiplier) = match s.chars().last()? {
            's' => (&s[..s.len() - 1], 1),
            'm' => (&s[..s.len() - 1], 60),
            'h' => (&s[..s.len() - 1], 60 * 60),
            'd' => (&s[..s.len() - 1], 60 * 60 * 24),
            _ => (s.as_str(), 1),
        };
        let value: i64 = number.parse().ok()?;
        if value < 0 {
            return None;
        }
        Some(Seconds(value * multiplier))
    }

    fn to_value_string(&self) -> String {
        if self.is_never() {
            "never".to_string()
        } else {
            self.0.to_string()
        }
    }
}

/// A configuration option with a priority-tracked value
#[derive(Debug, Clone)]
pub struct ConfigOption<T> {
    value: T,
    priority: Priority,
    locked: Option<String>,
}

impl<T: OptionValue> ConfigOption<T> {
    /// Option holding `default` at `Priority::Default`
    pub fn new(default: T) -> Self {
        Self {
            value: default,
            priority: Priority::Default,
            locked: None,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Store `value` unless the current value came from a higher priority
    pub fn set(&mut self, priority: Priority, value: T) -> Result<()> {
        if let Some(reason) = &self.locked {
            return Err(Error::OptionLocked(reason.clone()));
        }
        if priority >= self.priority {
            self.value = value;
            self.priority = priority;
        }
        Ok(())
    }

    /// Disallow further writes
    pub fn lock(&mut self, reason: impl Into<String>) {
        self.locked = Some(reason.into());
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }
}

/// Type-erased access to an option, used when setting options by name
pub trait AnyOption {
    fn set_str(&mut self, priority: Priority, value: &str) -> std::result::Result<(), String>;
    fn value_string(&self) -> String;
    fn option_priority(&self) -> Priority;
}

impl<T: OptionValue> AnyOption for ConfigOption<T> {
    fn set_str(&mut self, priority: Priority, value: &str) -> std::result::Result<(), String> {
        let parsed = T::parse_value(value).ok_or_else(|| value.to_string())?;
        self.set(priority, parsed).map_err(|e| e.to_string())
    }

    fn value_string(&self) -> String {
        self.value.to_value_string()
    }

    fn option_priority(&self) -> Priority {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lower_priority_does_not_override() {
        let mut opt = ConfigOption::new("default".to_string());
        opt.set(Priority::Commandline, "cli".to_string()).unwrap();
        opt.set(Priority::MainConfig, "file".to_string()).unwrap();
        assert_eq!(opt.get(), "cli");
        assert_eq!(opt.priority(), Priority::Commandline);

        opt.set(Priority::Runtime, "runtime".to_string()).unwrap();
        assert_eq!(opt.get(), "runtime");
    }

    #[test]
    fn test_equal_priority_overrides() {
        let mut opt = ConfigOption::new(1i32);
        opt.set(Priority::MainConfig, 2).unwrap();
        opt.set(Priority::MainConfig, 3).unwrap();
        assert_eq!(*opt.get(), 3);
    }

    #[test]
    fn test_priority_order() {
        assert!(Priority::Default < Priority::MainConfig);
        assert!(Priority::MainConfig < Priority::Repoconfig);
        assert!(Priority::Repoconfig < Priority::Installroot);
        assert!(Priority::Installroot < Priority::Commandline);
        assert!(Priority::Commandline < Priority::Runtime);
    }

    #[test]
    fn test_locked_option_rejects_writes() {
        let mut opt = ConfigOption::new(false);
        opt.lock("Locked by setup");
        assert!(opt.set(Priority::Runtime, true).is_err());
        assert!(!opt.get());
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(bool::parse_value("Yes"), Some(true));
        assert_eq!(bool::parse_value("off"), Some(false));
        assert_eq!(bool::parse_value("maybe"), None);
        assert_eq!(
            Vec::<String>::parse_value("a, b  c,,d"),
            Some(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        );
        assert_eq!(Seconds::parse_value("2h"), Some(Seconds(7200)));
        assert_eq!(Seconds::parse_value("90"), Some(Seconds(90)));
        assert_eq!(Seconds::parse_value("never"), Some(Seconds::NEVER));
        assert_eq!(Seconds::parse_value("-5"), None);
    }

    #[test]
    fn test_set_by_string() {
        let mut opt = ConfigOption::new(99i32);
        let any: &mut dyn AnyOption = &mut opt;
        any.set_str(Priority::Repoconfig, "10").unwrap();
        assert!(any.set_str(Priority::Repoconfig, "ten").is_err());
        assert_eq!(any.value_string(), "10");
        assert_eq!(any.option_priority(), Priority::Repoconfig);
    }
}
