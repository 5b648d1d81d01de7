// src/sack/mod.rs

//! In-memory package pool and queries over it
//!
//! All loaded package metadata (available repositories, the installed
//! system, command-line packages) is internalized into a single `Pool`.
//! `PackageQuery` is a set-like view over the pool narrowed by filters.

mod pool;
mod query;
mod set;
mod spec;

pub use pool::{Pool, PoolRepo, basearch, compatible_arches};
pub use query::{ExcludeFlags, PackageQuery, arch_upgradable};
pub use set::PackageSet;
pub use spec::ResolveSpecSettings;

use fast_glob::glob_match;

/// Index of a package in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(usize);

impl PackageId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Kind of repository a package was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoKind {
    Available,
    System,
    Cmdline,
}

/// Id of the installed-system pseudo repository
pub const SYSTEM_REPO_ID: &str = "@System";

/// Id of the command-line packages pseudo repository
pub const CMDLINE_REPO_ID: &str = "@commandline";

/// String comparison used by query filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryCmp {
    Eq,
    Neq,
    IEq,
    Glob,
    IGlob,
    Contains,
    IContains,
}

impl QueryCmp {
    /// Glob comparison, case-insensitive when `icase` is set
    pub fn glob(icase: bool) -> Self {
        if icase { QueryCmp::IGlob } else { QueryCmp::Glob }
    }
}

/// Whether `pattern` contains glob metacharacters
pub fn is_glob_pattern(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Stands in for `/` so that `*` and `?` match across path components
const SEPARATOR: char = '\u{1f}';

/// Shell-style matching where `/` is an ordinary character. Brace groups
/// and a leading `!` carry no special meaning.
fn fnmatch(pattern: &str, value: &str) -> bool {
    let mut glob = String::with_capacity(pattern.len() + 4);
    let mut escaped = false;
    for (i, c) in pattern.chars().enumerate() {
        match c {
            '/' => glob.push(SEPARATOR),
            _ if escaped => glob.push(c),
            '{' | '}' => {
                glob.push('\\');
                glob.push(c);
            }
            '!' if i == 0 => glob.push_str("\\!"),
            _ => glob.push(c),
        }
        escaped = c == '\\' && !escaped;
    }
    glob_match(&glob, &value.replace('/', SEPARATOR.encode_utf8(&mut [0; 4])))
}

/// Compare `value` against `pattern` with `cmp`
pub fn match_string(value: &str, pattern: &str, cmp: QueryCmp) -> bool {
    match cmp {
        QueryCmp::Eq => value == pattern,
        QueryCmp::Neq => value != pattern,
        QueryCmp::IEq => value.to_lowercase() == pattern.to_lowercase(),
        QueryCmp::Glob => {
            if is_glob_pattern(pattern) {
                fnmatch(pattern, value)
            } else {
                value == pattern
            }
        }
        QueryCmp::IGlob => {
            let pattern = pattern.to_lowercase();
            let value = value.to_lowercase();
            if is_glob_pattern(&pattern) {
                fnmatch(&pattern, &value)
            } else {
                value == pattern
            }
        }
        QueryCmp::Contains => value.contains(pattern),
        QueryCmp::IContains => value.to_lowercase().contains(&pattern.to_lowercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_string() {
        assert!(match_string("bash", "bash", QueryCmp::Eq));
        assert!(match_string("bash", "zsh", QueryCmp::Neq));
        assert!(match_string("Bash", "bASH", QueryCmp::IEq));
        assert!(match_string("bash-completion", "bash*", QueryCmp::Glob));
        assert!(!match_string("Bash", "bash*", QueryCmp::Glob));
        assert!(match_string("Bash", "bash*", QueryCmp::IGlob));
        assert!(match_string("python3-libs", "on3", QueryCmp::Contains));
        assert!(match_string("Python3", "PYTHON", QueryCmp::IContains));
    }

    #[test]
    fn test_glob_crosses_path_separators() {
        assert!(match_string("/usr/lib64/libfoo.so.1", "/usr/*", QueryCmp::Glob));
        assert!(match_string("/usr/lib64/libfoo.so.1", "*/libfoo.so.1", QueryCmp::Glob));
        assert!(match_string("/usr/lib64/libfoo.so.1", "/usr/lib??/lib*.so.?", QueryCmp::Glob));
        assert!(match_string("/USR/bin/Vim", "/usr/*/vim", QueryCmp::IGlob));
        assert!(!match_string("/usr/bin/vim", "/etc/*", QueryCmp::Glob));
    }

    #[test]
    fn test_glob_literal_braces_and_bang() {
        assert!(match_string("perl(Foo::{bar})", "perl(Foo::{*})", QueryCmp::Glob));
        assert!(!match_string("perl(Foo::a)", "perl(Foo::{a,b})", QueryCmp::Glob));
        assert!(match_string("!weird", "!wei*", QueryCmp::Glob));
        assert!(!match_string("weird", "!x*", QueryCmp::Glob));
    }

    #[test]
    fn test_is_glob_pattern() {
        assert!(is_glob_pattern("ba*"));
        assert!(is_glob_pattern("b?sh"));
        assert!(is_glob_pattern("[bz]sh"));
        assert!(!is_glob_pattern("bash"));
    }
}
