// src/output/mod.rs

//! Rendering query results and transactions for the terminal
//!
//! Every printer writes to a caller-supplied `io::Write`, so the CLI passes
//! stdout while tests collect into a buffer.

pub mod changelogs;
pub mod groups;
pub mod info;
pub mod queryformat;
pub mod tables;

pub use changelogs::{ChangelogFilter, print_changelogs};
pub use groups::{print_group_info, print_group_list};
pub use info::PackageInfoSections;
pub use queryformat::{
    DEFAULT_QUERY_FORMAT, PACKAGE_ATTRS, format_package, package_attr, print_available_pkg_attrs,
    print_pkg_attr_uniq_sorted, print_pkg_set_with_format, requires_filelists,
};
pub use tables::{print_history, print_history_info, print_repolist, print_transaction_table};

/// Width used when the terminal size cannot be determined
const DEFAULT_WIDTH: usize = 80;

/// Current terminal width
pub fn term_width() -> usize {
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(DEFAULT_WIDTH)
}

/// Human readable size in binary units (`1.5 KiB`)
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

/// Greedy word wrap of `text` into lines of at most `width` characters.
/// Explicit line breaks are kept; a word longer than `width` gets its own
/// line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() {
                word.chars().count()
            } else {
                line.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(
            wrap_text("The GNU Bourne Again shell (Bash)", 12),
            vec!["The GNU", "Bourne Again", "shell (Bash)"]
        );
        assert_eq!(wrap_text("first\n\nsecond", 80), vec!["first", "", "second"]);
        assert_eq!(wrap_text("", 10), vec![""]);
        assert_eq!(
            wrap_text("a supercalifragilistic word", 5),
            vec!["a", "supercalifragilistic", "word"]
        );
    }
}
