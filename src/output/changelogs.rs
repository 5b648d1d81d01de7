// src/output/changelogs.rs

//! Changelog listing for `repoquery --changelogs` and `changelog`

use crate::rpm::Changelog;
use crate::sack::PackageQuery;
use chrono::DateTime;
use std::io::{self, Write};

/// Which changelog entries to show per package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangelogFilter {
    #[default]
    All,
    /// Only the newest `n` entries
    Count(usize),
    /// Entries at or after this unix timestamp
    Since(i64),
}

impl ChangelogFilter {
    fn select<'a>(&self, entries: &'a [Changelog]) -> Vec<&'a Changelog> {
        let mut sorted: Vec<&Changelog> = entries.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        match *self {
            ChangelogFilter::All => sorted,
            ChangelogFilter::Count(n) => sorted.into_iter().take(n).collect(),
            ChangelogFilter::Since(ts) => sorted.into_iter().filter(|c| c.timestamp >= ts).collect(),
        }
    }
}

fn format_date(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%a %b %d %Y").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Print the changelogs of every package in `query`, newest entry first.
/// Packages are printed in NEVRA order.
pub fn print_changelogs(
    out: &mut impl Write,
    query: &PackageQuery<'_>,
    filter: ChangelogFilter,
) -> io::Result<()> {
    for pkg in query.sorted() {
        writeln!(out, "Changelogs for {}", pkg.full_nevra())?;
        for entry in filter.select(&pkg.data().changelogs) {
            writeln!(out, "* {} {}", format_date(entry.timestamp), entry.author)?;
            writeln!(out, "{}", entry.text)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::PackageData;
    use crate::sack::{ExcludeFlags, Pool, PoolRepo, RepoKind};
    use crate::version::Evr;

    fn entry(timestamp: i64, author: &str, text: &str) -> Changelog {
        Changelog {
            timestamp,
            author: author.to_string(),
            text: text.to_string(),
        }
    }

    fn pool() -> Pool {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let mut data = PackageData::new("bash", Evr::new(0, "5.2", "1"), "x86_64");
        data.changelogs = vec![
            // 2024-01-15 and 2024-03-01, both at noon UTC
            entry(1705320000, "Alice <alice@example.com> - 5.2-0", "- Rebuilt"),
            entry(1709294400, "Bob <bob@example.com> - 5.2-1", "- Update to 5.2"),
        ];
        pool.add_package(repo, data);
        pool
    }

    fn render(pool: &Pool, filter: ChangelogFilter) -> String {
        let query = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        let mut buf = Vec::new();
        print_changelogs(&mut buf, &query, filter).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_newest_first() {
        let pool = pool();
        assert_eq!(
            render(&pool, ChangelogFilter::All),
            "Changelogs for bash-0:5.2-1.x86_64\n\
             * Fri Mar 01 2024 Bob <bob@example.com> - 5.2-1\n\
             - Update to 5.2\n\
             \n\
             * Mon Jan 15 2024 Alice <alice@example.com> - 5.2-0\n\
             - Rebuilt\n\
             \n"
        );
    }

    #[test]
    fn test_count_and_since() {
        let pool = pool();
        let newest = render(&pool, ChangelogFilter::Count(1));
        assert!(newest.contains("Bob"));
        assert!(!newest.contains("Alice"));

        let since = render(&pool, ChangelogFilter::Since(1709294400));
        assert!(since.contains("Bob"));
        assert!(!since.contains("Alice"));

        let none = render(&pool, ChangelogFilter::Count(0));
        assert_eq!(none, "Changelogs for bash-0:5.2-1.x86_64\n");
    }
}
