// src/output/info.rs

//! `info` and `list` style package listings grouped under headings

use crate::output::{format_size, wrap_text};
use crate::rpm::Package;
use crate::sack::PackageQuery;
use std::io::{self, Write};

/// Headed groups of packages, e.g. "Installed packages" and
/// "Available packages"
#[derive(Debug, Default)]
pub struct PackageInfoSections<'a> {
    sections: Vec<(String, Vec<Package<'a>>)>,
}

fn info_lines(pkg: &Package<'_>) -> Vec<(&'static str, String)> {
    let data = pkg.data();
    let mut lines = vec![
        ("Name", data.name.clone()),
        ("Epoch", data.evr.epoch.to_string()),
        ("Version", data.evr.version.clone()),
        ("Release", data.evr.release.clone()),
        ("Architecture", data.arch.clone()),
    ];
    if pkg.is_installed() {
        lines.push(("Installed size", format_size(data.install_size)));
    } else {
        lines.push(("Download size", format_size(data.download_size)));
        lines.push(("Installed size", format_size(data.install_size)));
    }
    if let Some(srpm) = &data.sourcerpm {
        lines.push(("Source", srpm.clone()));
    }
    lines.push(("Repository", pkg.repo_id().to_string()));
    if pkg.is_installed() && !pkg.from_repo().is_empty() {
        lines.push(("From repository", pkg.from_repo().to_string()));
    }
    lines.push(("Summary", data.summary.clone()));
    if let Some(url) = &data.url {
        lines.push(("URL", url.clone()));
    }
    if let Some(license) = &data.license {
        lines.push(("License", license.clone()));
    }
    lines.push(("Description", data.description.clone()));
    if let Some(vendor) = &data.vendor {
        lines.push(("Vendor", vendor.clone()));
    }
    lines
}

impl<'a> PackageInfoSections<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a section with the packages of `query` sorted by NEVRA.
    /// Returns false, adding nothing, when the query is empty.
    pub fn add_section(&mut self, heading: impl Into<String>, query: &PackageQuery<'a>) -> bool {
        if query.is_empty() {
            return false;
        }
        self.sections.push((heading.into(), query.sorted()));
        true
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Print every package as a block of `key : value` lines, keys aligned
    /// across all sections. Long values are wrapped to fit `width`.
    pub fn print_info(&self, out: &mut impl Write, width: usize) -> io::Result<()> {
        let blocks: Vec<Vec<_>> = self
            .sections
            .iter()
            .map(|(_, pkgs)| pkgs.iter().map(info_lines).collect())
            .collect();
        let key_width = blocks
            .iter()
            .flatten()
            .flatten()
            .map(|(k, _)| k.len())
            .max()
            .unwrap_or(0);
        let value_width = width.saturating_sub(key_width + 3).max(20);

        for (index, ((heading, _), section)) in self.sections.iter().zip(blocks).enumerate() {
            if index > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", heading)?;
            for (pkg_index, lines) in section.into_iter().enumerate() {
                if pkg_index > 0 {
                    writeln!(out)?;
                }
                for (key, value) in lines {
                    for (i, part) in wrap_text(&value, value_width).into_iter().enumerate() {
                        let key = if i == 0 { key } else { "" };
                        let line = format!("{:<kw$} : {}", key, part, kw = key_width);
                        writeln!(out, "{}", line.trim_end())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Print one line per package: `name.arch  evr  repository`, with
    /// columns aligned across all sections
    pub fn print_list(&self, out: &mut impl Write) -> io::Result<()> {
        let rows: Vec<(String, String, &str)> = self
            .sections
            .iter()
            .flat_map(|(_, pkgs)| pkgs.iter())
            .map(|pkg| (pkg.na(), pkg.evr().to_string(), pkg.repo_id()))
            .collect();
        let na_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0);
        let evr_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0);

        let mut rows = rows.into_iter();
        for (index, (heading, pkgs)) in self.sections.iter().enumerate() {
            if index > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", heading)?;
            for (na, evr, repo) in rows.by_ref().take(pkgs.len()) {
                writeln!(
                    out,
                    "{:<naw$} {:<evw$} {}",
                    na,
                    evr,
                    repo,
                    naw = na_width,
                    evw = evr_width
                )?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Reason;
    use crate::rpm::PackageData;
    use crate::sack::{ExcludeFlags, Pool, PoolRepo, RepoKind, SYSTEM_REPO_ID};
    use crate::version::Evr;

    fn pool() -> Pool {
        let mut pool = Pool::new("x86_64");
        let system = pool.add_repo(PoolRepo::new(SYSTEM_REPO_ID, RepoKind::System));
        let fedora = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));

        let mut bash = PackageData::new("bash", Evr::new(0, "5.2.26", "1.fc40"), "x86_64");
        bash.summary = "The GNU Bourne Again shell".to_string();
        bash.description = "The GNU Bourne Again shell (Bash) is a shell or command \
                            language interpreter that is compatible with the Bourne shell."
            .to_string();
        bash.install_size = 8 * 1024 * 1024;
        bash.download_size = 1536;
        bash.license = Some("GPL-3.0-or-later".to_string());
        pool.add_installed(system, bash.clone(), Reason::User, Some("fedora".to_string()));

        let mut newer = bash;
        newer.evr = Evr::new(0, "5.2.37", "1.fc40");
        pool.add_package(fedora, newer);
        pool
    }

    #[test]
    fn test_info_blocks() {
        let pool = pool();
        let mut installed = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        installed.filter_installed();
        let mut available = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        available.filter_available();

        let mut sections = PackageInfoSections::new();
        assert!(sections.add_section("Installed packages", &installed));
        assert!(sections.add_section("Available packages", &available));
        assert!(!sections.add_section("Empty", &PackageQuery::empty(&pool)));

        let mut buf = Vec::new();
        sections.print_info(&mut buf, 60).unwrap();
        let out = String::from_utf8(buf).unwrap();

        let line = |key: &str, value: &str| format!("{:<15} : {}\n", key, value);
        assert!(out.starts_with(&format!("Installed packages\n{}", line("Name", "bash"))));
        assert!(out.contains(&line("Installed size", "8.0 MiB")));
        assert!(out.contains(&line("From repository", "fedora")));
        assert!(out.contains("\n\nAvailable packages\n"));
        assert!(out.contains(&line("Download size", "1.5 KiB")));
        assert!(out.contains(&line("Repository", "fedora")));
        // wrapped description continues under the value column
        assert!(out.contains(&format!("\n{:<15} : ", "")));
    }

    #[test]
    fn test_list_columns_aligned() {
        let pool = pool();
        let mut installed = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        installed.filter_installed();
        let mut available = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        available.filter_available();

        let mut sections = PackageInfoSections::new();
        sections.add_section("Installed packages", &installed);
        sections.add_section("Available packages", &available);
        let mut buf = Vec::new();
        sections.print_list(&mut buf).unwrap();

        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Installed packages\n\
             bash.x86_64 5.2.26-1.fc40 @System\n\
             \n\
             Available packages\n\
             bash.x86_64 5.2.37-1.fc40 fedora\n"
        );
    }
}
