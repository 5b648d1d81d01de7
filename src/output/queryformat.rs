// src/output/queryformat.rs

//! `--queryformat` rendering and package attribute lookup
//!
//! A query format is text with `%{tag}` placeholders, optionally padded as
//! `%20{tag}` (right aligned) or `%-20{tag}` (left aligned). The escapes
//! `\n` and `\t` are honored. Unknown tags are left in the output verbatim.

use crate::rpm::{DepKind, Package};
use crate::sack::PackageQuery;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::sync::LazyLock;

/// Format used when none is given
pub const DEFAULT_QUERY_FORMAT: &str = "%{full_nevra}\\n";

static TAG_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"%(-?\d*?)\{([:\w]+?)\}"));

/// Tags accepted in query formats, with their descriptions
pub const PACKAGE_ATTRS: &[(&str, &str)] = &[
    ("name", "name of the package"),
    ("epoch", "epoch of the package"),
    ("version", "version of the package"),
    ("release", "release of the package"),
    ("arch", "architecture of the package"),
    ("evr", "epoch:version-release of the package, epoch 0 omitted"),
    ("nevra", "name-epoch:version-release.architecture, epoch 0 omitted"),
    ("full_nevra", "name-epoch:version-release.architecture of the package"),
    ("repoid", "id of the repository the package is in"),
    ("from_repo", "id of the repository the package was installed from"),
    ("reason", "reason the package was installed"),
    ("summary", "summary of the package"),
    ("description", "description of the package"),
    ("url", "upstream URL of the package"),
    ("license", "license of the package"),
    ("vendor", "vendor of the package"),
    ("packager", "packager of the package"),
    ("buildtime", "build time of the package as a unix timestamp"),
    ("downloadsize", "size of the package file in bytes"),
    ("installsize", "installed size of the package in bytes"),
    ("sourcerpm", "source RPM the package was built from"),
    ("source_name", "name of the source package"),
    ("debug_name", "name of the matching debuginfo package"),
    ("location", "location of the package file"),
    ("provides", "capabilities the package provides"),
    ("requires", "capabilities the package requires"),
    ("requires_pre", "capabilities required before installing the package"),
    ("conflicts", "capabilities the package conflicts with"),
    ("obsoletes", "capabilities the package obsoletes"),
    ("recommends", "capabilities the package recommends"),
    ("suggests", "capabilities the package suggests"),
    ("enhances", "capabilities the package enhances"),
    ("supplements", "capabilities the package supplements"),
    (
        "depends",
        "capabilities the package requires, recommends, suggests, supplements or enhances",
    ),
    ("files", "files owned by the package"),
];

fn join_deps<'a>(pkg: &Package<'a>, kinds: &[DepKind]) -> String {
    kinds
        .iter()
        .flat_map(|kind| pkg.deps(*kind))
        .map(|dep| dep.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Value of attribute `tag` for `pkg`; multi-valued attributes are joined
/// with newlines. `None` for an unknown tag.
pub fn package_attr(pkg: &Package<'_>, tag: &str) -> Option<String> {
    let data = pkg.data();
    let value = match tag {
        "name" => data.name.clone(),
        "epoch" => data.evr.epoch.to_string(),
        "version" => data.evr.version.clone(),
        "release" => data.evr.release.clone(),
        "arch" => data.arch.clone(),
        "evr" => data.evr.to_string(),
        "nevra" => data.nevra(),
        "full_nevra" => data.full_nevra(),
        "repoid" => pkg.repo_id().to_string(),
        "from_repo" => {
            if pkg.is_installed() {
                pkg.from_repo().to_string()
            } else {
                String::new()
            }
        }
        "reason" => pkg.reason().to_string(),
        "summary" => data.summary.clone(),
        "description" => data.description.clone(),
        "url" => data.url.clone().unwrap_or_default(),
        "license" => data.license.clone().unwrap_or_default(),
        "vendor" => data.vendor.clone().unwrap_or_default(),
        "packager" => data.packager.clone().unwrap_or_default(),
        "buildtime" => data.build_time.to_string(),
        "downloadsize" => data.download_size.to_string(),
        "installsize" => data.install_size.to_string(),
        "sourcerpm" => data.sourcerpm.clone().unwrap_or_default(),
        "source_name" => data.source_name().unwrap_or_default(),
        "debug_name" => debug_name(&data.name),
        "location" => data.location.clone().unwrap_or_default(),
        "provides" => join_deps(pkg, &[DepKind::Provides]),
        "requires" => join_deps(pkg, &[DepKind::Requires]),
        "requires_pre" => join_deps(pkg, &[DepKind::RequiresPre]),
        "conflicts" => join_deps(pkg, &[DepKind::Conflicts]),
        "obsoletes" => join_deps(pkg, &[DepKind::Obsoletes]),
        "recommends" => join_deps(pkg, &[DepKind::Recommends]),
        "suggests" => join_deps(pkg, &[DepKind::Suggests]),
        "enhances" => join_deps(pkg, &[DepKind::Enhances]),
        "supplements" => join_deps(pkg, &[DepKind::Supplements]),
        "depends" => join_deps(
            pkg,
            &[
                DepKind::Requires,
                DepKind::Recommends,
                DepKind::Suggests,
                DepKind::Supplements,
                DepKind::Enhances,
            ],
        ),
        "files" => data.files.join("\n"),
        _ => return None,
    };
    Some(value)
}

fn debug_name(name: &str) -> String {
    if name.ends_with("-debuginfo") {
        name.to_string()
    } else {
        format!("{}-debuginfo", name)
    }
}

fn unescape(format: &str) -> String {
    format.replace("\\n", "\n").replace("\\t", "\t")
}

fn pad(value: String, width: &str) -> String {
    let (left, digits) = match width.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, width),
    };
    let Ok(width) = digits.parse::<usize>() else {
        return value;
    };
    if left {
        format!("{:<width$}", value, width = width)
    } else {
        format!("{:>width$}", value, width = width)
    }
}

/// Render `format` for one package
pub fn format_package(pkg: &Package<'_>, format: &str) -> String {
    let format = unescape(format);
    let Ok(re) = TAG_RE.as_ref() else {
        return format;
    };
    re.replace_all(&format, |caps: &Captures<'_>| {
        match package_attr(pkg, &caps[2]) {
            Some(value) => pad(value, &caps[1]),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Whether `format` needs file lists loaded
pub fn requires_filelists(format: &str) -> bool {
    TAG_RE
        .as_ref()
        .map(|re| re.captures_iter(format).any(|caps| &caps[2] == "files"))
        .unwrap_or(false)
}

/// Print every package of `query` with `format`. Identical lines are
/// printed once and output is sorted.
pub fn print_pkg_set_with_format(
    out: &mut impl Write,
    query: &PackageQuery<'_>,
    format: &str,
) -> io::Result<()> {
    let rendered: BTreeSet<String> = query.iter().map(|pkg| format_package(&pkg, format)).collect();
    for item in rendered {
        write!(out, "{}", item)?;
    }
    Ok(())
}

/// Print the values of `attr` over all packages, deduplicated and sorted,
/// one per line
pub fn print_pkg_attr_uniq_sorted(
    out: &mut impl Write,
    query: &PackageQuery<'_>,
    attr: &str,
) -> io::Result<()> {
    let mut values = BTreeSet::new();
    for pkg in query.iter() {
        if let Some(value) = package_attr(&pkg, attr) {
            values.extend(
                value
                    .lines()
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            );
        }
    }
    for value in values {
        writeln!(out, "{}", value)?;
    }
    Ok(())
}

/// Print the table of query format tags
pub fn print_available_pkg_attrs(out: &mut impl Write) -> io::Result<()> {
    let width = PACKAGE_ATTRS.iter().map(|(tag, _)| tag.len()).max().unwrap_or(0);
    for (tag, description) in PACKAGE_ATTRS {
        writeln!(out, "{:<width$}  {}", tag, description, width = width)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::{PackageData, Reldep};
    use crate::sack::{ExcludeFlags, Pool, PoolRepo, RepoKind};
    use crate::version::Evr;

    fn pool() -> Pool {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        for (name, ver) in [("bash", "5.2"), ("bash", "5.1"), ("zsh", "5.9")] {
            let mut data = PackageData::new(name, Evr::new(0, ver, "1"), "x86_64");
            data.requires.push(Reldep::new("glibc"));
            data.requires.push(Reldep::parse("libc.so.6 >= 2.34").unwrap());
            data.files.push(format!("/usr/bin/{}", name));
            data.sourcerpm = Some(format!("{}-{}-1.src.rpm", name, ver));
            pool.add_package(repo, data);
        }
        pool
    }

    fn render(f: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_default_format_sorted() {
        let pool = pool();
        let query = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        let out = render(|buf| print_pkg_set_with_format(buf, &query, DEFAULT_QUERY_FORMAT));
        assert_eq!(
            out,
            "bash-0:5.1-1.x86_64\nbash-0:5.2-1.x86_64\nzsh-0:5.9-1.x86_64\n"
        );
    }

    #[test]
    fn test_format_dedups_and_pads() {
        let pool = pool();
        let query = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        let out = render(|buf| print_pkg_set_with_format(buf, &query, "%-6{name}|%4{arch}\\n"));
        assert_eq!(out, "bash  |x86_64\nzsh   |x86_64\n");
    }

    #[test]
    fn test_unknown_tag_kept_verbatim() {
        let pool = pool();
        let pkg = pool.package(pool.ids().next().unwrap());
        assert_eq!(format_package(&pkg, "%{name} %{bogus}\\t!"), "bash %{bogus}\t!");
        assert_eq!(format_package(&pkg, "%{evr} %{repoid}"), "5.2-1 fedora");
    }

    #[test]
    fn test_attr_mode_dedups_multi_values() {
        let pool = pool();
        let query = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        let out = render(|buf| print_pkg_attr_uniq_sorted(buf, &query, "requires"));
        assert_eq!(out, "glibc\nlibc.so.6 >= 2.34\n");

        let out = render(|buf| print_pkg_attr_uniq_sorted(buf, &query, "sourcerpm"));
        assert_eq!(out, "bash-5.1-1.src.rpm\nbash-5.2-1.src.rpm\nzsh-5.9-1.src.rpm\n");
    }

    #[test]
    fn test_requires_filelists() {
        assert!(requires_filelists("%{name} %{files}"));
        assert!(!requires_filelists(DEFAULT_QUERY_FORMAT));
    }

    #[test]
    fn test_querytags_lists_every_tag() {
        let out = render(|buf| print_available_pkg_attrs(buf));
        assert_eq!(out.lines().count(), PACKAGE_ATTRS.len());
        assert!(out.lines().any(|l| l.starts_with("full_nevra ")));
    }
}
