// src/repoquery.rs

//! The `repoquery` command: option validation, metadata planning and the
//! filter pipeline producing the printed result.
//!
//! Filters are applied in a fixed order. Package specs narrow the query
//! first, then the filters meaningful only for installed packages, then the
//! ones comparing installed with available packages, then the plain
//! filters. Transforms such as `--srpm` come last because they replace the
//! result with a different set of packages.
//!
//! Advisory options load `updateinfo` and keep packages at or above a
//! version a selected advisory lists.

use crate::advisory::AdvisoryFilter;
use crate::config::Priority;
use crate::error::{Error, Result};
use crate::output::{
    self, ChangelogFilter, PackageInfoSections, print_available_pkg_attrs, print_changelogs,
    print_pkg_attr_uniq_sorted, print_pkg_set_with_format, requires_filelists,
};
use crate::packages::is_package_file;
use crate::repository::RepoSack;
use crate::rpm::DepKind;
use crate::sack::{ExcludeFlags, PackageId, PackageQuery, Pool, QueryCmp, ResolveSpecSettings};
use std::io::Write;
use tracing::debug;

/// Attributes printable with a single switch (`--provides`, `--files`, ...)
pub const PKG_ATTR_SWITCHES: &[&str] = &[
    "conflicts",
    "depends",
    "enhances",
    "obsoletes",
    "provides",
    "recommends",
    "requires",
    "requires_pre",
    "suggests",
    "supplements",
    "files",
    "sourcerpm",
    "location",
];

#[derive(Debug, Clone, Default)]
pub struct RepoqueryOptions {
    pub specs: Vec<String>,

    /// `--available` given explicitly
    pub available: bool,
    pub installed: bool,

    pub leaves: bool,
    pub userinstalled: bool,
    pub duplicates: bool,
    pub unneeded: bool,
    pub installonly: bool,

    pub extras: bool,
    pub upgrades: bool,

    pub advisories: AdvisoryFilter,

    pub latest_limit: i32,
    pub whatdepends: Vec<String>,
    pub whatconflicts: Vec<String>,
    pub whatenhances: Vec<String>,
    pub whatobsoletes: Vec<String>,
    pub whatprovides: Vec<String>,
    pub whatrecommends: Vec<String>,
    pub whatrequires: Vec<String>,
    pub whatsupplements: Vec<String>,
    pub whatsuggests: Vec<String>,
    pub arch: Vec<String>,
    pub file: Vec<String>,
    pub exactdeps: bool,
    pub recent: bool,

    pub srpm: bool,

    pub info: bool,
    pub querytags: bool,
    pub changelogs: bool,
    pub queryformat: Option<String>,
    /// One of `PKG_ATTR_SWITCHES`
    pub pkg_attr: Option<String>,
}

/// Which repositories a repoquery run needs loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadPlan {
    pub system: bool,
    pub available: bool,
}

impl RepoqueryOptions {
    fn installed_only(&self) -> bool {
        self.leaves || self.userinstalled || self.duplicates || self.unneeded || self.installonly
    }

    fn capabilities(&self) -> impl Iterator<Item = &String> {
        [
            &self.whatrequires,
            &self.whatdepends,
            &self.whatconflicts,
            &self.whatprovides,
            &self.whatobsoletes,
            &self.whatrecommends,
            &self.whatenhances,
            &self.whatsupplements,
            &self.whatsuggests,
        ]
        .into_iter()
        .flatten()
    }

    /// Reject option combinations that make no sense together
    pub fn validate(&self) -> Result<()> {
        let formats = [
            ("--info", self.info),
            ("--querytags", self.querytags),
            ("--changelogs", self.changelogs),
            ("--queryformat", self.queryformat.is_some()),
            ("--<attribute>", self.pkg_attr.is_some()),
        ];
        let used: Vec<&str> = formats.iter().filter(|(_, on)| *on).map(|(n, _)| *n).collect();
        if used.len() > 1 {
            return Err(Error::ArgumentParser(format!(
                "\"{}\" not allowed together with \"{}\"",
                used[1], used[0]
            )));
        }
        if let Some(attr) = &self.pkg_attr
            && !PKG_ATTR_SWITCHES.contains(&attr.as_str())
        {
            return Err(Error::ArgumentParser(format!("Unknown package attribute \"{}\"", attr)));
        }

        let conflict = |a: &str, b: &str| {
            Err(Error::ArgumentParser(format!(
                "\"{}\" not allowed together with \"{}\"",
                b, a
            )))
        };
        if self.leaves && self.available {
            return conflict("--available", "--leaves");
        }
        if self.userinstalled && self.installed {
            return conflict("--installed", "--userinstalled");
        }
        for (name, set) in [("--available", self.available), ("--installed", self.installed)] {
            if set && self.installed_only() {
                return conflict(name, "an installed-only filter");
            }
            if set && self.upgrades {
                return conflict(name, "--upgrades");
            }
        }
        if self.upgrades && self.installed_only() {
            return conflict("--upgrades", "an installed-only filter");
        }

        if self.exactdeps && self.whatrequires.is_empty() && self.whatdepends.is_empty() {
            return Err(Error::ArgumentParser(
                "Option \"--exactdeps\" has to be used either with \"--whatrequires\" or \
                 \"--whatdepends\": missing dependent argument"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Decide which repositories to load and request the optional metadata
    /// the output needs
    pub fn configure(&self, sack: &mut RepoSack) -> Result<LoadPlan> {
        if self.querytags {
            return Ok(LoadPlan::default());
        }

        let system = self.installed
            || self.userinstalled
            || self.duplicates
            || self.leaves
            || self.unneeded
            || self.extras
            || self.upgrades
            || self.installonly;
        let available = self.available || !system || self.extras || self.upgrades;

        if self.srpm {
            sack.enable_source_repos();
        }

        let mut wanted = Vec::new();
        if self.changelogs {
            wanted.push("other");
        }
        if !self.advisories.is_empty() {
            wanted.push("updateinfo");
        }
        let files_attr = self.pkg_attr.as_deref() == Some("files");
        let files_format = self.queryformat.as_deref().is_some_and(requires_filelists);
        if files_attr
            || files_format
            || self.capabilities().any(|c| c.starts_with('/'))
            || !self.file.is_empty()
        {
            wanted.push("filelists");
        }
        if !wanted.is_empty() {
            let option = &mut sack.config_mut().optional_metadata_types;
            let mut types = option.get().clone();
            for kind in wanted {
                if !types.iter().any(|t| t == kind) {
                    types.push(kind.to_string());
                }
            }
            option.set(Priority::Runtime, types)?;
        }

        debug!("repoquery loads system: {}, available: {}", system, available);
        Ok(LoadPlan { system, available })
    }
}

/// Load what `plan` asks for and return the command-line packages added
/// from `.rpm` specs. Those only take part when available repositories are
/// loaded.
pub fn load(sack: &mut RepoSack, options: &RepoqueryOptions, plan: LoadPlan) -> Result<Vec<PackageId>> {
    if options.querytags {
        return Ok(Vec::new());
    }
    let mut cmdline = Vec::new();
    if plan.available {
        cmdline = sack
            .add_cmdline_packages(&options.specs)?
            .into_iter()
            .map(|(_, id)| id)
            .collect();
    }
    if plan.system {
        sack.load_system_repo()?;
    }
    if plan.available {
        sack.update_and_load_enabled_repos(false)?;
    }
    Ok(cmdline)
}

/// Packages matched by any of `specs` as a NEVRA, used to expand
/// `--what*` arguments naming packages rather than capabilities
fn resolve_nevras<'a>(specs: &[String], base: &PackageQuery<'a>) -> PackageQuery<'a> {
    let settings = ResolveSpecSettings {
        with_provides: false,
        with_filenames: false,
        with_binaries: false,
        ..Default::default()
    };
    let mut resolved = PackageQuery::empty(base.pool());
    for spec in specs {
        let mut query = base.clone();
        query.resolve_pkg_spec(spec, &settings);
        resolved |= &query;
    }
    resolved
}

fn installonly_query<'a>(pool: &'a Pool) -> PackageQuery<'a> {
    let mut query = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
    query.filter_installonly();
    query
}

/// Keep packages whose `kind` dependencies match one of `patterns`, or
/// are provided by a package one of `patterns` names
fn filter_dep_or_resolved(result: &mut PackageQuery<'_>, kind: DepKind, patterns: &[String]) {
    let mut resolved = result.clone();
    resolved.filter_dep_by_query(kind, &resolve_nevras(patterns, result));
    result.filter_dep(kind, patterns, QueryCmp::Glob);
    *result |= &resolved;
}

/// Run the filter pipeline over `pool` and return the resulting packages.
///
/// `plan` restricts the starting set to the loaded sources and
/// `cmdline_packages` are the packages added from `.rpm` specs.
pub fn query<'a>(
    pool: &'a Pool,
    options: &RepoqueryOptions,
    plan: LoadPlan,
    cmdline_packages: &[PackageId],
    now: i64,
    recent_days: u32,
) -> PackageQuery<'a> {
    let mut base = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
    if !plan.system {
        base.filter_available();
    }
    if !plan.available {
        base.filter_installed();
    }

    let specs: Vec<&String> = options.specs.iter().filter(|s| !is_package_file(s)).collect();
    let mut result = if options.specs.is_empty() {
        base.clone()
    } else {
        let mut result = PackageQuery::empty(pool);
        for id in cmdline_packages {
            if base.contains(*id) {
                result.add(*id);
            }
        }
        let settings = ResolveSpecSettings {
            ignore_case: true,
            with_provides: false,
            with_binaries: false,
            ..Default::default()
        };
        for spec in specs {
            let mut matched = base.clone();
            matched.resolve_pkg_spec(spec, &settings);
            result |= &matched;
        }
        result
    };

    // installed packages only
    if options.leaves {
        result.filter_leaves();
    }
    if options.userinstalled {
        result.filter_userinstalled();
    }
    if options.duplicates {
        result -= &installonly_query(pool);
        result.filter_duplicates();
    }
    if options.unneeded {
        result.filter_unneeded();
    }
    if options.installonly {
        result &= &installonly_query(pool);
    }

    // installed and available packages
    if options.extras {
        result.filter_extras(false);
    }
    if options.upgrades {
        result.filter_upgrades();
    }

    if !options.advisories.is_empty() {
        result.filter_advisories(&options.advisories.select(pool));
    }

    if options.latest_limit != 0 {
        result.filter_latest_evr(options.latest_limit);
    }

    if !options.whatdepends.is_empty() {
        let mut depends = PackageQuery::empty(pool);
        let resolved = (!options.exactdeps).then(|| resolve_nevras(&options.whatdepends, &result));
        for kind in DepKind::DEPENDS {
            let mut by_dep = result.clone();
            by_dep.filter_dep(kind, &options.whatdepends, QueryCmp::Glob);
            depends |= &by_dep;
            if let Some(resolved) = &resolved {
                let mut by_pkg = result.clone();
                by_pkg.filter_dep_by_query(kind, resolved);
                depends |= &by_pkg;
            }
        }
        result = depends;
    }

    if !options.whatprovides.is_empty() {
        let mut provides = result.clone();
        provides.filter_provides(&options.whatprovides, QueryCmp::Glob);
        if provides.is_empty() {
            result.filter_file(&options.whatprovides, QueryCmp::Glob);
        } else {
            result = provides;
        }
    }

    if !options.whatrequires.is_empty() {
        if options.exactdeps {
            result.filter_requires(&options.whatrequires, QueryCmp::Glob);
        } else {
            filter_dep_or_resolved(&mut result, DepKind::Requires, &options.whatrequires);
        }
    }
    if !options.whatobsoletes.is_empty() {
        result.filter_obsoletes(&options.whatobsoletes, QueryCmp::Glob);
    }
    for (kind, patterns) in [
        (DepKind::Conflicts, &options.whatconflicts),
        (DepKind::Recommends, &options.whatrecommends),
        (DepKind::Enhances, &options.whatenhances),
        (DepKind::Supplements, &options.whatsupplements),
        (DepKind::Suggests, &options.whatsuggests),
    ] {
        if !patterns.is_empty() {
            filter_dep_or_resolved(&mut result, kind, patterns);
        }
    }

    if !options.arch.is_empty() {
        result.filter_arch(&options.arch, QueryCmp::Glob);
    }
    if !options.file.is_empty() {
        result.filter_file(&options.file, QueryCmp::Glob);
    }
    if options.recent {
        result.filter_recent(now - i64::from(recent_days) * 86400);
    }

    if options.srpm {
        let mut sources = result.clone();
        sources.filter_arch(&["src"], QueryCmp::Eq);
        let mut srpms = PackageQuery::empty(pool);
        for pkg in result.iter() {
            let Some(source_name) = pkg.data().source_name() else {
                continue;
            };
            let evr = pkg.evr().to_string();
            let mut matched = sources.clone();
            matched.filter_name(&[source_name], QueryCmp::Eq);
            matched.filter_evr(&[evr], QueryCmp::Eq);
            srpms |= &matched;
        }
        result = srpms;
    }

    result
}

/// Print `result` in the format `options` ask for
pub fn print(
    out: &mut impl Write,
    result: &PackageQuery<'_>,
    options: &RepoqueryOptions,
) -> std::io::Result<()> {
    if options.querytags {
        print_available_pkg_attrs(out)
    } else if options.changelogs {
        print_changelogs(out, result, ChangelogFilter::All)
    } else if options.info {
        let mut sections = PackageInfoSections::new();
        sections.add_section("", result);
        sections.print_info(out, output::term_width())
    } else if let Some(attr) = &options.pkg_attr {
        print_pkg_attr_uniq_sorted(out, result, attr)
    } else {
        let format = options
            .queryformat
            .as_deref()
            .unwrap_or(output::DEFAULT_QUERY_FORMAT);
        print_pkg_set_with_format(out, result, format)
    }
}
