// src/sack/spec.rs

//! Resolving user package specs against a query

use super::{PackageQuery, QueryCmp};
use crate::rpm::{Nevra, NevraForm};
use tracing::debug;

/// How a package spec may be interpreted
#[derive(Debug, Clone)]
pub struct ResolveSpecSettings {
    pub ignore_case: bool,
    pub with_nevra: bool,
    pub with_provides: bool,
    pub with_filenames: bool,
    /// Treat a bare word as `/usr/bin/<word>` or `/usr/sbin/<word>`
    pub with_binaries: bool,
    pub nevra_forms: Vec<NevraForm>,
}

impl Default for ResolveSpecSettings {
    fn default() -> Self {
        Self {
            ignore_case: false,
            with_nevra: true,
            with_provides: true,
            with_filenames: true,
            with_binaries: true,
            nevra_forms: NevraForm::DEFAULT_ORDER.to_vec(),
        }
    }
}

impl PackageQuery<'_> {
    /// Narrow the query to the packages matched by `spec`.
    ///
    /// NEVRA forms are tried in order and the first non-empty match wins;
    /// then provides, then file paths. Returns the matching NEVRA form when
    /// the spec matched that way, and leaves the query empty when nothing
    /// matched.
    pub fn resolve_pkg_spec(
        &mut self,
        spec: &str,
        settings: &ResolveSpecSettings,
    ) -> (bool, Option<Nevra>) {
        if settings.with_nevra {
            for nevra in Nevra::parse(spec, &settings.nevra_forms) {
                let mut query = self.clone();
                query.filter_nevra(&nevra, settings.ignore_case);
                if !query.is_empty() {
                    debug!("Spec \"{}\" matched as NEVRA {}", spec, nevra);
                    *self = query;
                    return (true, Some(nevra));
                }
            }
        }

        if settings.with_provides {
            let mut query = self.clone();
            query.filter_provides(&[spec], QueryCmp::glob(settings.ignore_case));
            if !query.is_empty() {
                debug!("Spec \"{}\" matched as provide", spec);
                *self = query;
                return (true, None);
            }
        }

        if settings.with_filenames && spec.starts_with('/') {
            let mut query = self.clone();
            query.filter_file(&[spec], QueryCmp::Glob);
            if !query.is_empty() {
                debug!("Spec \"{}\" matched as file", spec);
                *self = query;
                return (true, None);
            }
        }

        if settings.with_binaries && !spec.contains('/') {
            let paths = [format!("/usr/bin/{}", spec), format!("/usr/sbin/{}", spec)];
            let mut query = self.clone();
            query.filter_file(&paths, QueryCmp::Glob);
            if !query.is_empty() {
                debug!("Spec \"{}\" matched as binary", spec);
                *self = query;
                return (true, None);
            }
        }

        self.clear();
        (false, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpm::Reldep;
    use crate::sack::query::tests::data;
    use crate::sack::{ExcludeFlags, Pool, PoolRepo, RepoKind};

    fn pool() -> Pool {
        let mut pool = Pool::new("x86_64");
        let repo = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));

        let mut python = data("python3 3.12.1-1", "x86_64");
        python.provides.push(Reldep::parse("python(abi) = 3.12").unwrap());
        python.files.push("/usr/bin/python3".to_string());
        pool.add_package(repo, python);

        pool.add_package(repo, data("python3-libs 3.12.1-1", "x86_64"));
        pool.add_package(repo, data("foo-1.0 2.0-1", "noarch"));
        pool
    }

    fn resolve(pool: &Pool, spec: &str, settings: &ResolveSpecSettings) -> Vec<String> {
        let mut q = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        q.resolve_pkg_spec(spec, settings);
        q.sorted().iter().map(|p| p.nevra()).collect()
    }

    #[test]
    fn test_resolve_by_name_and_glob() {
        let pool = pool();
        let settings = ResolveSpecSettings::default();
        assert_eq!(resolve(&pool, "python3", &settings), vec!["python3-3.12.1-1.x86_64"]);
        assert_eq!(resolve(&pool, "python3*", &settings).len(), 2);
        assert_eq!(
            resolve(&pool, "python3-3.12.1-1.x86_64", &settings),
            vec!["python3-3.12.1-1.x86_64"]
        );
    }

    #[test]
    fn test_resolve_name_with_dash_before_nev() {
        let pool = pool();
        // "foo-1.0" is the name, not foo at version 1.0
        assert_eq!(
            resolve(&pool, "foo-1.0", &ResolveSpecSettings::default()),
            vec!["foo-1.0-2.0-1.noarch"]
        );
    }

    #[test]
    fn test_resolve_by_provide_and_file() {
        let pool = pool();
        let settings = ResolveSpecSettings::default();
        assert_eq!(
            resolve(&pool, "python(abi) = 3.12", &settings),
            vec!["python3-3.12.1-1.x86_64"]
        );
        assert_eq!(resolve(&pool, "/usr/bin/python3", &settings), vec!["python3-3.12.1-1.x86_64"]);
    }

    #[test]
    fn test_resolve_respects_settings() {
        let pool = pool();
        let settings = ResolveSpecSettings {
            with_provides: false,
            with_filenames: false,
            with_binaries: false,
            ..Default::default()
        };
        assert!(resolve(&pool, "/usr/bin/python3", &settings).is_empty());
        assert!(resolve(&pool, "PYTHON3", &settings).is_empty());

        let icase = ResolveSpecSettings {
            ignore_case: true,
            ..settings
        };
        assert_eq!(resolve(&pool, "PYTHON3", &icase), vec!["python3-3.12.1-1.x86_64"]);
    }

    #[test]
    fn test_unmatched_spec_empties_query() {
        let pool = pool();
        let mut q = PackageQuery::new(&pool, ExcludeFlags::ApplyExcludes);
        let (found, nevra) = q.resolve_pkg_spec("nothing-here", &ResolveSpecSettings::default());
        assert!(!found);
        assert!(nevra.is_none());
        assert!(q.is_empty());
    }
}
