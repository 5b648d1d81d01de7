// src/sack/query.rs

//! Package queries
//!
//! A `PackageQuery` is a set of packages borrowed from a `Pool`. Queries are
//! combined with `|=`, `&=` and `-=` and narrowed in place by the `filter_*`
//! methods, each of which keeps only the packages matching its predicate.

use super::{PackageId, PackageSet, Pool, QueryCmp, RepoKind, match_string};
use crate::advisory::Advisory;
use crate::db::models::Reason;
use crate::rpm::{DepKind, Nevra, Package, Reldep};
use crate::version::Evr;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};
use std::ops::{BitAndAssign, BitOrAssign, SubAssign};

/// Whether a new query honors the pool's excludes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcludeFlags {
    ApplyExcludes,
    IgnoreExcludes,
}

/// A set-like view over packages in a pool
#[derive(Debug, Clone)]
pub struct PackageQuery<'a> {
    pool: &'a Pool,
    set: PackageSet,
}

impl<'a> PackageQuery<'a> {
    /// Query over every considered package in the pool
    pub fn new(pool: &'a Pool, flags: ExcludeFlags) -> Self {
        let mut set = PackageSet::full(pool.len());
        if flags == ExcludeFlags::ApplyExcludes {
            set -= pool.excluded();
        }
        Self { pool, set }
    }

    pub fn empty(pool: &'a Pool) -> Self {
        Self {
            pool,
            set: PackageSet::new(),
        }
    }

    pub fn from_set(pool: &'a Pool, set: PackageSet) -> Self {
        Self { pool, set }
    }

    pub fn pool(&self) -> &'a Pool {
        self.pool
    }

    pub fn set(&self) -> &PackageSet {
        &self.set
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn contains(&self, id: PackageId) -> bool {
        self.set.contains(id)
    }

    pub fn add(&mut self, id: PackageId) {
        self.set.add(id);
    }

    pub fn remove(&mut self, id: PackageId) {
        self.set.remove(id);
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn ids(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.set.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = Package<'a>> + '_ {
        let pool = self.pool;
        self.set.iter().map(move |id| pool.package(id))
    }

    /// Packages sorted by NEVRA
    pub fn sorted(&self) -> Vec<Package<'a>> {
        let mut pkgs: Vec<Package<'a>> = self.iter().collect();
        pkgs.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.evr().cmp(b.evr()))
                .then_with(|| a.arch().cmp(b.arch()))
                .then_with(|| a.repo_id().cmp(b.repo_id()))
        });
        pkgs
    }

    fn retain(&mut self, mut keep: impl FnMut(PackageId) -> bool) {
        let drop: Vec<PackageId> = self.set.iter().filter(|id| !keep(*id)).collect();
        for id in drop {
            self.set.remove(id);
        }
    }

    pub fn filter_name(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        self.retain(|id| matches_any(&pool.data(id).name, patterns, cmp));
    }

    pub fn filter_arch(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        self.retain(|id| matches_any(&pool.data(id).arch, patterns, cmp));
    }

    /// Filter by `[E:]V-R`. `Eq` and `Neq` compare parsed EVRs, other
    /// comparisons work on the string form.
    pub fn filter_evr(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        let parsed: Vec<Option<Evr>> = patterns.iter().map(|p| Evr::parse(p.as_ref())).collect();
        self.retain(|id| {
            let evr = &pool.data(id).evr;
            match cmp {
                QueryCmp::Eq => parsed.iter().flatten().any(|p| p == evr),
                QueryCmp::Neq => !parsed.iter().flatten().any(|p| p == evr),
                _ => matches_any(&evr.to_string(), patterns, cmp),
            }
        });
    }

    pub fn filter_repo_id(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        self.retain(|id| matches_any(&pool.repo_of(id).id, patterns, cmp));
    }

    pub fn filter_installed(&mut self) {
        let pool = self.pool;
        self.retain(|id| pool.repo_of(id).kind == RepoKind::System);
    }

    /// Everything not installed, command-line packages included
    pub fn filter_available(&mut self) {
        let pool = self.pool;
        self.retain(|id| pool.repo_of(id).kind != RepoKind::System);
    }

    /// Keep packages matching every non-empty field of `nevra`
    pub fn filter_nevra(&mut self, nevra: &Nevra, icase: bool) {
        let pool = self.pool;
        let name_cmp = QueryCmp::glob(icase);
        self.retain(|id| {
            let data = pool.data(id);
            match_string(&data.name, &nevra.name, name_cmp)
                && (nevra.epoch.is_empty()
                    || match_string(&data.evr.epoch.to_string(), &nevra.epoch, QueryCmp::Glob))
                && (nevra.version.is_empty()
                    || match_string(&data.evr.version, &nevra.version, QueryCmp::Glob))
                && (nevra.release.is_empty()
                    || match_string(&data.evr.release, &nevra.release, QueryCmp::Glob))
                && (nevra.arch.is_empty() || match_string(&data.arch, &nevra.arch, QueryCmp::Glob))
        });
    }

    /// Keep packages with a `kind` dependency matching one of `patterns`.
    ///
    /// A pattern carrying a version operator (`foo >= 1.0`) matches by range
    /// overlap; anything else is compared against dependency names with `cmp`.
    pub fn filter_dep(&mut self, kind: DepKind, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        let mut versioned = Vec::new();
        let mut names = Vec::new();
        for pattern in patterns {
            match Reldep::parse(pattern.as_ref()) {
                Ok(dep) if dep.constraint.is_some() => versioned.push(dep),
                _ => names.push(pattern.as_ref().to_string()),
            }
        }
        self.retain(|id| {
            pool.data(id).deps(kind).iter().any(|dep| {
                versioned.iter().any(|v| dep.intersects(v))
                    || names.iter().any(|n| match_string(&dep.name, n, cmp))
            })
        });
    }

    /// Keep packages with a `kind` dependency satisfied by a package in `other`
    pub fn filter_dep_by_query(&mut self, kind: DepKind, other: &PackageQuery<'_>) {
        let pool = self.pool;
        self.retain(|id| {
            pool.data(id).deps(kind).iter().any(|dep| {
                pool.whatprovides(dep).iter().any(|p| other.contains(*p))
            })
        });
    }

    /// Keep packages with a `kind` dependency intersecting one of `deps`
    pub fn filter_dep_by_reldeps(&mut self, kind: DepKind, deps: &[Reldep]) {
        let pool = self.pool;
        self.retain(|id| {
            pool.data(id)
                .deps(kind)
                .iter()
                .any(|dep| deps.iter().any(|d| dep.intersects(d)))
        });
    }

    pub fn filter_provides(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Provides, patterns, cmp);
    }

    pub fn filter_requires(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Requires, patterns, cmp);
    }

    pub fn filter_requires_pre(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::RequiresPre, patterns, cmp);
    }

    pub fn filter_conflicts(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Conflicts, patterns, cmp);
    }

    pub fn filter_obsoletes(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Obsoletes, patterns, cmp);
    }

    pub fn filter_recommends(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Recommends, patterns, cmp);
    }

    pub fn filter_suggests(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Suggests, patterns, cmp);
    }

    pub fn filter_enhances(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Enhances, patterns, cmp);
    }

    pub fn filter_supplements(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        self.filter_dep(DepKind::Supplements, patterns, cmp);
    }

    /// Keep packages owning a file matching one of `patterns`
    pub fn filter_file(&mut self, patterns: &[impl AsRef<str>], cmp: QueryCmp) {
        let pool = self.pool;
        self.retain(|id| {
            pool.data(id)
                .files
                .iter()
                .any(|f| matches_any(f, patterns, cmp))
        });
    }

    /// Keep packages at or above a version one of `advisories` lists for
    /// the same name and architecture
    pub fn filter_advisories(&mut self, advisories: &[&Advisory]) {
        let mut fixed: HashMap<(&str, &str), Vec<&Evr>> = HashMap::new();
        for pkg in advisories.iter().flat_map(|a| &a.packages) {
            fixed
                .entry((pkg.name.as_str(), pkg.arch.as_str()))
                .or_default()
                .push(&pkg.evr);
        }
        let pool = self.pool;
        self.retain(|id| {
            let data = pool.data(id);
            fixed
                .get(&(data.name.as_str(), data.arch.as_str()))
                .is_some_and(|evrs| evrs.iter().any(|evr| data.evr >= **evr))
        });
    }

    /// Keep packages built at or after `timestamp`
    pub fn filter_recent(&mut self, timestamp: i64) {
        let pool = self.pool;
        self.retain(|id| pool.data(id).build_time >= timestamp);
    }

    /// With `limit > 0` keep the `limit` highest EVRs of each `name.arch`,
    /// with `limit < 0` drop them and keep the rest
    pub fn filter_latest_evr(&mut self, limit: i32) {
        if limit == 0 {
            return;
        }
        let pool = self.pool;
        let mut groups: HashMap<(&str, &str), Vec<PackageId>> = HashMap::new();
        for id in self.set.iter() {
            let data = pool.data(id);
            groups
                .entry((data.name.as_str(), data.arch.as_str()))
                .or_default()
                .push(id);
        }

        let mut keep = PackageSet::new();
        let n = limit.unsigned_abs() as usize;
        for ids in groups.into_values() {
            let mut evrs: Vec<&Evr> = ids.iter().map(|id| &pool.data(*id).evr).collect();
            evrs.sort_by(|a, b| b.cmp(a));
            evrs.dedup();
            let top: Vec<&Evr> = evrs.into_iter().take(n).collect();
            for id in ids {
                let in_top = top.contains(&&pool.data(id).evr);
                if in_top == (limit > 0) {
                    keep.add(id);
                }
            }
        }
        self.set = keep;
    }

    /// Keep only available packages from the best-priority repository of
    /// each `name.arch`; installed packages are always kept
    pub fn filter_priority(&mut self) {
        let pool = self.pool;
        let mut best: HashMap<(&str, &str), i32> = HashMap::new();
        for id in self.set.iter() {
            let repo = pool.repo_of(id);
            if repo.kind == RepoKind::System {
                continue;
            }
            let data = pool.data(id);
            let entry = best
                .entry((data.name.as_str(), data.arch.as_str()))
                .or_insert(repo.priority);
            *entry = (*entry).min(repo.priority);
        }
        self.retain(|id| {
            let repo = pool.repo_of(id);
            let data = pool.data(id);
            repo.kind == RepoKind::System
                || best.get(&(data.name.as_str(), data.arch.as_str())) == Some(&repo.priority)
        });
    }

    /// Installed packages with the `user` reason
    pub fn filter_userinstalled(&mut self) {
        let pool = self.pool;
        self.retain(|id| {
            pool.repo_of(id).kind == RepoKind::System && pool.reason(id) == Reason::User
        });
    }

    /// Installed packages of which more than one version of the same
    /// `name.arch` is installed
    pub fn filter_duplicates(&mut self) {
        self.filter_installed();
        let pool = self.pool;
        let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
        for id in self.set.iter() {
            let data = pool.data(id);
            *counts
                .entry((data.name.as_str(), data.arch.as_str()))
                .or_default() += 1;
        }
        self.retain(|id| {
            let data = pool.data(id);
            counts
                .get(&(data.name.as_str(), data.arch.as_str()))
                .copied()
                .unwrap_or(0)
                > 1
        });
    }

    pub fn filter_installonly(&mut self) {
        let pool = self.pool;
        self.retain(|id| pool.is_installonly(id));
    }

    /// Installed packages not available from any repository. With
    /// `exact_evr` the exact NEVRA must be missing, otherwise `name.arch`.
    pub fn filter_extras(&mut self, exact_evr: bool) {
        self.filter_installed();
        let pool = self.pool;
        let mut available = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        available.filter_available();
        let known: HashSet<String> = available
            .ids()
            .map(|id| {
                let data = pool.data(id);
                if exact_evr {
                    data.nevra()
                } else {
                    format!("{}.{}", data.name, data.arch)
                }
            })
            .collect();
        self.retain(|id| {
            let data = pool.data(id);
            let key = if exact_evr {
                data.nevra()
            } else {
                format!("{}.{}", data.name, data.arch)
            };
            !known.contains(&key)
        });
    }

    /// Available packages that upgrade an installed package
    pub fn filter_upgrades(&mut self) {
        let installed = self.installed_by_name();
        let pool = self.pool;
        self.retain(|id| {
            if pool.repo_of(id).kind == RepoKind::System {
                return false;
            }
            let data = pool.data(id);
            installed.get(data.name.as_str()).is_some_and(|list| {
                list.iter()
                    .filter(|i| arch_upgradable(&pool.data(**i).arch, &data.arch))
                    .map(|i| &pool.data(*i).evr)
                    .max()
                    .is_some_and(|best| data.evr > *best)
            })
        });
    }

    /// Available packages that downgrade an installed package
    pub fn filter_downgrades(&mut self) {
        let installed = self.installed_by_name();
        let pool = self.pool;
        self.retain(|id| {
            if pool.repo_of(id).kind == RepoKind::System {
                return false;
            }
            let data = pool.data(id);
            installed.get(data.name.as_str()).is_some_and(|list| {
                list.iter()
                    .filter(|i| arch_upgradable(&pool.data(**i).arch, &data.arch))
                    .map(|i| &pool.data(*i).evr)
                    .min()
                    .is_some_and(|lowest| data.evr < *lowest)
            })
        });
    }

    /// Installed packages for which an upgrade is available
    pub fn filter_upgradable(&mut self) {
        let pool = self.pool;
        let mut upgrades = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        upgrades.filter_upgrades();
        self.filter_installed();
        self.retain(|id| {
            let data = pool.data(id);
            upgrades.iter().any(|u| {
                u.name() == data.name && arch_upgradable(&data.arch, u.arch()) && *u.evr() > data.evr
            })
        });
    }

    /// Installed packages not required by any other installed package.
    ///
    /// Installed packages are grouped into strongly connected components of
    /// the `requires` graph; a component is a leaf when nothing outside it
    /// requires into it, and all of its members are kept.
    pub fn filter_leaves(&mut self) {
        let pool = self.pool;
        let installed = installed_ids(pool);
        let graph = requires_graph(pool, &installed, &[DepKind::Requires]);

        let mut leaves = PackageSet::new();
        let mut component_of = vec![0usize; graph.node_count()];
        let components = tarjan_scc(&graph);
        for (c, members) in components.iter().enumerate() {
            for node in members {
                component_of[node.index()] = c;
            }
        }
        for (c, members) in components.iter().enumerate() {
            let required_from_outside = members.iter().any(|node| {
                graph
                    .neighbors_directed(*node, petgraph::Direction::Incoming)
                    .any(|src| component_of[src.index()] != c)
            });
            if !required_from_outside {
                leaves.extend(members.iter().map(|node| graph[*node]));
            }
        }
        self.set &= &leaves;
    }

    /// Installed dependencies no longer reachable from a package the user
    /// (or a group, or an outside tool) asked for
    pub fn filter_unneeded(&mut self) {
        let pool = self.pool;
        let installed = installed_ids(pool);
        let graph = requires_graph(
            pool,
            &installed,
            &[DepKind::Requires, DepKind::RequiresPre, DepKind::Recommends],
        );

        let mut reached = vec![false; graph.node_count()];
        let mut queue: VecDeque<NodeIndex> = graph
            .node_indices()
            .filter(|n| {
                !matches!(
                    pool.reason(graph[*n]),
                    Reason::Dependency | Reason::WeakDependency | Reason::Clean
                )
            })
            .collect();
        for node in &queue {
            reached[node.index()] = true;
        }
        while let Some(node) = queue.pop_front() {
            for next in graph.neighbors(node) {
                if !reached[next.index()] {
                    reached[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }

        let unneeded: PackageSet = graph
            .node_indices()
            .filter(|n| !reached[n.index()])
            .map(|n| graph[n])
            .collect();
        self.set &= &unneeded;
    }

    /// Installed packages grouped by name
    fn installed_by_name(&self) -> HashMap<&'a str, Vec<PackageId>> {
        let pool = self.pool;
        let mut map: HashMap<&'a str, Vec<PackageId>> = HashMap::new();
        for id in installed_ids(pool) {
            map.entry(pool.data(id).name.as_str()).or_default().push(id);
        }
        map
    }
}

fn matches_any(value: &str, patterns: &[impl AsRef<str>], cmp: QueryCmp) -> bool {
    if cmp == QueryCmp::Neq {
        return patterns.iter().all(|p| value != p.as_ref());
    }
    patterns.iter().any(|p| match_string(value, p.as_ref(), cmp))
}

/// An installed package of `installed_arch` can be replaced by `arch`
pub fn arch_upgradable(installed_arch: &str, arch: &str) -> bool {
    installed_arch == arch || installed_arch == "noarch" || arch == "noarch"
}

fn installed_ids(pool: &Pool) -> Vec<PackageId> {
    pool.ids()
        .filter(|id| pool.repo_of(*id).kind == RepoKind::System)
        .collect()
}

/// Directed graph over `installed` with an edge from each package to the
/// installed packages satisfying its dependencies of `kinds`
fn requires_graph(pool: &Pool, installed: &[PackageId], kinds: &[DepKind]) -> DiGraph<PackageId, ()> {
    let mut graph = DiGraph::new();
    let mut nodes: HashMap<PackageId, NodeIndex> = HashMap::new();
    for id in installed {
        nodes.insert(*id, graph.add_node(*id));
    }
    for id in installed {
        let from = nodes[id];
        let mut targets = HashSet::new();
        for kind in kinds {
            for dep in pool.data(*id).deps(*kind) {
                for provider in pool.whatprovides(dep) {
                    if provider != *id {
                        if let Some(to) = nodes.get(&provider) {
                            targets.insert(*to);
                        }
                    }
                }
            }
        }
        for to in targets {
            graph.add_edge(from, to, ());
        }
    }
    graph
}

impl BitOrAssign<&PackageQuery<'_>> for PackageQuery<'_> {
    fn bitor_assign(&mut self, rhs: &PackageQuery<'_>) {
        self.set |= &rhs.set;
    }
}

impl BitAndAssign<&PackageQuery<'_>> for PackageQuery<'_> {
    fn bitand_assign(&mut self, rhs: &PackageQuery<'_>) {
        self.set &= &rhs.set;
    }
}

impl SubAssign<&PackageQuery<'_>> for PackageQuery<'_> {
    fn sub_assign(&mut self, rhs: &PackageQuery<'_>) {
        self.set -= &rhs.set;
    }
}
