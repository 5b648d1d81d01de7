// src/goal.rs

//! Transaction requests and their resolution
//!
//! A `Goal` collects jobs (install, upgrade, remove, ...) and resolves them
//! against the pool into a `Transaction`. Resolution is greedy: every job
//! picks the best candidate for what it asks for, then the requirements of
//! incoming packages are closed over by picking the best provider of each
//! unsatisfied dependency. Nothing is backtracked; whatever cannot be
//! satisfied is collected as a problem and fails the resolution.

use crate::config::ConfigMain;
use crate::db::models::{InstalledGroup, ItemAction, Reason};
use crate::error::{Error, Result};
use crate::rpm::{DepKind, Reldep};
use crate::sack::{
    CMDLINE_REPO_ID, ExcludeFlags, PackageId, PackageQuery, Pool, QueryCmp, RepoKind,
    ResolveSpecSettings, arch_upgradable, compatible_arches, match_string,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{debug, info, warn};

/// A single request queued on a goal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalJob {
    Install(String),
    /// Upgrade the packages matching the spec, or the whole system
    Upgrade(Option<String>),
    Remove(String),
    Downgrade(String),
    Reinstall(String),
    /// Synchronize installed packages to the best available versions
    DistroSync(Option<String>),
    GroupInstall(String),
    GroupRemove(String),
}

impl fmt::Display for GoalJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalJob::Install(spec) => write!(f, "install {}", spec),
            GoalJob::Upgrade(Some(spec)) => write!(f, "upgrade {}", spec),
            GoalJob::Upgrade(None) => f.write_str("upgrade"),
            GoalJob::Remove(spec) => write!(f, "remove {}", spec),
            GoalJob::Downgrade(spec) => write!(f, "downgrade {}", spec),
            GoalJob::Reinstall(spec) => write!(f, "reinstall {}", spec),
            GoalJob::DistroSync(Some(spec)) => write!(f, "distro-sync {}", spec),
            GoalJob::DistroSync(None) => f.write_str("distro-sync"),
            GoalJob::GroupInstall(group) => write!(f, "group install {}", group),
            GoalJob::GroupRemove(group) => write!(f, "group remove {}", group),
        }
    }
}

/// Per-job options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSettings {
    /// Log unmatched specs instead of failing
    pub skip_unavailable: bool,
    /// Remove installed packages whose dependencies the transaction breaks
    pub allow_erasing: bool,
    /// Only take candidates from these repositories (globs)
    pub repo_ids: Vec<String>,
}

/// One package action of a resolved transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionItem {
    pub package: PackageId,
    pub action: ItemAction,
    /// Reason the package is on the system after the transaction
    pub reason: Reason,
    /// Installed packages this one replaces
    pub replaces: Vec<PackageId>,
}

/// Result of a goal resolution
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub items: Vec<TransactionItem>,
    pub groups_install: Vec<InstalledGroup>,
    pub groups_remove: Vec<String>,
}

impl Transaction {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.groups_install.is_empty() && self.groups_remove.is_empty()
    }

    pub fn items_of(&self, action: ItemAction) -> impl Iterator<Item = &TransactionItem> {
        self.items.iter().filter(move |item| item.action == action)
    }

    /// Bytes to download for the incoming packages
    pub fn download_size(&self, pool: &Pool) -> u64 {
        self.items
            .iter()
            .filter(|item| item.action.is_inbound())
            .map(|item| pool.data(item.package).download_size)
            .sum()
    }
}

/// Queue of jobs against a pool
#[derive(Debug)]
pub struct Goal<'a> {
    pool: &'a Pool,
    install_weak_deps: bool,
    installonly_limit: u32,
    clean_requirements_on_remove: bool,
    jobs: Vec<(GoalJob, GoalSettings)>,
    installed_groups: Vec<InstalledGroup>,
}

impl<'a> Goal<'a> {
    pub fn new(pool: &'a Pool, config: &ConfigMain) -> Self {
        Self {
            pool,
            install_weak_deps: *config.install_weak_deps.get(),
            installonly_limit: *config.installonly_limit.get(),
            clean_requirements_on_remove: *config.clean_requirements_on_remove.get(),
            jobs: Vec::new(),
            installed_groups: Vec::new(),
        }
    }

    pub fn add_job(&mut self, job: GoalJob, settings: GoalSettings) {
        debug!("Queued job: {}", job);
        self.jobs.push((job, settings));
    }

    /// Groups recorded as installed, needed by group removal
    pub fn set_installed_groups(&mut self, groups: Vec<InstalledGroup>) {
        self.installed_groups = groups;
    }

    pub fn jobs(&self) -> impl Iterator<Item = &GoalJob> {
        self.jobs.iter().map(|(job, _)| job)
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Resolve all queued jobs into a transaction
    pub fn resolve(&self) -> Result<Transaction> {
        let mut resolver = Resolver::new(self.pool, self.install_weak_deps);
        for (job, settings) in &self.jobs {
            resolver.run_job(job, settings, &self.installed_groups);
        }
        resolver.close_dependencies();

        let allow_erasing = self.jobs.iter().any(|(_, s)| s.allow_erasing);
        resolver.handle_broken_dependents(allow_erasing);
        resolver.check_conflicts();
        resolver.limit_installonly(self.installonly_limit);

        let removes = self
            .jobs
            .iter()
            .any(|(job, _)| matches!(job, GoalJob::Remove(_) | GoalJob::GroupRemove(_)));
        if removes && self.clean_requirements_on_remove {
            resolver.remove_unneeded();
        }

        if !resolver.problems.is_empty() {
            let mut problems = resolver.problems;
            problems.dedup();
            return Err(Error::Resolve(problems));
        }
        let transaction = resolver.into_transaction();
        info!("Resolved {} transaction items", transaction.items.len());
        Ok(transaction)
    }
}

fn reason_rank(reason: Reason) -> u8 {
    match reason {
        Reason::User => 5,
        Reason::Group => 4,
        Reason::External => 3,
        Reason::Dependency => 2,
        Reason::WeakDependency => 1,
        Reason::Clean | Reason::None => 0,
    }
}

fn action_rank(action: ItemAction) -> u8 {
    match action {
        ItemAction::Install => 0,
        ItemAction::Upgrade => 1,
        ItemAction::Reinstall => 2,
        ItemAction::Downgrade => 3,
        ItemAction::Remove => 4,
        ItemAction::ReasonChange => 5,
        ItemAction::Upgraded => 6,
        ItemAction::Downgraded => 7,
    }
}

/// Dependencies the resolver does not try to satisfy
fn is_ignored_dep(dep: &Reldep) -> bool {
    dep.is_rich() || dep.name.starts_with("rpmlib(")
}

struct Resolver<'a> {
    pool: &'a Pool,
    install_weak_deps: bool,
    available: PackageQuery<'a>,
    installed: Vec<PackageId>,
    items: Vec<TransactionItem>,
    incoming: HashSet<PackageId>,
    leaving: HashSet<PackageId>,
    reason_changes: HashMap<PackageId, Reason>,
    queue: VecDeque<PackageId>,
    problems: Vec<String>,
    groups_install: Vec<InstalledGroup>,
    groups_remove: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(pool: &'a Pool, install_weak_deps: bool) -> Self {
        let mut available = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        available.filter_available();
        Self {
            pool,
            install_weak_deps,
            available,
            installed: pool.packages_of_kind(RepoKind::System).iter().collect(),
            items: Vec::new(),
            incoming: HashSet::new(),
            leaving: HashSet::new(),
            reason_changes: HashMap::new(),
            queue: VecDeque::new(),
            problems: Vec::new(),
            groups_install: Vec::new(),
            groups_remove: Vec::new(),
        }
    }

    fn available_for(&self, settings: &GoalSettings) -> PackageQuery<'a> {
        let mut query = self.available.clone();
        if !settings.repo_ids.is_empty() {
            let mut repos = settings.repo_ids.clone();
            repos.push(CMDLINE_REPO_ID.to_string());
            query.filter_repo_id(&repos, QueryCmp::Glob);
        }
        query
    }

    fn installed_query(&self) -> PackageQuery<'a> {
        let mut query = PackageQuery::new(self.pool, ExcludeFlags::ApplyExcludes);
        query.filter_installed();
        for id in &self.leaving {
            query.remove(*id);
        }
        query
    }

    fn is_installed(&self, id: PackageId) -> bool {
        self.pool.repo_of(id).kind == RepoKind::System
    }

    /// Whether `id` is on the system once the transaction is done
    fn is_final(&self, id: PackageId) -> bool {
        if self.is_installed(id) {
            !self.leaving.contains(&id)
        } else {
            self.incoming.contains(&id)
        }
    }

    fn satisfied(&self, dep: &Reldep) -> bool {
        self.pool.whatprovides(dep).into_iter().any(|id| self.is_final(id))
    }

    fn satisfied_before(&self, dep: &Reldep) -> bool {
        self.pool
            .whatprovides(dep)
            .into_iter()
            .any(|id| self.is_installed(id))
    }

    fn remaining_installed(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.installed
            .iter()
            .copied()
            .filter(|id| !self.leaving.contains(id))
    }

    /// Installed packages an available `id` would replace
    fn installed_like(&self, id: PackageId) -> Vec<PackageId> {
        let data = self.pool.data(id);
        self.remaining_installed()
            .filter(|i| {
                let installed = self.pool.data(*i);
                installed.name == data.name && arch_upgradable(&installed.arch, &data.arch)
            })
            .collect()
    }

    fn current_reason(&self, id: PackageId) -> Reason {
        self.reason_changes
            .get(&id)
            .copied()
            .unwrap_or_else(|| self.pool.reason(id))
    }

    fn arch_score(&self, arch: &str) -> usize {
        let arches = compatible_arches(self.pool.arch());
        match arches.iter().position(|a| *a == arch) {
            Some(pos) => 2 * arches.len() - pos,
            None if arch == "noarch" => arches.len(),
            None => 0,
        }
    }

    /// Candidate order: higher EVR, then lower repo priority value, then
    /// lower cost, then the better architecture. Lower ids win ties.
    fn candidate_cmp(&self, a: PackageId, b: PackageId) -> Ordering {
        let (data_a, data_b) = (self.pool.data(a), self.pool.data(b));
        let (repo_a, repo_b) = (self.pool.repo_of(a), self.pool.repo_of(b));
        data_a
            .evr
            .cmp(&data_b.evr)
            .then_with(|| repo_b.priority.cmp(&repo_a.priority))
            .then_with(|| repo_b.cost.cmp(&repo_a.cost))
            .then_with(|| self.arch_score(&data_a.arch).cmp(&self.arch_score(&data_b.arch)))
            .then_with(|| b.cmp(&a))
    }

    fn best_of(&self, ids: impl IntoIterator<Item = PackageId>) -> Option<PackageId> {
        ids.into_iter().max_by(|a, b| self.candidate_cmp(*a, *b))
    }

    /// Best candidate of each name in `query`, in name order
    fn best_per_name(&self, query: &PackageQuery<'a>) -> Vec<PackageId> {
        let mut by_name: BTreeMap<&str, Vec<PackageId>> = BTreeMap::new();
        for pkg in query.iter() {
            by_name.entry(pkg.name()).or_default().push(pkg.id());
        }
        by_name
            .into_values()
            .filter_map(|ids| self.best_of(ids))
            .collect()
    }

    fn unavailable(&mut self, settings: &GoalSettings, message: String) {
        if settings.skip_unavailable {
            warn!("{}", message);
        } else {
            self.problems.push(message);
        }
    }

    fn plan_in(&mut self, id: PackageId, action: ItemAction, reason: Reason, replaces: Vec<PackageId>) {
        if !self.incoming.insert(id) {
            return;
        }
        debug!(
            "Planning {} of {}",
            action.as_str(),
            self.pool.data(id).full_nevra()
        );
        self.leaving.extend(replaces.iter().copied());
        self.items.push(TransactionItem {
            package: id,
            action,
            reason,
            replaces,
        });
        self.queue.push_back(id);
    }

    fn plan_out(&mut self, id: PackageId) {
        if !self.is_installed(id) || !self.leaving.insert(id) {
            return;
        }
        debug!("Planning removal of {}", self.pool.data(id).full_nevra());
        self.items.push(TransactionItem {
            package: id,
            action: ItemAction::Remove,
            reason: self.current_reason(id),
            replaces: Vec::new(),
        });
    }

    /// Raise the reason of an installed package when the user or a group
    /// asks for it explicitly
    fn promote(&mut self, id: PackageId, reason: Reason) {
        if !matches!(reason, Reason::User | Reason::Group) {
            return;
        }
        if reason_rank(reason) <= reason_rank(self.current_reason(id)) {
            info!(
                "Package {} is already installed",
                self.pool.data(id).full_nevra()
            );
            return;
        }
        self.reason_changes.insert(id, reason);
        let existing = self
            .items
            .iter()
            .position(|item| item.package == id && item.action == ItemAction::ReasonChange);
        match existing {
            Some(index) => self.items[index].reason = reason,
            None => self.items.push(TransactionItem {
                package: id,
                action: ItemAction::ReasonChange,
                reason,
                replaces: Vec::new(),
            }),
        }
    }

    /// Bring the available package `id` onto the system: a fresh install,
    /// an upgrade or downgrade of the installed versions, or nothing when
    /// it is installed already
    fn install_package(&mut self, id: PackageId, reason: Reason) {
        if self.incoming.contains(&id) {
            return;
        }
        let pool = self.pool;
        let data = pool.data(id);

        if pool.is_installonly(id) {
            let nevra = data.nevra();
            let installed = self
                .remaining_installed()
                .find(|i| pool.data(*i).nevra() == nevra);
            match installed {
                Some(installed) => self.promote(installed, reason),
                None => self.plan_in(id, ItemAction::Install, reason, Vec::new()),
            }
            return;
        }

        let same = self.installed_like(id);
        if let Some(installed) = same
            .iter()
            .copied()
            .find(|i| pool.data(*i).evr == data.evr && pool.data(*i).arch == data.arch)
        {
            self.promote(installed, reason);
            return;
        }
        let Some(highest) = same.iter().map(|i| &pool.data(*i).evr).max() else {
            self.plan_in(id, ItemAction::Install, reason, Vec::new());
            return;
        };

        let action = if data.evr >= *highest {
            ItemAction::Upgrade
        } else {
            ItemAction::Downgrade
        };
        let kept = same
            .iter()
            .map(|i| self.current_reason(*i))
            .chain(std::iter::once(reason))
            .max_by_key(|r| reason_rank(*r))
            .unwrap_or(reason);
        self.plan_in(id, action, kept, same);
    }

    /// Strongest reason among the installed packages
    fn kept_reason(&self, installed: &[PackageId]) -> Reason {
        installed
            .iter()
            .map(|i| self.current_reason(*i))
            .max_by_key(|r| reason_rank(*r))
            .unwrap_or(Reason::None)
    }

    fn run_job(&mut self, job: &GoalJob, settings: &GoalSettings, installed_groups: &[InstalledGroup]) {
        debug!("Resolving job: {}", job);
        match job {
            GoalJob::Install(spec) => self.install(spec, settings),
            GoalJob::Upgrade(spec) => self.upgrade(spec.as_deref(), settings),
            GoalJob::Remove(spec) => self.remove(spec, settings),
            GoalJob::Downgrade(spec) => self.downgrade(spec, settings),
            GoalJob::Reinstall(spec) => self.reinstall(spec, settings),
            GoalJob::DistroSync(spec) => self.distro_sync(spec.as_deref(), settings),
            GoalJob::GroupInstall(pattern) => self.group_install(pattern, settings, installed_groups),
            GoalJob::GroupRemove(pattern) => self.group_remove(pattern, settings, installed_groups),
        }
    }

    fn install(&mut self, spec: &str, settings: &GoalSettings) {
        let mut query = self.available_for(settings);
        let (found, nevra) = query.resolve_pkg_spec(spec, &ResolveSpecSettings::default());
        if !found {
            self.unavailable(settings, format!("No match for argument: {}", spec));
            return;
        }
        let pinned = nevra.is_some_and(|n| !n.version.is_empty());
        for id in self.best_per_name(&query) {
            let installed = self.installed_like(id);
            if !pinned && !installed.is_empty() && !self.pool.is_installonly(id) {
                for i in installed {
                    self.promote(i, Reason::User);
                }
                continue;
            }
            self.install_package(id, Reason::User);
        }
    }

    /// Installed packages grouped by name, limited to `names` when given
    fn installed_by_name(&self, names: Option<&HashSet<&str>>) -> BTreeMap<&'a str, Vec<PackageId>> {
        let pool = self.pool;
        let mut map: BTreeMap<&'a str, Vec<PackageId>> = BTreeMap::new();
        for id in self.remaining_installed() {
            let name = pool.data(id).name.as_str();
            if names.is_none_or(|n| n.contains(name)) {
                map.entry(name).or_default().push(id);
            }
        }
        map
    }

    /// Candidates among `query` replacing one of `installed`
    fn candidates_for(&self, query: &PackageQuery<'a>, installed: &[PackageId]) -> Vec<PackageId> {
        let pool = self.pool;
        let name = pool.data(installed[0]).name.as_str();
        query
            .ids()
            .filter(|c| {
                let data = pool.data(*c);
                data.name == name
                    && installed
                        .iter()
                        .any(|i| arch_upgradable(&pool.data(*i).arch, &data.arch))
            })
            .collect()
    }

    fn upgrade(&mut self, spec: Option<&str>, settings: &GoalSettings) {
        let pool = self.pool;
        let mut candidates = self.available_for(settings);

        let names: Option<HashSet<&str>> = match spec {
            None => {
                self.upgrade_obsoleted(&candidates);
                None
            }
            Some(spec) => {
                if !candidates.resolve_pkg_spec(spec, &ResolveSpecSettings::default()).0 {
                    self.unavailable(settings, format!("No match for argument: {}", spec));
                    return;
                }
                let names: HashSet<&str> = candidates.iter().map(|p| p.name()).collect();
                for name in &names {
                    if self.remaining_installed().all(|i| pool.data(i).name != *name) {
                        self.unavailable(
                            settings,
                            format!("Package {} available, but not installed.", name),
                        );
                    }
                }
                Some(names)
            }
        };

        for (name, installed) in self.installed_by_name(names.as_ref()) {
            let Some(best) = self.best_of(self.candidates_for(&candidates, &installed)) else {
                continue;
            };
            let newest = installed.iter().map(|i| &pool.data(*i).evr).max();
            if newest.is_some_and(|evr| pool.data(best).evr > *evr) {
                let reason = self.kept_reason(&installed);
                self.install_package(best, reason);
            } else {
                debug!("Nothing to upgrade for {}", name);
            }
        }
    }

    /// Install available packages obsoleting installed ones
    fn upgrade_obsoleted(&mut self, candidates: &PackageQuery<'a>) {
        let pool = self.pool;
        let mut obsoleters: Vec<(PackageId, Vec<PackageId>)> = Vec::new();
        for pkg in candidates.iter() {
            if self.remaining_installed().any(|i| pool.data(i).name == pkg.name()) {
                continue;
            }
            let obsoleted: Vec<PackageId> = pkg
                .deps(DepKind::Obsoletes)
                .iter()
                .flat_map(|dep| {
                    pool.whatprovides(dep)
                        .into_iter()
                        .filter(move |i| pool.data(*i).name == dep.name)
                })
                .filter(|i| self.is_installed(*i) && !self.leaving.contains(i))
                .collect();
            if !obsoleted.is_empty() {
                obsoleters.push((pkg.id(), obsoleted));
            }
        }
        for (id, mut obsoleted) in obsoleters {
            obsoleted.retain(|i| !self.leaving.contains(i));
            if obsoleted.is_empty() {
                continue;
            }
            obsoleted.sort();
            obsoleted.dedup();
            let reason = self.kept_reason(&obsoleted);
            self.plan_in(id, ItemAction::Upgrade, reason, obsoleted);
        }
    }

    fn remove(&mut self, spec: &str, settings: &GoalSettings) {
        let mut query = self.installed_query();
        if !query.resolve_pkg_spec(spec, &ResolveSpecSettings::default()).0 {
            self.unavailable(settings, format!("No packages to remove for argument: {}", spec));
            return;
        }
        let ids: Vec<PackageId> = query.ids().collect();
        for id in ids {
            self.plan_out(id);
        }
    }

    fn downgrade(&mut self, spec: &str, settings: &GoalSettings) {
        let pool = self.pool;
        let mut candidates = self.available_for(settings);
        if !candidates.resolve_pkg_spec(spec, &ResolveSpecSettings::default()).0 {
            self.unavailable(settings, format!("No match for argument: {}", spec));
            return;
        }
        let names: HashSet<&str> = candidates.iter().map(|p| p.name()).collect();
        let installed = self.installed_by_name(Some(&names));
        if installed.is_empty() {
            self.unavailable(
                settings,
                format!("Packages for argument '{}' available, but not installed.", spec),
            );
            return;
        }
        for (name, installed) in installed {
            let Some(lowest) = installed.iter().map(|i| &pool.data(*i).evr).min() else {
                continue;
            };
            let older = self
                .candidates_for(&candidates, &installed)
                .into_iter()
                .filter(|c| pool.data(*c).evr < *lowest);
            match self.best_of(older) {
                Some(best) => {
                    let reason = self.kept_reason(&installed);
                    self.install_package(best, reason);
                }
                None => self.problems.push(format!(
                    "The lowest available version of the \"{}\" package is already installed, cannot downgrade it.",
                    name
                )),
            }
        }
    }

    fn reinstall(&mut self, spec: &str, settings: &GoalSettings) {
        let pool = self.pool;
        let mut query = self.installed_query();
        if !query.resolve_pkg_spec(spec, &ResolveSpecSettings::default()).0 {
            self.unavailable(settings, format!("No match for argument: {}", spec));
            return;
        }
        let available = self.available_for(settings);
        let installed: Vec<PackageId> = query.ids().collect();
        for id in installed {
            let nevra = pool.data(id).nevra();
            let same = available.ids().filter(|a| pool.data(*a).nevra() == nevra);
            match self.best_of(same) {
                Some(candidate) => {
                    let reason = self.current_reason(id);
                    self.plan_in(candidate, ItemAction::Reinstall, reason, vec![id]);
                }
                None => self.unavailable(
                    settings,
                    format!("Installed package {} not available.", pool.data(id).full_nevra()),
                ),
            }
        }
    }

    fn distro_sync(&mut self, spec: Option<&str>, settings: &GoalSettings) {
        let pool = self.pool;
        let candidates = self.available_for(settings);
        let names: Option<HashSet<&str>> = match spec {
            None => None,
            Some(spec) => {
                let mut query = self.installed_query();
                let mut matched = candidates.clone();
                query.resolve_pkg_spec(spec, &ResolveSpecSettings::default());
                matched.resolve_pkg_spec(spec, &ResolveSpecSettings::default());
                if query.is_empty() && matched.is_empty() {
                    self.unavailable(settings, format!("No match for argument: {}", spec));
                    return;
                }
                Some(query.iter().chain(matched.iter()).map(|p| p.name()).collect())
            }
        };

        for (name, installed) in self.installed_by_name(names.as_ref()) {
            if installed.iter().any(|i| pool.is_installonly(*i)) {
                continue;
            }
            let Some(best) = self.best_of(self.candidates_for(&candidates, &installed)) else {
                debug!("No candidate to sync {} to", name);
                continue;
            };
            let reason = self.kept_reason(&installed);
            self.install_package(best, reason);
        }
    }

    fn group_install(
        &mut self,
        pattern: &str,
        settings: &GoalSettings,
        installed_groups: &[InstalledGroup],
    ) {
        let pool = self.pool;
        let groups: Vec<_> = pool
            .merged_groups()
            .into_iter()
            .filter(|g| {
                match_string(&g.id, pattern, QueryCmp::IGlob)
                    || match_string(&g.name, pattern, QueryCmp::IGlob)
            })
            .collect();
        if groups.is_empty() {
            self.unavailable(settings, format!("No match for group: {}", pattern));
            return;
        }
        let available = self.available_for(settings);
        for group in groups {
            if installed_groups.iter().any(|g| g.group_id == group.id) {
                info!("Group {} is already installed", group.id);
            }
            let mut names = Vec::new();
            for member in group.install_packages(false) {
                let candidates = available.ids().filter(|id| pool.data(*id).name == member.name);
                let Some(best) = self.best_of(candidates) else {
                    warn!("No match for group package \"{}\"", member.name);
                    continue;
                };
                names.push(member.name.clone());
                if self.installed_like(best).is_empty() {
                    self.install_package(best, Reason::Group);
                }
            }
            self.groups_install.push(InstalledGroup::new(
                group.id.clone(),
                group.name.clone(),
                Reason::User,
                names,
            ));
        }
    }

    fn group_remove(
        &mut self,
        pattern: &str,
        settings: &GoalSettings,
        installed_groups: &[InstalledGroup],
    ) {
        let (removed, kept): (Vec<&InstalledGroup>, Vec<&InstalledGroup>) = installed_groups
            .iter()
            .partition(|g| {
                match_string(&g.group_id, pattern, QueryCmp::IGlob)
                    || match_string(&g.name, pattern, QueryCmp::IGlob)
            });
        if removed.is_empty() {
            self.unavailable(settings, format!("No groups to remove for argument: {}", pattern));
            return;
        }
        let still_needed: HashSet<&str> = kept
            .iter()
            .flat_map(|g| g.packages.iter().map(String::as_str))
            .collect();

        let pool = self.pool;
        for group in removed {
            for name in &group.packages {
                if still_needed.contains(name.as_str()) {
                    continue;
                }
                let members: Vec<PackageId> = self
                    .remaining_installed()
                    .filter(|i| pool.data(*i).name == *name && self.current_reason(*i) == Reason::Group)
                    .collect();
                for id in members {
                    self.plan_out(id);
                }
            }
            self.groups_remove.push(group.group_id.clone());
        }
    }

    /// Pull in providers for the unsatisfied requirements of every incoming
    /// package, and of the providers in turn
    fn close_dependencies(&mut self) {
        let pool = self.pool;
        while let Some(id) = self.queue.pop_front() {
            let data = pool.data(id);
            let mut kinds = vec![(DepKind::Requires, Reason::Dependency)];
            if self.install_weak_deps {
                kinds.push((DepKind::Recommends, Reason::WeakDependency));
            }
            for (kind, reason) in kinds {
                for dep in data.deps(kind) {
                    if is_ignored_dep(dep) || self.satisfied(dep) {
                        continue;
                    }
                    let providers: Vec<PackageId> = pool
                        .whatprovides(dep)
                        .into_iter()
                        .filter(|p| self.available.contains(*p))
                        .collect();
                    let named = providers.iter().copied().filter(|p| pool.data(*p).name == dep.name);
                    let provider = self.best_of(named).or_else(|| self.best_of(providers.iter().copied()));
                    match provider {
                        Some(provider) => {
                            debug!(
                                "{} needed by {} is provided by {}",
                                dep,
                                data.full_nevra(),
                                pool.data(provider).full_nevra()
                            );
                            self.install_package(provider, reason);
                        }
                        None if kind == DepKind::Requires => self.problems.push(format!(
                            "nothing provides {} needed by {}",
                            dep,
                            data.full_nevra()
                        )),
                        None => debug!("Skipping weak dependency {} of {}", dep, data.full_nevra()),
                    }
                }
            }
        }
    }

    /// Installed packages left with a requirement the transaction takes
    /// away are removed with `allow_erasing` and reported otherwise
    fn handle_broken_dependents(&mut self, allow_erasing: bool) {
        let pool = self.pool;
        loop {
            let broken: Vec<(PackageId, &Reldep)> = self
                .remaining_installed()
                .filter_map(|id| {
                    pool.data(id)
                        .requires
                        .iter()
                        .find(|dep| {
                            !is_ignored_dep(dep) && !self.satisfied(dep) && self.satisfied_before(dep)
                        })
                        .map(|dep| (id, dep))
                })
                .collect();
            if broken.is_empty() {
                return;
            }
            if !allow_erasing {
                for (id, dep) in broken {
                    self.problems.push(format!(
                        "installed package {} requires {}, which would be removed",
                        pool.data(id).full_nevra(),
                        dep
                    ));
                }
                return;
            }
            for (id, _) in broken {
                self.plan_out(id);
            }
        }
    }

    fn check_conflicts(&mut self) {
        let pool = self.pool;
        let mut incoming: Vec<PackageId> = self.incoming.iter().copied().collect();
        incoming.sort();
        let mut problems = Vec::new();
        for id in &incoming {
            let data = pool.data(*id);
            for dep in &data.conflicts {
                for other in pool.whatprovides(dep) {
                    if other != *id && self.is_final(other) && pool.data(other).name != data.name {
                        problems.push(format!(
                            "package {} conflicts with {} provided by {}",
                            data.full_nevra(),
                            dep,
                            pool.data(other).full_nevra()
                        ));
                    }
                }
            }
        }
        for id in self.remaining_installed() {
            let data = pool.data(id);
            for dep in &data.conflicts {
                for other in pool.whatprovides(dep) {
                    if self.incoming.contains(&other) && pool.data(other).name != data.name {
                        problems.push(format!(
                            "package {} conflicts with {} provided by {}",
                            data.full_nevra(),
                            dep,
                            pool.data(other).full_nevra()
                        ));
                    }
                }
            }
        }
        self.problems.extend(problems);
    }

    /// Drop the oldest installed versions of install-only packages that
    /// get a new version, keeping at most `limit`. Zero means no limit.
    fn limit_installonly(&mut self, limit: u32) {
        if limit == 0 {
            return;
        }
        let pool = self.pool;
        let names: HashSet<&str> = self
            .incoming
            .iter()
            .filter(|id| pool.is_installonly(**id))
            .map(|id| pool.data(*id).name.as_str())
            .collect();
        for name in names {
            let mut versions: Vec<PackageId> = self
                .remaining_installed()
                .chain(self.incoming.iter().copied())
                .filter(|id| pool.data(*id).name == name)
                .collect();
            versions.sort_by(|a, b| pool.data(*a).evr.cmp(&pool.data(*b).evr));
            let excess = versions.len().saturating_sub(limit as usize);
            let oldest: Vec<PackageId> = versions
                .into_iter()
                .filter(|id| self.is_installed(*id))
                .take(excess)
                .collect();
            for id in oldest {
                self.plan_out(id);
            }
        }
    }

    /// Reason of a package after the transaction
    fn final_reason(&self, id: PackageId) -> Reason {
        if self.incoming.contains(&id) {
            self.items
                .iter()
                .find(|item| item.package == id)
                .map(|item| item.reason)
                .unwrap_or(Reason::None)
        } else {
            self.current_reason(id)
        }
    }

    /// Installed dependencies unreachable from user, group and external
    /// packages, before or after the transaction
    fn unneeded(&self, after: bool) -> HashSet<PackageId> {
        let pool = self.pool;
        let present: HashSet<PackageId> = if after {
            self.remaining_installed()
                .chain(self.incoming.iter().copied())
                .collect()
        } else {
            self.installed.iter().copied().collect()
        };
        let reason = |id: PackageId| {
            if after {
                self.final_reason(id)
            } else {
                pool.reason(id)
            }
        };

        let mut reached: HashSet<PackageId> = present
            .iter()
            .copied()
            .filter(|id| {
                !matches!(
                    reason(*id),
                    Reason::Dependency | Reason::WeakDependency | Reason::Clean
                )
            })
            .collect();
        let mut queue: VecDeque<PackageId> = reached.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            let data = pool.data(id);
            for kind in [DepKind::Requires, DepKind::RequiresPre, DepKind::Recommends] {
                for dep in data.deps(kind) {
                    for provider in pool.whatprovides(dep) {
                        if present.contains(&provider) && reached.insert(provider) {
                            queue.push_back(provider);
                        }
                    }
                }
            }
        }
        present.difference(&reached).copied().collect()
    }

    /// Remove dependencies that only the removed packages needed
    fn remove_unneeded(&mut self) {
        let before = self.unneeded(false);
        let mut newly: Vec<PackageId> = self
            .unneeded(true)
            .into_iter()
            .filter(|id| self.is_installed(*id) && !before.contains(id))
            .collect();
        newly.sort();
        for id in newly {
            self.plan_out(id);
        }
    }

    fn into_transaction(self) -> Transaction {
        let pool = self.pool;
        let leaving = &self.leaving;
        let mut items: Vec<TransactionItem> = self
            .items
            .into_iter()
            .filter(|item| item.action != ItemAction::ReasonChange || !leaving.contains(&item.package))
            .collect();
        items.sort_by(|a, b| {
            action_rank(a.action)
                .cmp(&action_rank(b.action))
                .then_with(|| pool.data(a.package).full_nevra().cmp(&pool.data(b.package).full_nevra()))
        });
        Transaction {
            items,
            groups_install: self.groups_install,
            groups_remove: self.groups_remove,
        }
    }
}
