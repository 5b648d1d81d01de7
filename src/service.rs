// src/service.rs

//! Session method surface and its line-delimited JSON transport
//!
//! A `Session` wraps a set-up `Base` and exposes the operations a client
//! drives: listing packages, queueing transaction jobs, resolving them and
//! applying the result. `serve` reads one JSON request per line and writes
//! one JSON response per line; transaction progress is written as signal
//! lines ahead of the `do_transaction` response.

use crate::base::Base;
use crate::db::models::{InstalledGroup, ItemAction, Reason};
use crate::error::{Error, Result};
use crate::goal::{Goal, GoalJob, GoalSettings, Transaction};
use crate::output::package_attr;
use crate::packages::is_package_file;
use crate::rpm::{DepKind, Package};
use crate::sack::{CMDLINE_REPO_ID, ExcludeFlags, PackageQuery, Pool, QueryCmp, ResolveSpecSettings};
use crate::transaction::{self, TransactionEvent};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Sender};
use std::thread;
use tracing::{debug, info, warn};

/// Which packages `list` starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    All,
    Installed,
    Available,
    Upgrades,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub package_attrs: Vec<String>,
    pub scope: Scope,
    pub icase: bool,
    pub with_provides: bool,
    pub with_filenames: bool,
    /// Repository id globs
    pub repo: Vec<String>,
    pub latest_limit: i32,
    pub arch: Vec<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            package_attrs: vec!["nevra".to_string()],
            scope: Scope::All,
            icase: true,
            with_provides: true,
            with_filenames: true,
            repo: Vec::new(),
            latest_limit: 0,
            arch: Vec::new(),
        }
    }
}

/// One resolved transaction item as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemInfo {
    pub action: ItemAction,
    pub nevra: String,
    pub repo_id: String,
    pub reason: Reason,
    pub download_size: u64,
    pub install_size: u64,
    pub replaces: Vec<String>,
}

fn dep_strings(pkg: &Package<'_>, kind: DepKind) -> Value {
    Value::from(
        pkg.deps(kind)
            .iter()
            .map(|dep| dep.to_string())
            .collect::<Vec<_>>(),
    )
}

/// Value of one package attribute, typed for JSON
fn attr_value(pkg: &Package<'_>, attr: &str) -> Result<Value> {
    let data = pkg.data();
    let value = match attr {
        "epoch" => Value::from(data.evr.epoch),
        "buildtime" => Value::from(data.build_time),
        "download_size" | "downloadsize" => Value::from(data.download_size),
        "install_size" | "installsize" => Value::from(data.install_size),
        "is_installed" => Value::from(pkg.is_installed()),
        "repo_id" => Value::from(pkg.repo_id()),
        "provides" => dep_strings(pkg, DepKind::Provides),
        "requires" => dep_strings(pkg, DepKind::Requires),
        "requires_pre" => dep_strings(pkg, DepKind::RequiresPre),
        "conflicts" => dep_strings(pkg, DepKind::Conflicts),
        "obsoletes" => dep_strings(pkg, DepKind::Obsoletes),
        "recommends" => dep_strings(pkg, DepKind::Recommends),
        "suggests" => dep_strings(pkg, DepKind::Suggests),
        "enhances" => dep_strings(pkg, DepKind::Enhances),
        "supplements" => dep_strings(pkg, DepKind::Supplements),
        "files" => Value::from(data.files.clone()),
        _ => match package_attr(pkg, attr) {
            Some(value) => Value::from(value),
            None => {
                return Err(Error::ArgumentParser(format!(
                    "Package attribute \"{}\" not supported",
                    attr
                )));
            }
        },
    };
    Ok(value)
}

fn parse_options<T: for<'de> Deserialize<'de> + Default>(options: &Value) -> Result<T> {
    if options.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| Error::ArgumentParser(format!("Invalid options: {}", e)))
}

/// A client session over one `Base`
#[derive(Debug)]
pub struct Session {
    base: Base,
    loaded: bool,
    jobs: Vec<(GoalJob, GoalSettings)>,
    resolved: Option<Transaction>,
}

impl Session {
    /// Wrap `base`, which must be set up. Repositories are loaded on the
    /// first request that needs packages.
    pub fn new(base: Base) -> Result<Self> {
        if !base.is_setup() {
            return Err(Error::InitError("Base is not set up".to_string()));
        }
        Ok(Self {
            base,
            loaded: false,
            jobs: Vec::new(),
            resolved: None,
        })
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut Base {
        &mut self.base
    }

    pub fn pool(&self) -> Result<&Pool> {
        Ok(self.base.repo_sack()?.pool())
    }

    fn ensure_loaded(&mut self) -> Result<()> {
        if !self.loaded {
            self.base
                .repo_sack_mut()?
                .update_and_load_enabled_repos(true)?;
            self.loaded = true;
        }
        Ok(())
    }

    /// Packages matching `specs` (all packages when empty), one attribute
    /// map per package in NEVRA order
    pub fn list(&mut self, specs: &[String], options: &ListOptions) -> Result<Vec<Map<String, Value>>> {
        self.ensure_loaded()?;
        let pool = self.pool()?;

        let mut base = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
        match options.scope {
            Scope::All => {}
            Scope::Installed => base.filter_installed(),
            Scope::Available => base.filter_available(),
            Scope::Upgrades => base.filter_upgrades(),
        }

        let mut result = if specs.is_empty() {
            base
        } else {
            let settings = ResolveSpecSettings {
                ignore_case: options.icase,
                with_provides: options.with_provides,
                with_filenames: options.with_filenames,
                with_binaries: false,
                ..Default::default()
            };
            let mut result = PackageQuery::empty(pool);
            for spec in specs {
                let mut matched = base.clone();
                matched.resolve_pkg_spec(spec, &settings);
                result |= &matched;
            }
            result
        };
        if !options.repo.is_empty() {
            result.filter_repo_id(&options.repo, QueryCmp::Glob);
        }
        if !options.arch.is_empty() {
            result.filter_arch(&options.arch, QueryCmp::Glob);
        }
        if options.latest_limit != 0 {
            result.filter_latest_evr(options.latest_limit);
        }

        result
            .sorted()
            .iter()
            .map(|pkg| {
                options
                    .package_attrs
                    .iter()
                    .map(|attr| Ok((attr.clone(), attr_value(pkg, attr)?)))
                    .collect::<Result<Map<String, Value>>>()
            })
            .collect()
    }

    fn queue(&mut self, job: GoalJob, settings: &GoalSettings) {
        debug!("Queueing {}", job);
        self.resolved = None;
        self.jobs.push((job, settings.clone()));
    }

    /// Queue installation of `specs`. `.rpm` files are added to the
    /// command-line repository and installed from there.
    pub fn install(&mut self, specs: &[String], settings: &GoalSettings) -> Result<()> {
        let files: Vec<String> = specs.iter().filter(|s| is_package_file(s)).cloned().collect();
        if !files.is_empty() {
            let added = self.base.repo_sack_mut()?.add_cmdline_packages(&files)?;
            let pool = self.pool()?;
            let nevras: Vec<String> = added.iter().map(|(_, id)| pool.data(*id).nevra()).collect();
            let cmdline = GoalSettings {
                repo_ids: vec![CMDLINE_REPO_ID.to_string()],
                ..settings.clone()
            };
            for nevra in nevras {
                self.queue(GoalJob::Install(nevra), &cmdline);
            }
        }
        for spec in specs.iter().filter(|s| !is_package_file(s)) {
            self.queue(GoalJob::Install(spec.clone()), settings);
        }
        Ok(())
    }

    /// Queue upgrades of `specs`, or of the whole system when empty
    pub fn upgrade(&mut self, specs: &[String], settings: &GoalSettings) {
        if specs.is_empty() {
            self.queue(GoalJob::Upgrade(None), settings);
        }
        for spec in specs {
            self.queue(GoalJob::Upgrade(Some(spec.clone())), settings);
        }
    }

    pub fn remove(&mut self, specs: &[String], settings: &GoalSettings) {
        for spec in specs {
            self.queue(GoalJob::Remove(spec.clone()), settings);
        }
    }

    /// Queue a distro-sync of `specs`, or of the whole system when empty
    pub fn distro_sync(&mut self, specs: &[String], settings: &GoalSettings) {
        if specs.is_empty() {
            self.queue(GoalJob::DistroSync(None), settings);
        }
        for spec in specs {
            self.queue(GoalJob::DistroSync(Some(spec.clone())), settings);
        }
    }

    pub fn downgrade(&mut self, specs: &[String], settings: &GoalSettings) {
        for spec in specs {
            self.queue(GoalJob::Downgrade(spec.clone()), settings);
        }
    }

    pub fn reinstall(&mut self, specs: &[String], settings: &GoalSettings) {
        for spec in specs {
            self.queue(GoalJob::Reinstall(spec.clone()), settings);
        }
    }

    pub fn group_install(&mut self, groups: &[String], settings: &GoalSettings) {
        for group in groups {
            self.queue(GoalJob::GroupInstall(group.clone()), settings);
        }
    }

    pub fn group_remove(&mut self, groups: &[String], settings: &GoalSettings) {
        for group in groups {
            self.queue(GoalJob::GroupRemove(group.clone()), settings);
        }
    }

    /// Drop the queued jobs and any resolved transaction
    pub fn reset_goal(&mut self) {
        self.jobs.clear();
        self.resolved = None;
    }

    fn installed_groups(&self) -> Result<Vec<InstalledGroup>> {
        if !self.base.system_state_path().exists() {
            return Ok(Vec::new());
        }
        let conn = self.base.open_system_state()?;
        InstalledGroup::list_all(&conn)
    }

    /// Resolve the queued jobs. The transaction is kept for
    /// `do_transaction`; its items are returned.
    pub fn resolve(&mut self) -> Result<Vec<ItemInfo>> {
        self.ensure_loaded()?;
        let installed_groups = self.installed_groups()?;
        let sack = self.base.repo_sack()?;
        let pool = sack.pool();

        let mut goal = Goal::new(pool, sack.config());
        goal.set_installed_groups(installed_groups);
        for (job, settings) in &self.jobs {
            goal.add_job(job.clone(), settings.clone());
        }
        let transaction = goal.resolve()?;

        let items = transaction
            .items
            .iter()
            .map(|item| {
                let data = pool.data(item.package);
                ItemInfo {
                    action: item.action,
                    nevra: data.full_nevra(),
                    repo_id: pool.repo_of(item.package).id.clone(),
                    reason: item.reason,
                    download_size: data.download_size,
                    install_size: data.install_size,
                    replaces: item
                        .replaces
                        .iter()
                        .map(|id| pool.data(*id).full_nevra())
                        .collect(),
                }
            })
            .collect();
        self.resolved = Some(transaction);
        Ok(items)
    }

    /// The transaction produced by the last `resolve`
    pub fn transaction(&self) -> Option<&Transaction> {
        self.resolved.as_ref()
    }

    /// Apply the resolved transaction to the system state and return the
    /// changeset id. Packages are reloaded before the next request.
    pub fn do_transaction(
        &mut self,
        description: &str,
        events: Option<&Sender<TransactionEvent>>,
    ) -> Result<i64> {
        let Some(resolved) = self.resolved.take() else {
            return Err(Error::NotFoundError(
                "No resolved transaction to run".to_string(),
            ));
        };
        let mut conn = self.base.open_system_state()?;
        let changeset_id = transaction::apply(
            &mut conn,
            self.pool()?,
            &resolved,
            description,
            events,
        )?;

        self.jobs.clear();
        self.base.repo_sack_mut()?.reset();
        self.loaded = false;
        Ok(changeset_id)
    }
}

/// One request line
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub method: String,
    #[serde(default)]
    pub specs: Vec<String>,
    #[serde(default)]
    pub options: Value,
}

#[derive(Serialize)]
struct Signal<'a> {
    signal: &'static str,
    #[serde(flatten)]
    event: &'a TransactionEvent,
}

fn write_line(out: &mut impl Write, value: &impl Serialize) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    out.flush()
}

/// Apply the resolved transaction, writing progress signals to `out` from
/// a forwarding thread while it runs
fn run_transaction<W: Write + Send>(session: &mut Session, out: &mut W) -> Result<Value> {
    let (sender, receiver) = mpsc::channel();
    let (result, forwarded) = thread::scope(|scope| {
        let forwarder = scope.spawn(|| -> io::Result<()> {
            for event in receiver {
                write_line(
                    out,
                    &Signal {
                        signal: "transaction_progress",
                        event: &event,
                    },
                )?;
            }
            Ok(())
        });
        let result = session.do_transaction("daemon transaction", Some(&sender));
        drop(sender);
        let forwarded = forwarder
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("progress forwarder panicked")));
        (result, forwarded)
    });
    forwarded?;
    Ok(json!({ "changeset_id": result? }))
}

fn dispatch<W: Write + Send>(session: &mut Session, request: &Request, out: &mut W) -> Result<Value> {
    let specs = &request.specs;
    match request.method.as_str() {
        "list" => {
            let options: ListOptions = parse_options(&request.options)?;
            Ok(Value::from(session.list(specs, &options)?))
        }
        "resolve" => {
            let items = session.resolve()?;
            serde_json::to_value(items).map_err(|e| Error::ParseError(e.to_string()))
        }
        "do_transaction" => run_transaction(session, out),
        "reset" => {
            session.reset_goal();
            Ok(Value::Null)
        }
        method => {
            let settings: GoalSettings = parse_options(&request.options)?;
            match method {
                "install" => session.install(specs, &settings)?,
                "upgrade" => session.upgrade(specs, &settings),
                "remove" => session.remove(specs, &settings),
                "distro_sync" => session.distro_sync(specs, &settings),
                "downgrade" => session.downgrade(specs, &settings),
                "reinstall" => session.reinstall(specs, &settings),
                "group_install" => session.group_install(specs, &settings),
                "group_remove" => session.group_remove(specs, &settings),
                _ => {
                    return Err(Error::ArgumentParser(format!("Unknown method \"{}\"", method)));
                }
            }
            Ok(Value::Null)
        }
    }
}

/// Serve requests from `input` until it is exhausted. Each request gets
/// exactly one response line; a failing request does not end the session.
pub fn serve<R: BufRead, W: Write + Send>(session: &mut Session, input: R, out: &mut W) -> Result<()> {
    info!("Serving requests");
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                debug!("Request: {}", request.method);
                match dispatch(session, &request, out) {
                    Ok(result) => json!({ "method": request.method, "result": result }),
                    Err(e) => {
                        warn!("Request {} failed: {}", request.method, e);
                        json!({ "method": request.method, "error": e.to_string() })
                    }
                }
            }
            Err(e) => json!({ "error": format!("Malformed request: {}", e) }),
        };
        write_line(out, &response)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Priority;
    use crate::rpm::{PackageData, Reldep};
    use crate::sack::{PoolRepo, RepoKind, SYSTEM_REPO_ID};
    use crate::version::Evr;
    use std::path::Path;
    use tempfile::TempDir;

    fn pkg(name: &str, evr: &str) -> PackageData {
        PackageData::new(name, Evr::parse(evr).unwrap(), "x86_64")
    }

    /// A session over an empty installroot with packages added straight to
    /// the pool, so nothing is read from disk
    fn session(root: &Path) -> Session {
        let mut base = Base::new();
        base.config_mut()
            .set_by_name("installroot", &root.display().to_string(), Priority::Commandline)
            .unwrap();
        base.vars_mut().set_arch("x86_64", Priority::Commandline);
        base.setup().unwrap();

        let pool = base.repo_sack_mut().unwrap().pool_mut();
        let system = pool.add_repo(PoolRepo::new(SYSTEM_REPO_ID, RepoKind::System));
        let fedora = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        pool.add_installed(system, pkg("bash", "5.2.26-1"), Reason::User, None);
        let mut bash = pkg("bash", "5.2.37-1");
        bash.download_size = 2048;
        pool.add_package(fedora, bash);
        let mut vim = pkg("vim", "9.1-1");
        vim.requires.push(Reldep::new("vim-common"));
        vim.files = vec!["/usr/bin/vim".into()];
        pool.add_package(fedora, vim);
        pool.add_package(fedora, pkg("vim-common", "9.1-1"));

        Session::new(base).unwrap()
    }

    fn nevras(list: &[Map<String, Value>]) -> Vec<&str> {
        list.iter().filter_map(|m| m["nevra"].as_str()).collect()
    }

    #[test]
    fn test_session_requires_setup() {
        assert!(matches!(Session::new(Base::new()), Err(Error::InitError(_))));
    }

    #[test]
    fn test_list_scopes_and_attrs() {
        let root = TempDir::new().unwrap();
        let mut session = session(root.path());

        let all = session.list(&[], &ListOptions::default()).unwrap();
        assert_eq!(
            nevras(&all),
            vec![
                "bash-5.2.26-1.x86_64",
                "bash-5.2.37-1.x86_64",
                "vim-9.1-1.x86_64",
                "vim-common-9.1-1.x86_64",
            ]
        );

        let upgrades = ListOptions {
            scope: Scope::Upgrades,
            package_attrs: vec!["name".into(), "download_size".into(), "is_installed".into()],
            ..Default::default()
        };
        let list = session.list(&[], &upgrades).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], json!("bash"));
        assert_eq!(list[0]["download_size"], json!(2048));
        assert_eq!(list[0]["is_installed"], json!(false));

        let by_file = session
            .list(&["/usr/bin/vim".into()], &ListOptions::default())
            .unwrap();
        assert_eq!(nevras(&by_file), vec!["vim-9.1-1.x86_64"]);

        let requires = ListOptions {
            package_attrs: vec!["requires".into()],
            ..Default::default()
        };
        let list = session.list(&["VIM".into()], &requires).unwrap();
        assert_eq!(list[0]["requires"], json!(["vim-common"]));

        let bad = ListOptions {
            package_attrs: vec!["colour".into()],
            ..Default::default()
        };
        assert!(matches!(
            session.list(&[], &bad),
            Err(Error::ArgumentParser(_))
        ));
    }

    #[test]
    fn test_resolve_and_do_transaction() {
        let root = TempDir::new().unwrap();
        let mut session = session(root.path());
        session.install(&["vim".into()], &GoalSettings::default()).unwrap();
        session.upgrade(&[], &GoalSettings::default());

        let items = session.resolve().unwrap();
        let summary: Vec<(ItemAction, &str)> =
            items.iter().map(|i| (i.action, i.nevra.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ItemAction::Install, "vim-0:9.1-1.x86_64"),
                (ItemAction::Install, "vim-common-0:9.1-1.x86_64"),
                (ItemAction::Upgrade, "bash-0:5.2.37-1.x86_64"),
            ]
        );
        assert_eq!(items[1].reason, Reason::Dependency);
        assert_eq!(items[2].replaces, vec!["bash-0:5.2.26-1.x86_64"]);

        let (sender, receiver) = mpsc::channel();
        let id = session.do_transaction("test", Some(&sender)).unwrap();
        drop(sender);
        assert!(id > 0);
        assert_eq!(receiver.iter().count(), 5);
        assert!(session.transaction().is_none());
        assert!(matches!(
            session.do_transaction("again", None),
            Err(Error::NotFoundError(_))
        ));

        // the pool is reloaded from the system state
        let installed = ListOptions {
            scope: Scope::Installed,
            ..Default::default()
        };
        assert_eq!(
            nevras(&session.list(&[], &installed).unwrap()),
            vec![
                "bash-5.2.37-1.x86_64",
                "vim-9.1-1.x86_64",
                "vim-common-9.1-1.x86_64",
            ]
        );
    }

    #[test]
    fn test_serve_json_lines() {
        let root = TempDir::new().unwrap();
        let mut session = session(root.path());
        let input = [
            r#"{"method": "list", "specs": ["vim*"], "options": {"package_attrs": ["name"]}}"#,
            r#"{"method": "remove", "specs": ["bash"]}"#,
            r#"{"method": "resolve"}"#,
            r#"{"method": "do_transaction"}"#,
            r#"{"method": "frobnicate"}"#,
            "not json",
        ]
        .join("\n");

        let mut out = Vec::new();
        serve(&mut session, input.as_bytes(), &mut out).unwrap();
        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(
            lines[0]["result"],
            json!([{"name": "vim"}, {"name": "vim-common"}])
        );
        assert_eq!(lines[1], json!({"method": "remove", "result": null}));
        assert_eq!(lines[2]["result"][0]["action"], json!("remove"));
        assert_eq!(lines[3]["signal"], json!("transaction_progress"));
        assert_eq!(lines[3]["event"], json!("started"));
        assert_eq!(lines[4]["event"], json!("item"));
        assert_eq!(lines[5]["event"], json!("finished"));
        assert!(lines[6]["result"]["changeset_id"].is_i64());
        assert!(lines[7]["error"].as_str().unwrap().contains("Unknown method"));
        assert!(lines[8]["error"].as_str().unwrap().starts_with("Malformed request"));
        assert_eq!(lines.len(), 9);
    }
}
