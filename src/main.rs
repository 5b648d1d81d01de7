// src/main.rs

use anyhow::{Result, anyhow, bail};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use rsdnf::Base;
use rsdnf::advisory::AdvisoryFilter;
use rsdnf::config::Priority;
use rsdnf::db::models::{Changeset, ChangesetItem, InstalledGroup, ItemAction, Reason};
use rsdnf::goal::{GoalSettings, Transaction, TransactionItem};
use rsdnf::output::{self, PackageInfoSections};
use rsdnf::repoquery::{self, RepoqueryOptions};
use rsdnf::repository::Repo;
use rsdnf::sack::{ExcludeFlags, PackageId, PackageQuery, Pool, QueryCmp, ResolveSpecSettings, match_string};
use rsdnf::service::{self, Session};
use rsdnf::transaction::{self, TransactionEvent};
use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rsdnf")]
#[command(author, version, about = "RPM package manager", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct GlobalArgs {
    /// Configuration file location
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    config: Option<String>,

    /// Operate on an alternative root directory
    #[arg(long, global = true, value_name = "PATH")]
    installroot: Option<String>,

    /// Override the value of $releasever
    #[arg(long, global = true, value_name = "RELEASEVER")]
    releasever: Option<String>,

    /// Override a configuration option; REPO_ID.KEY=VALUE sets a repository option
    #[arg(long, global = true, value_name = "KEY=VALUE")]
    setopt: Vec<String>,

    /// Enable only the given repositories
    #[arg(long, global = true, value_delimiter = ',', value_name = "REPO_ID")]
    repo: Vec<String>,

    /// Enable additional repositories
    #[arg(long, global = true, value_delimiter = ',', value_name = "REPO_ID")]
    enablerepo: Vec<String>,

    /// Disable repositories
    #[arg(long, global = true, value_delimiter = ',', value_name = "REPO_ID")]
    disablerepo: Vec<String>,

    /// Create a repository from a directory or URL
    #[arg(long, global = true, value_name = "REPO_ID,REPO_PATH")]
    repofrompath: Vec<String>,

    /// Read configuration from the host even with --installroot
    #[arg(long, global = true)]
    use_host_config: bool,

    /// Use a different architecture
    #[arg(long, global = true, value_name = "ARCH")]
    forcearch: Option<String>,

    /// Answer yes to all questions
    #[arg(short = 'y', long, global = true)]
    assumeyes: bool,

    /// Expire repository metadata before loading it
    #[arg(long, global = true)]
    refresh: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for packages matching various criteria
    Repoquery(RepoqueryArgs),
    /// List installed and available packages
    List(ListArgs),
    /// Show details about installed and available packages
    Info(ListArgs),
    /// List configured repositories
    Repolist {
        /// Show enabled and disabled repositories
        #[arg(long, conflicts_with = "disabled")]
        all: bool,
        /// Show disabled repositories only
        #[arg(long)]
        disabled: bool,
    },
    /// Download and cache metadata of enabled repositories
    Makecache,
    /// Install packages
    Install {
        #[arg(required = true)]
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Remove packages
    Remove {
        #[arg(required = true)]
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Upgrade packages, or the whole system without arguments
    Upgrade {
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Downgrade packages
    Downgrade {
        #[arg(required = true)]
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Reinstall packages
    Reinstall {
        #[arg(required = true)]
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Synchronize installed packages to the latest available versions
    DistroSync {
        specs: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Manage comps groups
    Group {
        #[command(subcommand)]
        command: GroupCommands,
    },
    /// Change the reason of installed packages
    Mark {
        reason: MarkReason,
        #[arg(required = true)]
        specs: Vec<String>,
    },
    /// Show transaction history, or one transaction in detail
    History {
        /// Transaction ID
        id: Option<i64>,
    },
    /// Serve JSON requests on stdin
    Daemon,
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum GroupCommands {
    /// List groups
    List {
        /// Group id or name globs
        groups: Vec<String>,
        /// Show installed groups only
        #[arg(long, conflicts_with = "available")]
        installed: bool,
        /// Show groups not installed only
        #[arg(long)]
        available: bool,
        /// Show groups hidden from users too
        #[arg(long)]
        hidden: bool,
    },
    /// Show group details
    Info {
        #[arg(required = true)]
        groups: Vec<String>,
    },
    /// Install groups
    Install {
        #[arg(required = true)]
        groups: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
    /// Remove groups
    Remove {
        #[arg(required = true)]
        groups: Vec<String>,
        #[command(flatten)]
        job: JobArgs,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct JobArgs {
    /// Skip packages that cannot be found
    #[arg(long)]
    skip_unavailable: bool,

    /// Allow removing installed packages to resolve problems
    #[arg(long)]
    allowerasing: bool,

    /// Take candidates from these repositories only
    #[arg(long, value_delimiter = ',', value_name = "REPO_ID")]
    from_repo: Vec<String>,
}

impl JobArgs {
    fn settings(&self) -> GoalSettings {
        GoalSettings {
            skip_unavailable: self.skip_unavailable,
            allow_erasing: self.allowerasing,
            repo_ids: self.from_repo.clone(),
        }
    }
}

#[derive(Args, Debug, Default)]
struct ListArgs {
    /// Package specs
    specs: Vec<String>,

    /// Installed packages only
    #[arg(long, conflicts_with_all = ["available", "upgrades"])]
    installed: bool,

    /// Available packages only
    #[arg(long, conflicts_with = "upgrades")]
    available: bool,

    /// Available upgrades only
    #[arg(long)]
    upgrades: bool,

    /// Show every available version, not just the latest
    #[arg(long)]
    showduplicates: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MarkReason {
    User,
    Dependency,
    WeakDependency,
    Group,
}

impl From<MarkReason> for Reason {
    fn from(reason: MarkReason) -> Self {
        match reason {
            MarkReason::User => Reason::User,
            MarkReason::Dependency => Reason::Dependency,
            MarkReason::WeakDependency => Reason::WeakDependency,
            MarkReason::Group => Reason::Group,
        }
    }
}

#[derive(Args, Debug, Default)]
struct RepoqueryArgs {
    /// Package specs: NEVRA globs, provides, file paths or .rpm files
    specs: Vec<String>,

    /// Query available packages (default unless an installed filter is given)
    #[arg(long)]
    available: bool,
    /// Query installed packages
    #[arg(long)]
    installed: bool,

    /// Installed packages nothing else installed requires
    #[arg(long)]
    leaves: bool,
    /// Packages installed on user request
    #[arg(long)]
    userinstalled: bool,
    /// Installed packages with more than one version installed
    #[arg(long)]
    duplicates: bool,
    /// Installed packages no longer needed
    #[arg(long)]
    unneeded: bool,
    /// Installed installonly packages
    #[arg(long)]
    installonly: bool,
    /// Installed packages not available in any repository
    #[arg(long)]
    extras: bool,
    /// Available upgrades of installed packages
    #[arg(long)]
    upgrades: bool,

    /// Packages fixed by these advisories
    #[arg(long = "advisories", value_delimiter = ',', value_name = "ADVISORY_NAME")]
    advisory_names: Vec<String>,
    /// Packages fixed by security advisories
    #[arg(long)]
    security: bool,
    /// Packages fixed by bugfix advisories
    #[arg(long)]
    bugfix: bool,
    /// Packages fixed by enhancement advisories
    #[arg(long)]
    enhancement: bool,
    /// Packages fixed by newpackage advisories
    #[arg(long)]
    newpackage: bool,
    /// Packages fixed by advisories of these severities
    #[arg(
        long,
        value_delimiter = ',',
        value_name = "SEVERITY",
        value_parser = ["critical", "important", "moderate", "low", "none"]
    )]
    advisory_severities: Vec<String>,
    /// Packages fixing these Bugzilla ids
    #[arg(long, value_delimiter = ',', value_name = "BUGZILLA_ID")]
    bzs: Vec<String>,
    /// Packages fixing these CVEs
    #[arg(long, value_delimiter = ',', value_name = "CVE_ID")]
    cves: Vec<String>,

    /// Latest N versions per name.arch (negative: all but the latest N)
    #[arg(long, value_name = "N", default_value_t = 0, allow_negative_numbers = true)]
    latest_limit: i32,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatdepends: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatconflicts: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatenhances: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatobsoletes: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatprovides: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatrecommends: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatrequires: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatsupplements: Vec<String>,
    #[arg(long, value_delimiter = ',', value_name = "CAPABILITY")]
    whatsuggests: Vec<String>,
    /// Limit to these architectures
    #[arg(long, value_delimiter = ',', value_name = "ARCH")]
    arch: Vec<String>,
    /// Packages owning these files
    #[arg(long, value_delimiter = ',', value_name = "FILE")]
    file: Vec<String>,
    /// Match --whatrequires/--whatdepends capabilities exactly
    #[arg(long)]
    exactdeps: bool,
    /// Packages built recently
    #[arg(long)]
    recent: bool,

    /// Show the source packages of the result
    #[arg(long)]
    srpm: bool,

    /// Show detailed package information
    #[arg(long)]
    info: bool,
    /// List the tags usable in --queryformat
    #[arg(long)]
    querytags: bool,
    /// Show package changelogs
    #[arg(long)]
    changelogs: bool,
    /// Output format, e.g. "%{name}-%{version}\n"
    #[arg(long, value_name = "FORMAT")]
    queryformat: Option<String>,

    #[arg(long, group = "pkg_attr")]
    conflicts: bool,
    #[arg(long, group = "pkg_attr")]
    depends: bool,
    #[arg(long, group = "pkg_attr")]
    enhances: bool,
    #[arg(long, group = "pkg_attr")]
    obsoletes: bool,
    #[arg(long, group = "pkg_attr")]
    provides: bool,
    #[arg(long, group = "pkg_attr")]
    recommends: bool,
    #[arg(long, group = "pkg_attr")]
    requires: bool,
    #[arg(long, group = "pkg_attr")]
    requires_pre: bool,
    #[arg(long, group = "pkg_attr")]
    suggests: bool,
    #[arg(long, group = "pkg_attr")]
    supplements: bool,
    #[arg(long, group = "pkg_attr")]
    files: bool,
    #[arg(long, group = "pkg_attr")]
    sourcerpm: bool,
    #[arg(long, group = "pkg_attr")]
    location: bool,
}

impl RepoqueryArgs {
    fn into_options(self) -> RepoqueryOptions {
        let switches = [
            ("conflicts", self.conflicts),
            ("depends", self.depends),
            ("enhances", self.enhances),
            ("obsoletes", self.obsoletes),
            ("provides", self.provides),
            ("recommends", self.recommends),
            ("requires", self.requires),
            ("requires_pre", self.requires_pre),
            ("suggests", self.suggests),
            ("supplements", self.supplements),
            ("files", self.files),
            ("sourcerpm", self.sourcerpm),
            ("location", self.location),
        ];
        let pkg_attr = switches
            .iter()
            .find(|(_, set)| *set)
            .map(|(name, _)| name.to_string());

        RepoqueryOptions {
            specs: self.specs,
            available: self.available,
            installed: self.installed,
            leaves: self.leaves,
            userinstalled: self.userinstalled,
            duplicates: self.duplicates,
            unneeded: self.unneeded,
            installonly: self.installonly,
            extras: self.extras,
            upgrades: self.upgrades,
            advisories: AdvisoryFilter {
                names: self.advisory_names,
                security: self.security,
                bugfix: self.bugfix,
                enhancement: self.enhancement,
                newpackage: self.newpackage,
                severities: self.advisory_severities,
                bzs: self.bzs,
                cves: self.cves,
            },
            latest_limit: self.latest_limit,
            whatdepends: self.whatdepends,
            whatconflicts: self.whatconflicts,
            whatenhances: self.whatenhances,
            whatobsoletes: self.whatobsoletes,
            whatprovides: self.whatprovides,
            whatrecommends: self.whatrecommends,
            whatrequires: self.whatrequires,
            whatsupplements: self.whatsupplements,
            whatsuggests: self.whatsuggests,
            arch: self.arch,
            file: self.file,
            exactdeps: self.exactdeps,
            recent: self.recent,
            srpm: self.srpm,
            info: self.info,
            querytags: self.querytags,
            changelogs: self.changelogs,
            queryformat: self.queryformat,
            pkg_attr,
        }
    }
}

/// Split `--setopt` into an optional repository pattern, the key and the value
fn parse_setopt(setopt: &str) -> Result<(Option<&str>, &str, &str)> {
    let (key, value) = setopt
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid --setopt \"{}\": expected KEY=VALUE", setopt))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid --setopt \"{}\": empty key", setopt);
    }
    Ok(match key.rsplit_once('.') {
        Some((repo, key)) => (Some(repo), key, value),
        None => (None, key, value),
    })
}

fn parse_repofrompath(value: &str) -> Result<(String, String)> {
    match value.split_once(',') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), path.to_string()))
        }
        _ => bail!("Invalid --repofrompath \"{}\": expected REPO_ID,REPO_PATH", value),
    }
}

/// Build a set up `Base` with its repositories configured from the system
/// and the global command-line options
fn setup_base(args: &GlobalArgs) -> Result<Base> {
    let mut base = Base::new();

    let mut repo_setopts = Vec::new();
    {
        let config = base.config_mut();
        if let Some(path) = &args.config {
            config.config_file_path.set(Priority::Commandline, path.clone())?;
        }
        if let Some(root) = &args.installroot {
            config.installroot.set(Priority::Commandline, root.clone())?;
        }
        if args.use_host_config {
            config.use_host_config.set(Priority::Commandline, true)?;
        }
        if args.assumeyes {
            config.assumeyes.set(Priority::Commandline, true)?;
        }
        for setopt in &args.setopt {
            match parse_setopt(setopt)? {
                (Some(repo), key, value) => repo_setopts.push((repo, key, value)),
                (None, key, value) => config.set_by_name(key, value, Priority::Commandline)?,
            }
        }
    }
    if let Some(arch) = &args.forcearch {
        base.vars_mut().set_arch(arch, Priority::Commandline);
    }
    if let Some(releasever) = &args.releasever {
        base.vars_mut()
            .set("releasever", releasever.clone(), Priority::Commandline);
    }

    base.load_config()?;
    base.setup()?;

    let sack = base.repo_sack_mut()?;
    sack.create_repos_from_system_configuration()?;
    let paths = args
        .repofrompath
        .iter()
        .map(|value| parse_repofrompath(value))
        .collect::<Result<Vec<_>>>()?;
    if !paths.is_empty() {
        sack.create_repos_from_paths(&paths, Priority::Commandline)?;
    }

    for (pattern, key, value) in repo_setopts {
        let ids: Vec<String> = sack
            .matching_repos(&[pattern])
            .iter()
            .map(|repo| repo.id().to_string())
            .collect();
        if ids.is_empty() {
            bail!("No repository matches \"{}\" in --setopt", pattern);
        }
        for id in ids {
            if let Some(repo) = sack.repo_mut(&id) {
                repo.config_mut().set_by_name(key, value, Priority::Commandline)?;
            }
        }
    }

    if !args.repo.is_empty() {
        if !sack.repos().is_empty() {
            sack.disable_repos(&["*"])?;
        }
        sack.enable_repos(&args.repo)?;
    }
    if !args.enablerepo.is_empty() {
        sack.enable_repos(&args.enablerepo)?;
    }
    if !args.disablerepo.is_empty() {
        sack.disable_repos(&args.disablerepo)?;
    }
    if args.refresh {
        sack.expire_all();
    }

    debug!(
        "Enabled repositories: {:?}",
        sack.repos()
            .iter()
            .filter(|r| r.is_enabled())
            .map(|r| r.id())
            .collect::<Vec<_>>()
    );
    Ok(base)
}

/// The command line as recorded in the transaction history
fn command_line() -> String {
    std::env::args().skip(1).collect::<Vec<_>>().join(" ")
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Union of the packages matching `specs` by NEVRA, or every package when
/// there are no specs
fn match_specs<'a>(pool: &'a Pool, specs: &[String]) -> PackageQuery<'a> {
    let base = PackageQuery::new(pool, ExcludeFlags::ApplyExcludes);
    if specs.is_empty() {
        return base;
    }
    let settings = ResolveSpecSettings {
        ignore_case: true,
        with_provides: false,
        with_filenames: false,
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
}

fn cmd_repoquery(global: &GlobalArgs, args: RepoqueryArgs) -> Result<()> {
    let options = args.into_options();
    options.validate()?;

    let mut base = setup_base(global)?;
    let sack = base.repo_sack_mut()?;
    let plan = options.configure(sack)?;
    let cmdline = repoquery::load(sack, &options, plan)?;

    let recent_days = *sack.config().recent.get();
    let result = repoquery::query(
        sack.pool(),
        &options,
        plan,
        &cmdline,
        chrono::Utc::now().timestamp(),
        recent_days,
    );
    info!("Repoquery matched {} packages", result.len());
    repoquery::print(&mut io::stdout().lock(), &result, &options)?;
    Ok(())
}

fn cmd_list(global: &GlobalArgs, args: ListArgs, detailed: bool) -> Result<()> {
    let mut base = setup_base(global)?;
    let sack = base.repo_sack_mut()?;
    sack.update_and_load_enabled_repos(true)?;
    let pool = sack.pool();
    let matching = match_specs(pool, &args.specs);

    let mut installed = matching.clone();
    installed.filter_installed();
    let installed_nevras: HashSet<String> = installed.iter().map(|p| p.nevra()).collect();

    let mut sections = PackageInfoSections::new();
    if !args.available && !args.upgrades {
        sections.add_section("Installed packages", &installed);
    }
    if !args.installed && !args.upgrades {
        let mut available = matching.clone();
        available.filter_available();
        if !args.showduplicates {
            available.filter_priority();
            available.filter_latest_evr(1);
        }
        let already: Vec<PackageId> = available
            .iter()
            .filter(|p| installed_nevras.contains(&p.nevra()))
            .map(|p| p.id())
            .collect();
        for id in already {
            available.remove(id);
        }
        sections.add_section("Available packages", &available);
    }
    if args.upgrades {
        let mut upgrades = matching;
        upgrades.filter_upgrades();
        upgrades.filter_latest_evr(1);
        sections.add_section("Available upgrades", &upgrades);
    }

    if sections.is_empty() {
        bail!("No matching packages to list");
    }
    let mut out = io::stdout().lock();
    if detailed {
        sections.print_info(&mut out, output::term_width())?;
    } else {
        sections.print_list(&mut out)?;
    }
    Ok(())
}

fn cmd_repolist(global: &GlobalArgs, all: bool, disabled: bool) -> Result<()> {
    let base = setup_base(global)?;
    let sack = base.repo_sack()?;
    let repos: Vec<&Repo> = sack
        .repos()
        .iter()
        .filter(|repo| all || repo.is_enabled() != disabled)
        .collect();
    if repos.is_empty() {
        println!("No repositories available");
        return Ok(());
    }
    output::print_repolist(&mut io::stdout().lock(), &repos, all, output::term_width())?;
    Ok(())
}

fn cmd_makecache(global: &GlobalArgs) -> Result<()> {
    let mut base = setup_base(global)?;
    base.repo_sack_mut()?.update_and_load_enabled_repos(false)?;
    println!("Metadata cache created.");
    Ok(())
}

/// Apply the resolved transaction of `session`, printing progress lines
/// as items are recorded
fn apply_with_progress(session: &mut Session, description: &str) -> Result<i64> {
    let (sender, receiver) = mpsc::channel();
    let changeset_id = thread::scope(|scope| {
        scope.spawn(move || {
            for event in receiver {
                if let TransactionEvent::Item {
                    nevra,
                    action,
                    current,
                    total,
                } = event
                {
                    println!("[{}/{}] {:<11} {}", current, total, action.as_str(), nevra);
                }
            }
        });
        let result = session.do_transaction(description, Some(&sender));
        drop(sender);
        result
    })?;
    Ok(changeset_id)
}

/// Queue jobs with `queue`, resolve, show the transaction and apply it
/// once confirmed
fn run_goal<F>(global: &GlobalArgs, queue: F) -> Result<()>
where
    F: FnOnce(&mut Session) -> rsdnf::Result<()>,
{
    let base = setup_base(global)?;
    let assumeyes = *base.config().assumeyes.get();
    let mut session = Session::new(base)?;
    queue(&mut session)?;
    session.resolve()?;

    {
        let pool = session.pool()?;
        let Some(transaction) = session.transaction() else {
            return Ok(());
        };
        output::print_transaction_table(
            &mut io::stdout().lock(),
            pool,
            transaction,
            output::term_width(),
        )?;
        if transaction.is_empty() {
            return Ok(());
        }
    }

    if !assumeyes && !confirm("Is this ok [y/N]: ")? {
        println!("Operation aborted.");
        return Ok(());
    }
    let changeset_id = apply_with_progress(&mut session, &command_line())?;
    info!("Transaction {} complete", changeset_id);
    println!("Complete!");
    Ok(())
}

fn installed_groups(base: &Base) -> Result<Vec<InstalledGroup>> {
    if !base.system_state_path().exists() {
        return Ok(Vec::new());
    }
    let conn = base.open_system_state()?;
    Ok(InstalledGroup::list_all(&conn)?)
}

fn group_matches(id: &str, name: &str, patterns: &[String]) -> bool {
    patterns.is_empty()
        || patterns.iter().any(|p| {
            match_string(id, p, QueryCmp::Glob) || match_string(name, p, QueryCmp::IGlob)
        })
}

fn cmd_group(global: &GlobalArgs, command: GroupCommands) -> Result<()> {
    let (patterns, list_filter) = match command {
        GroupCommands::Install { groups, job } => {
            let settings = job.settings();
            return run_goal(global, |session| {
                session.group_install(&groups, &settings);
                Ok(())
            });
        }
        GroupCommands::Remove { groups, job } => {
            let settings = job.settings();
            return run_goal(global, |session| {
                session.group_remove(&groups, &settings);
                Ok(())
            });
        }
        GroupCommands::List {
            groups,
            installed,
            available,
            hidden,
        } => (groups, Some((installed, available, hidden))),
        GroupCommands::Info { groups } => (groups, None),
    };

    let mut base = setup_base(global)?;
    base.repo_sack_mut()?.update_and_load_enabled_repos(false)?;
    let installed: HashSet<String> = installed_groups(&base)?
        .into_iter()
        .map(|g| g.group_id)
        .collect();
    let mut groups = base.repo_sack()?.pool().merged_groups();
    groups.retain(|g| group_matches(&g.id, &g.name, &patterns));
    groups.sort_by(|a, b| a.id.cmp(&b.id));

    let mut out = io::stdout().lock();
    match list_filter {
        Some((only_installed, only_available, hidden)) => {
            let rows: Vec<_> = groups
                .iter()
                .map(|g| (g, installed.contains(&g.id)))
                .filter(|(g, is_installed)| {
                    (hidden || g.uservisible || !patterns.is_empty())
                        && (!only_installed || *is_installed)
                        && (!only_available || !*is_installed)
                })
                .collect();
            if rows.is_empty() {
                println!("No matching groups");
                return Ok(());
            }
            output::print_group_list(&mut out, &rows, output::term_width())?;
        }
        None => {
            if groups.is_empty() {
                bail!("No match for group: {}", patterns.join(", "));
            }
            for (index, group) in groups.iter().enumerate() {
                if index > 0 {
                    writeln!(out)?;
                }
                output::print_group_info(&mut out, group, installed.contains(&group.id))?;
            }
        }
    }
    Ok(())
}

fn cmd_mark(global: &GlobalArgs, reason: MarkReason, specs: &[String]) -> Result<()> {
    let reason = Reason::from(reason);
    let mut base = setup_base(global)?;
    base.repo_sack_mut()?.load_system_repo()?;
    let pool = base.repo_sack()?.pool();

    let mut installed = PackageQuery::new(pool, ExcludeFlags::IgnoreExcludes);
    installed.filter_installed();
    let settings = ResolveSpecSettings {
        with_binaries: false,
        ..Default::default()
    };

    let mut items = Vec::new();
    for spec in specs {
        let mut matched = installed.clone();
        matched.resolve_pkg_spec(spec, &settings);
        if matched.is_empty() {
            bail!("No match for argument: {}", spec);
        }
        for pkg in matched.sorted() {
            if pkg.reason() != reason && !items.iter().any(|i: &TransactionItem| i.package == pkg.id()) {
                items.push(TransactionItem {
                    package: pkg.id(),
                    action: ItemAction::ReasonChange,
                    reason,
                    replaces: Vec::new(),
                });
            }
        }
    }
    let transaction = Transaction {
        items,
        ..Default::default()
    };

    output::print_transaction_table(
        &mut io::stdout().lock(),
        pool,
        &transaction,
        output::term_width(),
    )?;
    if transaction.is_empty() {
        return Ok(());
    }
    let mut conn = base.open_system_state()?;
    transaction::apply(&mut conn, pool, &transaction, &command_line(), None)?;
    println!("Complete!");
    Ok(())
}

fn cmd_history(global: &GlobalArgs, id: Option<i64>) -> Result<()> {
    let base = setup_base(global)?;
    let mut out = io::stdout().lock();
    if !base.system_state_path().exists() {
        writeln!(out, "No transactions recorded.")?;
        return Ok(());
    }
    let conn = base.open_system_state()?;
    match id {
        None => {
            let changesets = Changeset::list_all(&conn)?;
            output::print_history(&mut out, &changesets, output::term_width())?;
        }
        Some(id) => {
            let changeset = Changeset::find_by_id(&conn, id)?
                .ok_or_else(|| anyhow!("Transaction {} not found", id))?;
            let items = ChangesetItem::find_by_changeset(&conn, id)?;
            output::print_history_info(&mut out, &changeset, &items, output::term_width())?;
        }
    }
    Ok(())
}

fn cmd_daemon(global: &GlobalArgs) -> Result<()> {
    let base = setup_base(global)?;
    let mut session = Session::new(base)?;
    info!("Serving requests on stdin");
    service::serve(&mut session, io::stdin().lock(), &mut io::stdout())?;
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);
    let global = &cli.global;

    match cli.command {
        Commands::Repoquery(args) => cmd_repoquery(global, args),
        Commands::List(args) => cmd_list(global, args, false),
        Commands::Info(args) => cmd_list(global, args, true),
        Commands::Repolist { all, disabled } => cmd_repolist(global, all, disabled),
        Commands::Makecache => cmd_makecache(global),
        Commands::Install { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| session.install(&specs, &settings))
        }
        Commands::Remove { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| {
                session.remove(&specs, &settings);
                Ok(())
            })
        }
        Commands::Upgrade { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| {
                session.upgrade(&specs, &settings);
                Ok(())
            })
        }
        Commands::Downgrade { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| {
                session.downgrade(&specs, &settings);
                Ok(())
            })
        }
        Commands::Reinstall { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| {
                session.reinstall(&specs, &settings);
                Ok(())
            })
        }
        Commands::DistroSync { specs, job } => {
            let settings = job.settings();
            run_goal(global, |session| {
                session.distro_sync(&specs, &settings);
                Ok(())
            })
        }
        Commands::Group { command } => cmd_group(global, command),
        Commands::Mark { reason, specs } => cmd_mark(global, reason, &specs),
        Commands::History { id } => cmd_history(global, id),
        Commands::Daemon => cmd_daemon(global),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "rsdnf", &mut io::stdout());
            Ok(())
        }
    }
}
