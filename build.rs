// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn specs(help: &'static str) -> Arg {
    Arg::new("specs").num_args(1..).help(help)
}

fn job_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("skip_unavailable")
            .long("skip-unavailable")
            .action(ArgAction::SetTrue)
            .help("Skip packages that cannot be found"),
    )
    .arg(
        Arg::new("allowerasing")
            .long("allowerasing")
            .action(ArgAction::SetTrue)
            .help("Allow removing installed packages to resolve problems"),
    )
    .arg(
        Arg::new("from_repo")
            .long("from-repo")
            .value_name("REPO_ID")
            .help("Take candidates from these repositories only"),
    )
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("rsdnf")
        .version(env!("CARGO_PKG_VERSION"))
        .about("RPM package manager")
        .subcommand_required(true)
        .arg(Arg::new("config").short('c').long("config").value_name("PATH").help("Configuration file location"))
        .arg(Arg::new("installroot").long("installroot").value_name("PATH").help("Operate on an alternative root directory"))
        .arg(Arg::new("releasever").long("releasever").value_name("RELEASEVER").help("Override the value of $releasever"))
        .arg(
            Arg::new("setopt")
                .long("setopt")
                .value_name("KEY=VALUE")
                .action(ArgAction::Append)
                .help("Override a configuration option; REPO_ID.KEY=VALUE sets a repository option"),
        )
        .arg(Arg::new("repo").long("repo").value_name("REPO_ID").help("Enable only the given repositories"))
        .arg(Arg::new("enablerepo").long("enablerepo").value_name("REPO_ID").help("Enable additional repositories"))
        .arg(Arg::new("disablerepo").long("disablerepo").value_name("REPO_ID").help("Disable repositories"))
        .arg(
            Arg::new("repofrompath")
                .long("repofrompath")
                .value_name("REPO_ID,REPO_PATH")
                .action(ArgAction::Append)
                .help("Create a repository from a directory or URL"),
        )
        .arg(flag("use-host-config", "Read configuration from the host even with --installroot"))
        .arg(Arg::new("forcearch").long("forcearch").value_name("ARCH").help("Use a different architecture"))
        .arg(flag("assumeyes", "Answer yes to all questions").short('y'))
        .arg(flag("refresh", "Expire repository metadata before loading it"))
        .arg(flag("verbose", "Log progress to stderr").short('v'))
        .subcommand(
            Command::new("repoquery")
                .about("Search for packages matching various criteria")
                .arg(specs("Package specs: NEVRA globs, provides, file paths or .rpm files"))
                .arg(flag("available", "Query available packages"))
                .arg(flag("installed", "Query installed packages"))
                .arg(flag("leaves", "Installed packages nothing else installed requires"))
                .arg(flag("userinstalled", "Packages installed on user request"))
                .arg(flag("duplicates", "Installed packages with more than one version installed"))
                .arg(flag("unneeded", "Installed packages no longer needed"))
                .arg(flag("installonly", "Installed installonly packages"))
                .arg(flag("extras", "Installed packages not available in any repository"))
                .arg(flag("upgrades", "Available upgrades of installed packages"))
                .arg(Arg::new("advisories").long("advisories").value_name("ADVISORY_NAME").help("Packages fixed by these advisories"))
                .arg(flag("security", "Packages fixed by security advisories"))
                .arg(flag("bugfix", "Packages fixed by bugfix advisories"))
                .arg(flag("enhancement", "Packages fixed by enhancement advisories"))
                .arg(flag("newpackage", "Packages fixed by newpackage advisories"))
                .arg(
                    Arg::new("advisory-severities")
                        .long("advisory-severities")
                        .value_name("SEVERITY")
                        .value_parser(["critical", "important", "moderate", "low", "none"])
                        .help("Packages fixed by advisories of these severities"),
                )
                .arg(Arg::new("bzs").long("bzs").value_name("BUGZILLA_ID").help("Packages fixing these Bugzilla ids"))
                .arg(Arg::new("cves").long("cves").value_name("CVE_ID").help("Packages fixing these CVEs"))
                .arg(Arg::new("latest-limit").long("latest-limit").value_name("N").help("Latest N versions per name.arch"))
                .arg(Arg::new("whatprovides").long("whatprovides").value_name("CAPABILITY").help("Packages providing a capability"))
                .arg(Arg::new("whatrequires").long("whatrequires").value_name("CAPABILITY").help("Packages requiring a capability"))
                .arg(Arg::new("whatdepends").long("whatdepends").value_name("CAPABILITY").help("Packages depending on a capability"))
                .arg(Arg::new("whatconflicts").long("whatconflicts").value_name("CAPABILITY").help("Packages conflicting with a capability"))
                .arg(Arg::new("whatenhances").long("whatenhances").value_name("CAPABILITY").help("Packages enhancing a capability"))
                .arg(Arg::new("whatobsoletes").long("whatobsoletes").value_name("CAPABILITY").help("Packages obsoleting a capability"))
                .arg(Arg::new("whatrecommends").long("whatrecommends").value_name("CAPABILITY").help("Packages recommending a capability"))
                .arg(Arg::new("whatsupplements").long("whatsupplements").value_name("CAPABILITY").help("Packages supplementing a capability"))
                .arg(Arg::new("whatsuggests").long("whatsuggests").value_name("CAPABILITY").help("Packages suggesting a capability"))
                .arg(Arg::new("file").long("file").value_name("FILE").help("Packages owning these files"))
                .arg(Arg::new("arch").long("arch").value_name("ARCH").help("Limit to these architectures"))
                .arg(flag("exactdeps", "Match capabilities exactly"))
                .arg(flag("recent", "Packages built recently"))
                .arg(flag("srpm", "Show the source packages of the result"))
                .arg(flag("info", "Show detailed package information"))
                .arg(flag("querytags", "List the tags usable in --queryformat"))
                .arg(flag("changelogs", "Show package changelogs"))
                .arg(flag("conflicts", "Show conflicts of the packages"))
                .arg(flag("depends", "Show all dependencies of the packages"))
                .arg(flag("enhances", "Show enhances of the packages"))
                .arg(flag("obsoletes", "Show obsoletes of the packages"))
                .arg(flag("provides", "Show provides of the packages"))
                .arg(flag("recommends", "Show recommends of the packages"))
                .arg(flag("requires", "Show requires of the packages"))
                .arg(flag("requires-pre", "Show pre-install requires of the packages"))
                .arg(flag("suggests", "Show suggests of the packages"))
                .arg(flag("supplements", "Show supplements of the packages"))
                .arg(flag("files", "Show files of the packages"))
                .arg(flag("sourcerpm", "Show source RPMs of the packages"))
                .arg(flag("location", "Show download locations of the packages"))
                .arg(Arg::new("queryformat").long("queryformat").value_name("FORMAT").help("Output format")),
        )
        .subcommand(Command::new("list").about("List installed and available packages").arg(specs("Package specs")))
        .subcommand(Command::new("info").about("Show details about installed and available packages").arg(specs("Package specs")))
        .subcommand(
            Command::new("repolist")
                .about("List configured repositories")
                .arg(flag("all", "Show enabled and disabled repositories"))
                .arg(flag("disabled", "Show disabled repositories only")),
        )
        .subcommand(Command::new("makecache").about("Download and cache metadata of enabled repositories"))
        .subcommand(job_args(Command::new("install").about("Install packages").arg(specs("Package specs or .rpm files"))))
        .subcommand(job_args(Command::new("remove").about("Remove packages").arg(specs("Package specs"))))
        .subcommand(job_args(
            Command::new("upgrade")
                .about("Upgrade packages, or the whole system without arguments")
                .arg(specs("Package specs")),
        ))
        .subcommand(job_args(Command::new("downgrade").about("Downgrade packages").arg(specs("Package specs"))))
        .subcommand(job_args(Command::new("reinstall").about("Reinstall packages").arg(specs("Package specs"))))
        .subcommand(job_args(
            Command::new("distro-sync")
                .about("Synchronize installed packages to the latest available versions")
                .arg(specs("Package specs")),
        ))
        .subcommand(
            Command::new("group")
                .about("Manage comps groups")
                .subcommand(Command::new("list").about("List groups"))
                .subcommand(Command::new("info").about("Show group details").arg(specs("Group ids or names")))
                .subcommand(Command::new("install").about("Install groups").arg(specs("Group ids or names")))
                .subcommand(Command::new("remove").about("Remove groups").arg(specs("Group ids or names"))),
        )
        .subcommand(
            Command::new("mark")
                .about("Change the reason of installed packages")
                .arg(
                    Arg::new("reason")
                        .required(true)
                        .value_parser(["user", "dependency", "weak-dependency", "group"]),
                )
                .arg(specs("Package specs")),
        )
        .subcommand(
            Command::new("history")
                .about("Show transaction history, or one transaction in detail")
                .arg(Arg::new("id").help("Transaction ID")),
        )
        .subcommand(Command::new("daemon").about("Serve JSON requests on stdin"))
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("rsdnf.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
