// tests/integration_test.rs

//! Integration tests for rsdnf
//!
//! Every test builds an installroot with repository definitions pointing at
//! local repositories, so nothing is read from the host.

use flate2::Compression;
use flate2::write::GzEncoder;
use rsdnf::Base;
use rsdnf::config::Priority;
use rsdnf::db;
use rsdnf::db::models::{Changeset, ChangesetItem, InstalledGroup, InstalledPackage, ItemAction, Reason};
use rsdnf::goal::GoalSettings;
use rsdnf::repoquery::{self, RepoqueryOptions};
use rsdnf::sack::{ExcludeFlags, PackageQuery};
use rsdnf::service::Session;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Clone, Copy)]
enum Compress {
    Gzip,
    Zstd,
}

struct TestPackage {
    name: &'static str,
    version: &'static str,
    requires: &'static [&'static str],
}

const FEDORA: &[TestPackage] = &[
    TestPackage {
        name: "bash",
        version: "5.2.26",
        requires: &[],
    },
    TestPackage {
        name: "vim-enhanced",
        version: "9.1",
        requires: &["vim-common"],
    },
    TestPackage {
        name: "vim-common",
        version: "9.1",
        requires: &[],
    },
];

const UPDATES: &[TestPackage] = &[TestPackage {
    name: "bash",
    version: "5.2.37",
    requires: &[],
}];

const COMPS: &str = r#"<comps>
<group>
  <id>editors</id>
  <name>Editors</name>
  <description>Text editors</description>
  <uservisible>true</uservisible>
  <packagelist>
    <packagereq type="mandatory">vim-enhanced</packagereq>
  </packagelist>
</group>
</comps>"#;

fn primary_xml(packages: &[TestPackage]) -> String {
    let mut xml = String::from(r#"<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm">"#);
    for pkg in packages {
        let requires: String = pkg
            .requires
            .iter()
            .map(|r| format!(r#"<rpm:entry name="{}"/>"#, r))
            .collect();
        xml.push_str(&format!(
            r#"<package type="rpm"><name>{name}</name><arch>x86_64</arch><version epoch="0" ver="{ver}" rel="1"/><checksum type="sha256" pkgid="YES">{name}-{ver}</checksum><summary>The {name} package</summary><size package="1024" installed="4096" archive="0"/><location href="Packages/{name}-{ver}-1.x86_64.rpm"/><format><rpm:sourcerpm>{name}-{ver}-1.src.rpm</rpm:sourcerpm><rpm:provides><rpm:entry name="{name}"/></rpm:provides><rpm:requires>{requires}</rpm:requires></format></package>"#,
            name = pkg.name,
            ver = pkg.version,
            requires = requires,
        ));
    }
    xml.push_str("</metadata>");
    xml
}

fn compress(data: &[u8], kind: Compress) -> Vec<u8> {
    match kind {
        Compress::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).unwrap();
            encoder.finish().unwrap()
        }
        Compress::Zstd => zstd::encode_all(data, 0).unwrap(),
    }
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Write a repository at `root` with compressed primary and plain comps
fn write_repo(root: &Path, packages: &[TestPackage], kind: Compress, with_comps: bool) {
    let ext = match kind {
        Compress::Gzip => "gz",
        Compress::Zstd => "zst",
    };
    fs::create_dir_all(root.join("repodata")).unwrap();
    let primary = compress(primary_xml(packages).as_bytes(), kind);
    let primary_name = format!("repodata/primary.xml.{}", ext);
    fs::write(root.join(&primary_name), &primary).unwrap();

    let mut repomd = format!(
        r#"<repomd><data type="primary"><checksum type="sha256">{}</checksum><location href="{}"/></data>"#,
        sha256_hex(&primary),
        primary_name
    );
    if with_comps {
        fs::write(root.join("repodata/comps.xml"), COMPS).unwrap();
        repomd.push_str(&format!(
            r#"<data type="group"><checksum type="sha256">{}</checksum><location href="repodata/comps.xml"/></data>"#,
            sha256_hex(COMPS.as_bytes())
        ));
    }
    repomd.push_str("</repomd>");
    fs::write(root.join("repodata/repomd.xml"), repomd).unwrap();
}

struct Fixture {
    _dir: TempDir,
    installroot: PathBuf,
    repos: PathBuf,
}

impl Fixture {
    /// An installroot with `fedora` (gzip, with comps) and `updates` (zstd)
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let installroot = dir.path().join("root");
        let repos = dir.path().join("repos");
        write_repo(&repos.join("fedora"), FEDORA, Compress::Gzip, true);
        write_repo(&repos.join("updates"), UPDATES, Compress::Zstd, false);

        let reposdir = installroot.join("etc/yum.repos.d");
        fs::create_dir_all(&reposdir).unwrap();
        for id in ["fedora", "updates"] {
            fs::write(
                reposdir.join(format!("{}.repo", id)),
                format!(
                    "[{id}]\nname={id} $basearch\nbaseurl=file://{}\n",
                    repos.join(id).display()
                ),
            )
            .unwrap();
        }
        Self {
            _dir: dir,
            installroot,
            repos,
        }
    }

    fn base(&self) -> Base {
        let mut base = Base::new();
        base.config_mut()
            .installroot
            .set(Priority::Commandline, self.installroot.display().to_string())
            .unwrap();
        base.vars_mut().set_arch("x86_64", Priority::Commandline);
        base.load_config().unwrap();
        base.setup().unwrap();
        base.repo_sack_mut()
            .unwrap()
            .create_repos_from_system_configuration()
            .unwrap();
        base
    }
}

fn names(query: &PackageQuery<'_>) -> Vec<String> {
    query.sorted().iter().map(|p| p.nevra()).collect()
}

#[test]
fn test_database_lifecycle() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested/path/to/system.db");

    db::init(&db_path).unwrap();
    assert!(db_path.exists(), "Database should exist in nested path");

    let conn = db::open(&db_path).unwrap();
    let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
    assert_eq!(result, 1);
}

#[test]
fn test_load_gzip_and_zstd_repositories() {
    let fixture = Fixture::new();
    let mut base = fixture.base();
    let sack = base.repo_sack_mut().unwrap();
    assert_eq!(sack.repo("fedora").unwrap().name(), "fedora x86_64");

    sack.update_and_load_enabled_repos(true).unwrap();
    let query = PackageQuery::new(sack.pool(), ExcludeFlags::ApplyExcludes);
    assert_eq!(
        names(&query),
        vec![
            "bash-5.2.26-1.x86_64",
            "bash-5.2.37-1.x86_64",
            "vim-common-9.1-1.x86_64",
            "vim-enhanced-9.1-1.x86_64",
        ]
    );
    let groups = sack.pool().merged_groups();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].id, "editors");
}

#[test]
fn test_checksum_mismatch() {
    let fixture = Fixture::new();
    // Corrupt the primary metadata behind repomd's back
    let primary = fixture.repos.join("updates/repodata/primary.xml.zst");
    fs::write(&primary, zstd::encode_all(&b"<metadata></metadata>"[..], 0).unwrap()).unwrap();

    let mut base = fixture.base();
    let err = base
        .repo_sack_mut()
        .unwrap()
        .update_and_load_enabled_repos(false)
        .unwrap_err();
    assert!(err.to_string().contains("updates"), "unexpected error: {}", err);

    let mut base = fixture.base();
    let sack = base.repo_sack_mut().unwrap();
    sack.repo_mut("updates")
        .unwrap()
        .config_mut()
        .set_by_name("skip_if_unavailable", "1", Priority::Commandline)
        .unwrap();
    sack.update_and_load_enabled_repos(false).unwrap();
    let query = PackageQuery::new(sack.pool(), ExcludeFlags::ApplyExcludes);
    assert_eq!(query.len(), 3);
}

#[test]
fn test_repoquery_whatrequires() {
    let fixture = Fixture::new();
    let mut base = fixture.base();
    let options = RepoqueryOptions {
        whatrequires: vec!["vim-common".to_string()],
        queryformat: Some("%{name} from %{repoid}\\n".to_string()),
        ..Default::default()
    };
    options.validate().unwrap();

    let sack = base.repo_sack_mut().unwrap();
    let plan = options.configure(sack).unwrap();
    assert!(plan.available);
    assert!(!plan.system);
    sack.update_and_load_enabled_repos(false).unwrap();

    let result = repoquery::query(sack.pool(), &options, plan, &[], 0, 7);
    let mut out = Vec::new();
    repoquery::print(&mut out, &result, &options).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "vim-enhanced from fedora\n");
}

#[test]
fn test_install_upgrade_remove_history() {
    let fixture = Fixture::new();
    let mut session = Session::new(fixture.base()).unwrap();

    session
        .install(&["vim-enhanced".to_string()], &GoalSettings::default())
        .unwrap();
    let mut items: Vec<String> = session
        .resolve()
        .unwrap()
        .iter()
        .map(|i| format!("{} {} {}", i.action.as_str(), i.nevra, i.reason))
        .collect();
    items.sort();
    assert_eq!(
        items,
        vec![
            "install vim-common-0:9.1-1.x86_64 dependency",
            "install vim-enhanced-0:9.1-1.x86_64 user",
        ]
    );
    let first = session.do_transaction("install vim-enhanced", None).unwrap();

    // a second session sees the recorded state
    let conn = session.base().open_system_state().unwrap();
    let installed = InstalledPackage::list_all(&conn).unwrap();
    assert_eq!(installed.len(), 2);
    assert!(installed
        .iter()
        .all(|p| p.from_repo.as_deref() == Some("fedora")));

    let from_fedora = GoalSettings {
        repo_ids: vec!["fedora".to_string()],
        ..Default::default()
    };
    session.install(&["bash".to_string()], &from_fedora).unwrap();
    session.resolve().unwrap();
    session.do_transaction("install bash", None).unwrap();

    session.upgrade(&[], &GoalSettings::default());
    let items = session.resolve().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].action, ItemAction::Upgrade);
    assert_eq!(items[0].nevra, "bash-0:5.2.37-1.x86_64");
    assert_eq!(items[0].replaces, vec!["bash-0:5.2.26-1.x86_64"]);
    let upgrade = session.do_transaction("upgrade", None).unwrap();

    session.remove(&["vim-enhanced".to_string()], &GoalSettings::default());
    let items = session.resolve().unwrap();
    // vim-common goes along as an unneeded dependency
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.action == ItemAction::Remove));
    session.do_transaction("remove vim-enhanced", None).unwrap();

    let installed: Vec<String> = InstalledPackage::list_all(&conn)
        .unwrap()
        .iter()
        .map(|p| p.data.nevra())
        .collect();
    assert_eq!(installed, vec!["bash-5.2.37-1.x86_64"]);

    let history = Changeset::list_all(&conn).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].description, "remove vim-enhanced");
    assert_eq!(history[3].id, Some(first));

    let mut actions: Vec<String> = ChangesetItem::find_by_changeset(&conn, upgrade)
        .unwrap()
        .iter()
        .map(|i| format!("{} {}", i.action.as_str(), i.nevra))
        .collect();
    actions.sort();
    assert_eq!(
        actions,
        vec!["upgrade bash-0:5.2.37-1.x86_64", "upgraded bash-0:5.2.26-1.x86_64"]
    );
}

#[test]
fn test_userinstalled_after_transaction() {
    let fixture = Fixture::new();
    let mut session = Session::new(fixture.base()).unwrap();
    session
        .install(&["vim-enhanced".to_string()], &GoalSettings::default())
        .unwrap();
    session.resolve().unwrap();
    session.do_transaction("install vim-enhanced", None).unwrap();

    let mut base = fixture.base();
    let options = RepoqueryOptions {
        userinstalled: true,
        ..Default::default()
    };
    options.validate().unwrap();
    let sack = base.repo_sack_mut().unwrap();
    let plan = options.configure(sack).unwrap();
    assert!(plan.system);
    sack.load_system_repo().unwrap();
    if plan.available {
        sack.update_and_load_enabled_repos(false).unwrap();
    }
    let result = repoquery::query(sack.pool(), &options, plan, &[], 0, 7);
    assert_eq!(names(&result), vec!["vim-enhanced-9.1-1.x86_64"]);
}

#[test]
fn test_group_install_records_group() {
    let fixture = Fixture::new();
    let mut session = Session::new(fixture.base()).unwrap();
    session.group_install(&["editors".to_string()], &GoalSettings::default());
    let mut items: Vec<String> = session
        .resolve()
        .unwrap()
        .iter()
        .map(|i| format!("{} {}", i.nevra, i.reason))
        .collect();
    items.sort();
    assert_eq!(
        items,
        vec![
            "vim-common-0:9.1-1.x86_64 dependency",
            "vim-enhanced-0:9.1-1.x86_64 group",
        ]
    );
    session.do_transaction("group install editors", None).unwrap();

    let conn = session.base().open_system_state().unwrap();
    let group = InstalledGroup::find_by_group_id(&conn, "editors")
        .unwrap()
        .unwrap();
    assert_eq!(group.reason, Reason::User);
    assert_eq!(group.packages, vec!["vim-enhanced"]);

    session.group_remove(&["editors".to_string()], &GoalSettings::default());
    session.resolve().unwrap();
    session.do_transaction("group remove editors", None).unwrap();
    assert!(InstalledGroup::find_by_group_id(&conn, "editors")
        .unwrap()
        .is_none());
    assert!(InstalledPackage::list_all(&conn).unwrap().is_empty());
}
