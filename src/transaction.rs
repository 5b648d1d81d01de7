// src/transaction.rs

//! Applying a resolved transaction to the system state
//!
//! Payloads are not unpacked; applying a transaction records its outcome
//! in the system state database. Installed packages, their reasons and the
//! installed groups are updated, and a changeset with one item per touched
//! package is written, all inside a single SQLite transaction.

use crate::db;
use crate::db::models::{
    Changeset, ChangesetItem, ChangesetStatus, InstalledGroup, InstalledPackage, ItemAction,
    Reason,
};
use crate::error::Result;
use crate::goal::Transaction;
use crate::rpm::PackageData;
use crate::sack::Pool;
use rusqlite::Connection;
use serde::Serialize;
use std::sync::mpsc::Sender;
use tracing::{debug, info, warn};

/// Progress of a transaction being applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransactionEvent {
    Started {
        total: usize,
    },
    Item {
        nevra: String,
        action: ItemAction,
        current: usize,
        total: usize,
    },
    Finished {
        changeset_id: i64,
    },
}

fn emit(events: Option<&Sender<TransactionEvent>>, event: TransactionEvent) {
    if let Some(sender) = events {
        // a receiver that went away only loses progress reports
        let _ = sender.send(event);
    }
}

fn remove_installed(conn: &Connection, data: &PackageData) -> Result<()> {
    match InstalledPackage::find_by_nevra(conn, data)? {
        Some(InstalledPackage { id: Some(id), .. }) => InstalledPackage::delete(conn, id),
        _ => {
            warn!("{} is not recorded as installed", data.full_nevra());
            Ok(())
        }
    }
}

fn record_item(
    conn: &Connection,
    changeset_id: i64,
    data: &PackageData,
    action: ItemAction,
    reason: Reason,
    repo_id: &str,
) -> Result<()> {
    ChangesetItem::new(
        changeset_id,
        data.full_nevra(),
        action,
        reason,
        repo_id.to_string(),
    )
    .insert(conn)?;
    Ok(())
}

/// Apply `transaction` to the system state in `conn` and return the id of
/// the changeset recording it. Progress is reported on `events`.
pub fn apply(
    conn: &mut Connection,
    pool: &Pool,
    transaction: &Transaction,
    description: &str,
    events: Option<&Sender<TransactionEvent>>,
) -> Result<i64> {
    let total = transaction.items.len();
    info!("Applying transaction \"{}\" ({} items)", description, total);
    emit(events, TransactionEvent::Started { total });

    let changeset_id = db::transaction(conn, |tx| {
        let mut changeset = Changeset::new(description.to_string());
        let changeset_id = changeset.insert(tx)?;

        for (index, item) in transaction.items.iter().enumerate() {
            let data = pool.data(item.package);
            let repo_id = pool.repo_of(item.package).id.as_str();
            debug!("{} {}", item.action.as_str(), data.full_nevra());

            match item.action {
                ItemAction::Install
                | ItemAction::Upgrade
                | ItemAction::Downgrade
                | ItemAction::Reinstall => {
                    for replaced in &item.replaces {
                        let old = pool.data(*replaced);
                        remove_installed(tx, old)?;
                        let replaced_action = match item.action {
                            ItemAction::Downgrade => Some(ItemAction::Downgraded),
                            ItemAction::Reinstall => None,
                            _ => Some(ItemAction::Upgraded),
                        };
                        if let Some(action) = replaced_action {
                            let old_repo = pool.repo_of(*replaced).id.as_str();
                            record_item(tx, changeset_id, old, action, pool.reason(*replaced), old_repo)?;
                        }
                    }
                    let mut installed = InstalledPackage::new(data.clone(), item.reason);
                    installed.from_repo = Some(repo_id.to_string());
                    installed.installed_by_changeset_id = Some(changeset_id);
                    installed.insert(tx)?;
                }
                ItemAction::Remove => remove_installed(tx, data)?,
                ItemAction::ReasonChange => match InstalledPackage::find_by_nevra(tx, data)? {
                    Some(InstalledPackage { id: Some(id), .. }) => {
                        InstalledPackage::set_reason(tx, id, item.reason)?
                    }
                    _ => warn!("{} is not recorded as installed", data.full_nevra()),
                },
                ItemAction::Upgraded | ItemAction::Downgraded => {}
            }
            record_item(tx, changeset_id, data, item.action, item.reason, repo_id)?;

            emit(
                events,
                TransactionEvent::Item {
                    nevra: data.full_nevra(),
                    action: item.action,
                    current: index + 1,
                    total,
                },
            );
        }

        for group_id in &transaction.groups_remove {
            InstalledGroup::delete(tx, group_id)?;
        }
        for group in &transaction.groups_install {
            if InstalledGroup::find_by_group_id(tx, &group.group_id)?.is_some() {
                InstalledGroup::delete(tx, &group.group_id)?;
            }
            group.clone().insert(tx)?;
        }

        changeset.update_status(tx, ChangesetStatus::Applied)?;
        Ok(changeset_id)
    })?;

    emit(events, TransactionEvent::Finished { changeset_id });
    info!("Transaction recorded as changeset {}", changeset_id);
    Ok(changeset_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMain;
    use crate::goal::{Goal, GoalJob, GoalSettings};
    use crate::repository::loader::load_system;
    use crate::rpm::Reldep;
    use crate::sack::{PoolRepo, RepoKind};
    use crate::version::Evr;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn pkg(name: &str, evr: &str) -> PackageData {
        PackageData::new(name, Evr::parse(evr).unwrap(), "x86_64")
    }

    /// A database with bash 5.2.26 (user) and glibc (dependency) installed
    fn setup() -> (TempDir, Connection) {
        let dir = TempDir::new().unwrap();
        let conn = db::open_or_init(&dir.path().join("system.db")).unwrap();
        let mut bash = pkg("bash", "5.2.26-1");
        bash.requires.push(Reldep::new("glibc"));
        InstalledPackage::new(bash, Reason::User).insert(&conn).unwrap();
        InstalledPackage::new(pkg("glibc", "2.39-1"), Reason::Dependency)
            .insert(&conn)
            .unwrap();
        (dir, conn)
    }

    fn pool_with(conn: &Connection) -> Pool {
        let mut pool = Pool::new("x86_64");
        load_system(&mut pool, conn).unwrap();
        let fedora = pool.add_repo(PoolRepo::new("fedora", RepoKind::Available));
        let mut bash = pkg("bash", "5.2.37-1");
        bash.requires.push(Reldep::new("glibc"));
        pool.add_package(fedora, bash);
        pool.add_package(fedora, pkg("glibc", "2.39-1"));
        pool.add_package(fedora, pkg("vim", "9.1-1"));
        pool
    }

    fn installed_nevras(conn: &Connection) -> Vec<String> {
        let mut nevras: Vec<String> = InstalledPackage::list_all(conn)
            .unwrap()
            .iter()
            .map(|p| format!("{} {}", p.data.nevra(), p.reason))
            .collect();
        nevras.sort();
        nevras
    }

    #[test]
    fn test_apply_upgrade_and_install() {
        let (_dir, mut conn) = setup();
        let pool = pool_with(&conn);
        let config = ConfigMain::new();
        let mut goal = Goal::new(&pool, &config);
        goal.add_job(GoalJob::Upgrade(None), GoalSettings::default());
        goal.add_job(GoalJob::Install("vim".into()), GoalSettings::default());
        let transaction = goal.resolve().unwrap();

        let (sender, receiver) = mpsc::channel();
        let id = apply(&mut conn, &pool, &transaction, "upgrade", Some(&sender)).unwrap();
        drop(sender);

        assert_eq!(
            installed_nevras(&conn),
            vec![
                "bash-5.2.37-1.x86_64 user",
                "glibc-2.39-1.x86_64 dependency",
                "vim-9.1-1.x86_64 user",
            ]
        );

        let changeset = Changeset::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(changeset.status, ChangesetStatus::Applied);
        let mut items: Vec<String> = ChangesetItem::find_by_changeset(&conn, id)
            .unwrap()
            .iter()
            .map(|i| format!("{} {}", i.action.as_str(), i.nevra))
            .collect();
        items.sort();
        assert_eq!(
            items,
            vec![
                "install vim-0:9.1-1.x86_64",
                "upgrade bash-0:5.2.37-1.x86_64",
                "upgraded bash-0:5.2.26-1.x86_64",
            ]
        );

        let events: Vec<TransactionEvent> = receiver.iter().collect();
        assert_eq!(events.first(), Some(&TransactionEvent::Started { total: 2 }));
        assert_eq!(events.last(), Some(&TransactionEvent::Finished { changeset_id: id }));
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_apply_remove_and_reason_change() {
        let (_dir, mut conn) = setup();
        let pool = pool_with(&conn);
        let config = ConfigMain::new();

        let mut goal = Goal::new(&pool, &config);
        goal.add_job(GoalJob::Install("glibc".into()), GoalSettings::default());
        let transaction = goal.resolve().unwrap();
        apply(&mut conn, &pool, &transaction, "install glibc", None).unwrap();
        assert_eq!(
            installed_nevras(&conn),
            vec!["bash-5.2.26-1.x86_64 user", "glibc-2.39-1.x86_64 user"]
        );

        let pool = pool_with(&conn);
        let mut goal = Goal::new(&pool, &config);
        goal.add_job(GoalJob::Remove("bash".into()), GoalSettings::default());
        let transaction = goal.resolve().unwrap();
        apply(&mut conn, &pool, &transaction, "remove bash", None).unwrap();
        // glibc is now user-installed and stays
        assert_eq!(installed_nevras(&conn), vec!["glibc-2.39-1.x86_64 user"]);
        assert_eq!(Changeset::list_all(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_apply_groups() {
        let (_dir, mut conn) = setup();
        let pool = pool_with(&conn);
        let transaction = Transaction {
            groups_install: vec![InstalledGroup::new(
                "editors".into(),
                "Editors".into(),
                Reason::User,
                vec!["vim".into()],
            )],
            ..Default::default()
        };
        apply(&mut conn, &pool, &transaction, "group install editors", None).unwrap();
        assert!(InstalledGroup::find_by_group_id(&conn, "editors").unwrap().is_some());

        let transaction = Transaction {
            groups_remove: vec!["editors".into()],
            ..Default::default()
        };
        apply(&mut conn, &pool, &transaction, "group remove editors", None).unwrap();
        assert!(InstalledGroup::find_by_group_id(&conn, "editors").unwrap().is_none());
    }
}
