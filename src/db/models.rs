// src/db/models.rs

//! Data models for the system state database
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.

use crate::error::{Error, Result};
use crate::rpm::PackageData;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a package or group is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    /// Explicitly requested by the user
    User,
    /// Pulled in to satisfy a hard dependency
    Dependency,
    /// Pulled in to satisfy a weak dependency
    WeakDependency,
    /// Installed as part of a group
    Group,
    /// Installed outside of this tool
    External,
    /// Marked for removal as no longer needed
    Clean,
    #[default]
    None,
}

impl Reason {
    pub fn as_str(&self) -> &str {
        match self {
            Reason::User => "user",
            Reason::Dependency => "dependency",
            Reason::WeakDependency => "weak-dependency",
            Reason::Group => "group",
            Reason::External => "external",
            Reason::Clean => "clean",
            Reason::None => "none",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reason {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Reason::User),
            "dependency" => Ok(Reason::Dependency),
            "weak-dependency" => Ok(Reason::WeakDependency),
            "group" => Ok(Reason::Group),
            "external" => Ok(Reason::External),
            "clean" => Ok(Reason::Clean),
            "none" => Ok(Reason::None),
            _ => Err(format!("Invalid reason: {}", s)),
        }
    }
}

/// Map a parse failure of column `idx` into a rusqlite conversion error
fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message)),
    )
}

/// A package installed on the system
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub id: Option<i64>,
    pub data: PackageData,
    pub reason: Reason,
    /// Repository the package was installed from
    pub from_repo: Option<String>,
    pub installed_at: Option<String>,
    pub installed_by_changeset_id: Option<i64>,
}

const INSTALLED_COLUMNS: &str =
    "id, metadata, reason, from_repo, installed_at, installed_by_changeset_id";

impl InstalledPackage {
    pub fn new(data: PackageData, reason: Reason) -> Self {
        Self {
            id: None,
            data,
            reason,
            from_repo: None,
            installed_at: None,
            installed_by_changeset_id: None,
        }
    }

    /// Insert this package into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let metadata = serde_json::to_string(&self.data)
            .map_err(|e| Error::ParseError(format!("Cannot serialize package metadata: {}", e)))?;

        conn.execute(
            "INSERT INTO installed_packages (name, epoch, version, release, arch, reason, from_repo, metadata, installed_by_changeset_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                &self.data.name,
                self.data.evr.epoch,
                &self.data.evr.version,
                &self.data.evr.release,
                &self.data.arch,
                self.reason.as_str(),
                &self.from_repo,
                metadata,
                &self.installed_by_changeset_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an installed package by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM installed_packages WHERE id = ?1",
            INSTALLED_COLUMNS
        ))?;

        let pkg = stmt.query_row([id], Self::from_row).optional()?;

        Ok(pkg)
    }

    /// Find installed packages by name
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM installed_packages WHERE name = ?1 ORDER BY id",
            INSTALLED_COLUMNS
        ))?;

        let pkgs = stmt
            .query_map([name], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(pkgs)
    }

    /// Find an installed package by its full NEVRA
    pub fn find_by_nevra(conn: &Connection, data: &PackageData) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM installed_packages
             WHERE name = ?1 AND epoch = ?2 AND version = ?3 AND release = ?4 AND arch = ?5",
            INSTALLED_COLUMNS
        ))?;

        let pkg = stmt
            .query_row(
                params![
                    &data.name,
                    data.evr.epoch,
                    &data.evr.version,
                    &data.evr.release,
                    &data.arch
                ],
                Self::from_row,
            )
            .optional()?;

        Ok(pkg)
    }

    /// List all installed packages
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM installed_packages ORDER BY name, id",
            INSTALLED_COLUMNS
        ))?;

        let pkgs = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(pkgs)
    }

    /// Change the install reason of a package
    pub fn set_reason(conn: &Connection, id: i64, reason: Reason) -> Result<()> {
        conn.execute(
            "UPDATE installed_packages SET reason = ?1 WHERE id = ?2",
            params![reason.as_str(), id],
        )?;
        Ok(())
    }

    /// Delete an installed package by ID
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM installed_packages WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Convert a database row to an InstalledPackage
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let metadata: String = row.get(1)?;
        let data: PackageData =
            serde_json::from_str(&metadata).map_err(|e| conversion_error(1, e.to_string()))?;
        let reason_str: String = row.get(2)?;
        let reason = reason_str
            .parse::<Reason>()
            .map_err(|e| conversion_error(2, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            data,
            reason,
            from_repo: row.get(3)?,
            installed_at: row.get(4)?,
            installed_by_changeset_id: row.get(5)?,
        })
    }
}

/// A comps group installed on the system
#[derive(Debug, Clone)]
pub struct InstalledGroup {
    pub id: Option<i64>,
    pub group_id: String,
    pub name: String,
    pub reason: Reason,
    /// Names of the packages installed with the group
    pub packages: Vec<String>,
    pub installed_at: Option<String>,
}

impl InstalledGroup {
    pub fn new(group_id: String, name: String, reason: Reason, packages: Vec<String>) -> Self {
        Self {
            id: None,
            group_id,
            name,
            reason,
            packages,
            installed_at: None,
        }
    }

    /// Insert this group into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let packages = serde_json::to_string(&self.packages)
            .map_err(|e| Error::ParseError(format!("Cannot serialize group packages: {}", e)))?;

        conn.execute(
            "INSERT INTO installed_groups (group_id, name, reason, packages) VALUES (?1, ?2, ?3, ?4)",
            params![&self.group_id, &self.name, self.reason.as_str(), packages],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find an installed group by its comps id
    pub fn find_by_group_id(conn: &Connection, group_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, group_id, name, reason, packages, installed_at
             FROM installed_groups WHERE group_id = ?1",
        )?;

        let group = stmt.query_row([group_id], Self::from_row).optional()?;

        Ok(group)
    }

    /// List all installed groups
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, group_id, name, reason, packages, installed_at
             FROM installed_groups ORDER BY group_id",
        )?;

        let groups = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    /// Delete an installed group by its comps id
    pub fn delete(conn: &Connection, group_id: &str) -> Result<()> {
        conn.execute("DELETE FROM installed_groups WHERE group_id = ?1", [group_id])?;
        Ok(())
    }

    /// Convert a database row to an InstalledGroup
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let reason_str: String = row.get(3)?;
        let reason = reason_str
            .parse::<Reason>()
            .map_err(|e| conversion_error(3, e))?;
        let packages_json: String = row.get(4)?;
        let packages: Vec<String> = serde_json::from_str(&packages_json)
            .map_err(|e| conversion_error(4, e.to_string()))?;

        Ok(Self {
            id: Some(row.get(0)?),
            group_id: row.get(1)?,
            name: row.get(2)?,
            reason,
            packages,
            installed_at: row.get(5)?,
        })
    }
}

/// Changeset status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangesetStatus {
    Pending,
    Applied,
    Failed,
}

impl ChangesetStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ChangesetStatus::Pending => "pending",
            ChangesetStatus::Applied => "applied",
            ChangesetStatus::Failed => "failed",
        }
    }
}

impl FromStr for ChangesetStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChangesetStatus::Pending),
            "applied" => Ok(ChangesetStatus::Applied),
            "failed" => Ok(ChangesetStatus::Failed),
            _ => Err(format!("Invalid changeset status: {}", s)),
        }
    }
}

/// A Changeset is one applied (or attempted) transaction
#[derive(Debug, Clone)]
pub struct Changeset {
    pub id: Option<i64>,
    pub description: String,
    pub status: ChangesetStatus,
    pub created_at: Option<String>,
    pub applied_at: Option<String>,
}

impl Changeset {
    /// Create a new Changeset
    pub fn new(description: String) -> Self {
        Self {
            id: None,
            description,
            status: ChangesetStatus::Pending,
            created_at: None,
            applied_at: None,
        }
    }

    /// Insert this changeset into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changesets (description, status) VALUES (?1, ?2)",
            params![&self.description, self.status.as_str()],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find a changeset by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at FROM changesets WHERE id = ?1",
        )?;

        let changeset = stmt.query_row([id], Self::from_row).optional()?;

        Ok(changeset)
    }

    /// List all changesets, newest first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, description, status, created_at, applied_at
             FROM changesets ORDER BY id DESC",
        )?;

        let changesets = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(changesets)
    }

    /// Update changeset status
    pub fn update_status(&mut self, conn: &Connection, new_status: ChangesetStatus) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            Error::InitError("Cannot update changeset without ID".to_string())
        })?;

        if new_status == ChangesetStatus::Applied {
            conn.execute(
                "UPDATE changesets SET status = ?1, applied_at = CURRENT_TIMESTAMP WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        } else {
            conn.execute(
                "UPDATE changesets SET status = ?1 WHERE id = ?2",
                params![new_status.as_str(), id],
            )?;
        }

        self.status = new_status;
        Ok(())
    }

    /// Convert a database row to a Changeset
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status_str: String = row.get(2)?;
        let status = status_str
            .parse::<ChangesetStatus>()
            .map_err(|e| conversion_error(2, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            description: row.get(1)?,
            status,
            created_at: row.get(3)?,
            applied_at: row.get(4)?,
        })
    }
}

/// What a transaction did to one package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Install,
    Upgrade,
    Upgraded,
    Downgrade,
    Downgraded,
    Reinstall,
    Remove,
    ReasonChange,
}

impl ItemAction {
    pub fn as_str(&self) -> &str {
        match self {
            ItemAction::Install => "install",
            ItemAction::Upgrade => "upgrade",
            ItemAction::Upgraded => "upgraded",
            ItemAction::Downgrade => "downgrade",
            ItemAction::Downgraded => "downgraded",
            ItemAction::Reinstall => "reinstall",
            ItemAction::Remove => "remove",
            ItemAction::ReasonChange => "reason_change",
        }
    }

    /// Whether the action brings a package onto the system
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            ItemAction::Install | ItemAction::Upgrade | ItemAction::Downgrade | ItemAction::Reinstall
        )
    }
}

impl FromStr for ItemAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "install" => Ok(ItemAction::Install),
            "upgrade" => Ok(ItemAction::Upgrade),
            "upgraded" => Ok(ItemAction::Upgraded),
            "downgrade" => Ok(ItemAction::Downgrade),
            "downgraded" => Ok(ItemAction::Downgraded),
            "reinstall" => Ok(ItemAction::Reinstall),
            "remove" => Ok(ItemAction::Remove),
            "reason_change" => Ok(ItemAction::ReasonChange),
            _ => Err(format!("Invalid item action: {}", s)),
        }
    }
}

/// One package touched by a changeset
#[derive(Debug, Clone)]
pub struct ChangesetItem {
    pub id: Option<i64>,
    pub changeset_id: i64,
    pub nevra: String,
    pub action: ItemAction,
    pub reason: Reason,
    pub repo_id: String,
}

impl ChangesetItem {
    pub fn new(
        changeset_id: i64,
        nevra: String,
        action: ItemAction,
        reason: Reason,
        repo_id: String,
    ) -> Self {
        Self {
            id: None,
            changeset_id,
            nevra,
            action,
            reason,
            repo_id,
        }
    }

    /// Insert this item into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO changeset_items (changeset_id, nevra, action, reason, repo_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                &self.changeset_id,
                &self.nevra,
                self.action.as_str(),
                self.reason.as_str(),
                &self.repo_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all items of a changeset
    pub fn find_by_changeset(conn: &Connection, changeset_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, changeset_id, nevra, action, reason, repo_id
             FROM changeset_items WHERE changeset_id = ?1 ORDER BY id",
        )?;

        let items = stmt
            .query_map([changeset_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    /// Convert a database row to a ChangesetItem
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let action_str: String = row.get(3)?;
        let action = action_str
            .parse::<ItemAction>()
            .map_err(|e| conversion_error(3, e))?;
        let reason_str: String = row.get(4)?;
        let reason = reason_str
            .parse::<Reason>()
            .map_err(|e| conversion_error(4, e))?;

        Ok(Self {
            id: Some(row.get(0)?),
            changeset_id: row.get(1)?,
            nevra: row.get(2)?,
            action,
            reason,
            repo_id: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use crate::version::Evr;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    fn bash() -> PackageData {
        let mut data = PackageData::new("bash", Evr::new(0, "5.2.26", "3.fc40"), "x86_64");
        data.summary = "The GNU Bourne Again shell".to_string();
        data.files.push("/usr/bin/bash".to_string());
        data
    }

    #[test]
    fn test_reason_round_trips_through_strings() {
        for reason in [
            Reason::User,
            Reason::Dependency,
            Reason::WeakDependency,
            Reason::Group,
            Reason::External,
            Reason::Clean,
            Reason::None,
        ] {
            assert_eq!(reason.as_str().parse::<Reason>().unwrap(), reason);
        }
        assert!("bogus".parse::<Reason>().is_err());
    }

    #[test]
    fn test_installed_package_crud() {
        let (_temp, conn) = create_test_db();

        let mut pkg = InstalledPackage::new(bash(), Reason::User);
        pkg.from_repo = Some("fedora".to_string());
        let id = pkg.insert(&conn).unwrap();

        let found = InstalledPackage::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.data, bash());
        assert_eq!(found.reason, Reason::User);
        assert_eq!(found.from_repo.as_deref(), Some("fedora"));
        assert!(found.installed_at.is_some());

        assert!(InstalledPackage::find_by_nevra(&conn, &bash()).unwrap().is_some());
        assert_eq!(InstalledPackage::find_by_name(&conn, "bash").unwrap().len(), 1);

        InstalledPackage::set_reason(&conn, id, Reason::Dependency).unwrap();
        let found = InstalledPackage::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.reason, Reason::Dependency);

        InstalledPackage::delete(&conn, id).unwrap();
        assert!(InstalledPackage::list_all(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_installed_package_unique_nevra() {
        let (_temp, conn) = create_test_db();
        InstalledPackage::new(bash(), Reason::User).insert(&conn).unwrap();
        assert!(InstalledPackage::new(bash(), Reason::User).insert(&conn).is_err());
    }

    #[test]
    fn test_installed_group_crud() {
        let (_temp, conn) = create_test_db();
        let mut group = InstalledGroup::new(
            "core".to_string(),
            "Core".to_string(),
            Reason::User,
            vec!["bash".to_string(), "coreutils".to_string()],
        );
        group.insert(&conn).unwrap();

        let found = InstalledGroup::find_by_group_id(&conn, "core").unwrap().unwrap();
        assert_eq!(found.packages, vec!["bash", "coreutils"]);
        assert_eq!(InstalledGroup::list_all(&conn).unwrap().len(), 1);

        InstalledGroup::delete(&conn, "core").unwrap();
        assert!(InstalledGroup::find_by_group_id(&conn, "core").unwrap().is_none());
    }

    #[test]
    fn test_changeset_with_items() {
        let (_temp, conn) = create_test_db();

        let mut changeset = Changeset::new("install bash".to_string());
        let cs_id = changeset.insert(&conn).unwrap();
        ChangesetItem::new(
            cs_id,
            "bash-5.2.26-3.fc40.x86_64".to_string(),
            ItemAction::Install,
            Reason::User,
            "fedora".to_string(),
        )
        .insert(&conn)
        .unwrap();

        changeset.update_status(&conn, ChangesetStatus::Applied).unwrap();

        let found = Changeset::find_by_id(&conn, cs_id).unwrap().unwrap();
        assert_eq!(found.status, ChangesetStatus::Applied);
        assert!(found.applied_at.is_some());

        let items = ChangesetItem::find_by_changeset(&conn, cs_id).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].action, ItemAction::Install);
        assert_eq!(items[0].repo_id, "fedora");
    }
}
