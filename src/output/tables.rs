// src/output/tables.rs

//! Repository list, transaction summary and history tables

use crate::db::models::{Changeset, ChangesetItem, ItemAction};
use crate::goal::Transaction;
use crate::output::format_size;
use crate::repository::Repo;
use crate::sack::Pool;
use std::io::{self, Write};
use tabled::{
    builder::Builder,
    settings::{Style, Width, peaker::PriorityMax},
};

/// Print `repo id / repo name` columns, plus the enabled state when
/// `with_status` is set
pub fn print_repolist(
    out: &mut impl Write,
    repos: &[&Repo],
    with_status: bool,
    width: usize,
) -> io::Result<()> {
    if repos.is_empty() {
        return Ok(());
    }
    let mut builder = Builder::new();
    let mut header = vec!["repo id".to_string(), "repo name".to_string()];
    if with_status {
        header.push("status".to_string());
    }
    builder.push_record(header);
    for repo in repos {
        let mut row = vec![repo.id().to_string(), repo.name().to_string()];
        if with_status {
            let status = if repo.is_enabled() { "enabled" } else { "disabled" };
            row.push(status.to_string());
        }
        builder.push_record(row);
    }

    let table = builder
        .build()
        .with(Style::blank())
        .with(Width::wrap(width).priority(PriorityMax::default()))
        .to_string();
    writeln!(out, "{}", table)
}

fn section_heading(action: ItemAction) -> &'static str {
    match action {
        ItemAction::Install => "Installing:",
        ItemAction::Upgrade => "Upgrading:",
        ItemAction::Reinstall => "Reinstalling:",
        ItemAction::Downgrade => "Downgrading:",
        ItemAction::Remove => "Removing:",
        ItemAction::ReasonChange => "Changing reason:",
        ItemAction::Upgraded | ItemAction::Downgraded => "Replaced:",
    }
}

fn heading_row(heading: &str, detail: &str) -> [String; 5] {
    [
        heading.to_string(),
        detail.to_string(),
        String::new(),
        String::new(),
        String::new(),
    ]
}

const SECTIONS: [ItemAction; 6] = [
    ItemAction::Install,
    ItemAction::Upgrade,
    ItemAction::Reinstall,
    ItemAction::Downgrade,
    ItemAction::Remove,
    ItemAction::ReasonChange,
];

/// Print the packages of `transaction` grouped by action, followed by a
/// per-action count and the download size
pub fn print_transaction_table(
    out: &mut impl Write,
    pool: &Pool,
    transaction: &Transaction,
    width: usize,
) -> io::Result<()> {
    if transaction.is_empty() {
        return writeln!(out, "Nothing to do.");
    }

    let mut builder = Builder::new();
    builder.push_record(
        ["Package", "Arch", "Version", "Repository", "Size"].map(String::from),
    );
    for action in SECTIONS {
        let mut items = transaction.items_of(action).peekable();
        if items.peek().is_none() {
            continue;
        }
        builder.push_record(heading_row(section_heading(action), ""));
        for item in items {
            let data = pool.data(item.package);
            let size = if action == ItemAction::Remove {
                data.install_size
            } else {
                data.download_size
            };
            builder.push_record([
                format!(" {}", data.name),
                data.arch.clone(),
                data.evr.to_string(),
                pool.repo_of(item.package).id.clone(),
                format_size(size),
            ]);
            for replaced in &item.replaces {
                let old = pool.data(*replaced);
                builder.push_record([
                    "   replacing".to_string(),
                    old.arch.clone(),
                    old.evr.to_string(),
                    pool.repo_of(*replaced).id.clone(),
                    format_size(old.install_size),
                ]);
            }
        }
    }
    for group in &transaction.groups_install {
        builder.push_record(heading_row("Installing group:", &group.group_id));
    }
    for group in &transaction.groups_remove {
        builder.push_record(heading_row("Removing group:", group));
    }

    let table = builder
        .build()
        .with(Style::blank())
        .with(Width::wrap(width).priority(PriorityMax::default()))
        .to_string();
    writeln!(out, "{}", table)?;
    writeln!(out)?;
    writeln!(out, "Transaction Summary:")?;
    for action in SECTIONS {
        let count = transaction.items_of(action).count();
        if count > 0 {
            let noun = if count == 1 { "package" } else { "packages" };
            writeln!(out, " {:<17} {:>4} {}", section_heading(action), count, noun)?;
        }
    }
    let download = transaction.download_size(pool);
    if download > 0 {
        writeln!(out)?;
        writeln!(out, "Total size of inbound packages is {}.", format_size(download))?;
    }
    Ok(())
}

/// Print one row per changeset
pub fn print_history(out: &mut impl Write, changesets: &[Changeset], width: usize) -> io::Result<()> {
    if changesets.is_empty() {
        return writeln!(out, "No transactions recorded.");
    }
    let mut builder = Builder::new();
    builder.push_record(["ID", "Description", "Date and time", "Status"].map(String::from));
    for changeset in changesets {
        builder.push_record([
            changeset.id.map(|id| id.to_string()).unwrap_or_default(),
            changeset.description.clone(),
            changeset.created_at.clone().unwrap_or_default(),
            changeset.status.as_str().to_string(),
        ]);
    }
    let table = builder
        .build()
        .with(Style::blank())
        .with(Width::wrap(width).priority(PriorityMax::default()))
        .to_string();
    writeln!(out, "{}", table)
}

/// Print a changeset header followed by its items
pub fn print_history_info(
    out: &mut impl Write,
    changeset: &Changeset,
    items: &[ChangesetItem],
    width: usize,
) -> io::Result<()> {
    writeln!(out, "Transaction ID : {}", changeset.id.unwrap_or_default())?;
    writeln!(out, "Description    : {}", changeset.description)?;
    writeln!(out, "Begin time     : {}", changeset.created_at.as_deref().unwrap_or(""))?;
    writeln!(out, "End time       : {}", changeset.applied_at.as_deref().unwrap_or(""))?;
    writeln!(out, "Status         : {}", changeset.status.as_str())?;
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "Packages altered:")?;
    let mut builder = Builder::new();
    builder.push_record(["Action", "Package", "Reason", "Repository"].map(String::from));
    for item in items {
        builder.push_record([
            format!(" {}", item.action.as_str()),
            item.nevra.clone(),
            item.reason.to_string(),
            item.repo_id.clone(),
        ]);
    }
    let table = builder
        .build()
        .with(Style::blank())
        .with(Width::wrap(width).priority(PriorityMax::default()))
        .to_string();
    writeln!(out, "{}", table)
}
