// src/output/groups.rs

//! Comps group listings

use crate::comps::{Group, PackageType};
use std::io::{self, Write};
use tabled::{
    builder::Builder,
    settings::{Style, Width, peaker::PriorityMax},
};

/// Print `ID / Name / Installed` columns for `groups`, each paired with
/// whether it is installed
pub fn print_group_list(
    out: &mut impl Write,
    groups: &[(&Group, bool)],
    width: usize,
) -> io::Result<()> {
    if groups.is_empty() {
        return Ok(());
    }
    let mut builder = Builder::new();
    builder.push_record(["ID", "Name", "Installed"].map(String::from));
    for (group, installed) in groups {
        let installed = if *installed { "yes" } else { "no" };
        builder.push_record([group.id.clone(), group.name.clone(), installed.to_string()]);
    }
    let table = builder
        .build()
        .with(Style::blank())
        .with(Width::wrap(width).priority(PriorityMax::default()))
        .to_string();
    writeln!(out, "{}", table)
}

const PACKAGE_KEYS: [(PackageType, &str); 4] = [
    (PackageType::Mandatory, "Mandatory packages"),
    (PackageType::Default, "Default packages"),
    (PackageType::Optional, "Optional packages"),
    (PackageType::Conditional, "Conditional packages"),
];

/// Print a `key : value` block describing `group`. Package lists get one
/// line per package.
pub fn print_group_info(out: &mut impl Write, group: &Group, installed: bool) -> io::Result<()> {
    let mut lines: Vec<(&str, String)> = vec![
        ("Id", group.id.clone()),
        ("Name", group.name.clone()),
        ("Description", group.description.clone()),
        ("Installed", if installed { "yes" } else { "no" }.to_string()),
    ];
    for (kind, key) in PACKAGE_KEYS {
        for (index, pkg) in group.packages_of_type(kind).enumerate() {
            let key = if index == 0 { key } else { "" };
            let value = match &pkg.requires {
                Some(requires) => format!("{} (if {})", pkg.name, requires),
                None => pkg.name.clone(),
            };
            lines.push((key, value));
        }
    }

    let key_width = lines.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    for (key, value) in lines {
        let line = format!("{:<kw$} : {}", key, value, kw = key_width);
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::GroupPackage;

    fn editors() -> Group {
        let mut group = Group::new("editors");
        group.name = "Editors".to_string();
        group.description = "Text editors".to_string();
        for (name, kind, requires) in [
            ("vim-enhanced", PackageType::Mandatory, None),
            ("nano", PackageType::Default, None),
            ("emacs", PackageType::Optional, None),
            ("vim-go", PackageType::Conditional, Some("golang")),
        ] {
            group.packages.push(GroupPackage {
                name: name.to_string(),
                kind,
                requires: requires.map(String::from),
            });
        }
        group
    }

    #[test]
    fn test_group_list() {
        let editors = editors();
        let core = Group::new("core");
        let mut buf = Vec::new();
        print_group_list(&mut buf, &[(&core, true), (&editors, false)], 80).unwrap();
        let out = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("core") && lines[1].contains("yes"));
        assert!(lines[2].contains("Editors") && lines[2].contains("no"));
    }

    #[test]
    fn test_group_info() {
        let mut buf = Vec::new();
        print_group_info(&mut buf, &editors(), false).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.starts_with(&format!("{:<20} : editors\n", "Id")));
        assert!(out.contains(&format!("{:<20} : no\n", "Installed")));
        assert!(out.contains(&format!("{:<20} : vim-enhanced\n", "Mandatory packages")));
        assert!(out.contains("Conditional packages : vim-go (if golang)\n"));
    }
}
