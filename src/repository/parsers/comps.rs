// src/repository/parsers/comps.rs

//! comps (`group`) metadata parser

use super::attr;
use crate::comps::{Group, GroupPackage, PackageType};
use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Parse comps.xml groups. Translated names and descriptions
/// (`xml:lang`) are skipped.
pub fn parse_comps(xml: &str) -> Result<Vec<Group>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut groups = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<Group> = None;
    let mut current_tag = String::new();
    let mut localized = false;
    let mut packagereq: Option<(PackageType, Option<String>)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                localized = attr(&e, "xml:lang").is_some();
                match current_tag.as_str() {
                    "group" => current = Some(Group::new(String::new())),
                    "packagereq" => {
                        let kind = attr(&e, "type")
                            .and_then(|t| t.parse().ok())
                            .unwrap_or(PackageType::Default);
                        packagereq = Some((kind, attr(&e, "requires")));
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut group) = current {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match current_tag.as_str() {
                        "id" => group.id = text,
                        "name" if !localized => group.name = text,
                        "description" if !localized => group.description = text,
                        "default" => group.default = text == "true",
                        "uservisible" => group.uservisible = text == "true",
                        "packagereq" => {
                            if let Some((kind, requires)) = packagereq.take() {
                                group.packages.push(GroupPackage {
                                    name: text,
                                    kind,
                                    requires,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"group" {
                    if let Some(group) = current.take() {
                        if !group.id.is_empty() {
                            groups.push(group);
                        }
                    }
                }
                current_tag.clear();
                localized = false;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!("Failed to parse comps.xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comps() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE comps PUBLIC "-//Red Hat, Inc.//DTD Comps info//EN" "comps.dtd">
<comps>
  <group>
    <id>core</id>
    <name>Core</name>
    <name xml:lang="de">Kern</name>
    <description>Smallest possible installation</description>
    <description xml:lang="de">Kleinstmögliche Installation</description>
    <default>false</default>
    <uservisible>false</uservisible>
    <packagelist>
      <packagereq type="mandatory">bash</packagereq>
      <packagereq type="default">vim-minimal</packagereq>
      <packagereq type="conditional" requires="xorg-x11-server-Xorg">xorg-x11-drv-libinput</packagereq>
      <packagereq>coreutils</packagereq>
    </packagelist>
  </group>
  <group>
    <id>editors</id>
    <name>Editors</name>
    <packagelist>
      <packagereq type="optional">emacs</packagereq>
    </packagelist>
  </group>
</comps>"#;
        let groups = parse_comps(xml).unwrap();
        assert_eq!(groups.len(), 2);

        let core = &groups[0];
        assert_eq!(core.id, "core");
        assert_eq!(core.name, "Core");
        assert_eq!(core.description, "Smallest possible installation");
        assert!(!core.uservisible);
        assert_eq!(core.packages.len(), 4);
        assert_eq!(core.packages[0].kind, PackageType::Mandatory);
        assert_eq!(
            core.packages[2].requires.as_deref(),
            Some("xorg-x11-server-Xorg")
        );
        assert_eq!(core.packages[3].kind, PackageType::Default);

        assert!(groups[1].uservisible);
        assert_eq!(groups[1].packages[0].name, "emacs");
    }
}
