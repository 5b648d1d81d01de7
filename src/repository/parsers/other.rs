// src/repository/parsers/other.rs

//! `other.xml` parser (changelogs)

use super::{attr, version_attrs};
use crate::error::{Error, Result};
use crate::rpm::Changelog;
use crate::version::Evr;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Changelogs of one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtherEntry {
    pub pkgid: String,
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    pub changelogs: Vec<Changelog>,
}

pub fn parse_other(xml: &str) -> Result<Vec<OtherEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<OtherEntry> = None;
    let mut changelog: Option<Changelog> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"package" => {
                    current = Some(OtherEntry {
                        pkgid: attr(&e, "pkgid").unwrap_or_default(),
                        name: attr(&e, "name").unwrap_or_default(),
                        arch: attr(&e, "arch").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"changelog" => {
                    changelog = Some(Changelog {
                        timestamp: attr(&e, "date").and_then(|d| d.parse().ok()).unwrap_or(0),
                        author: attr(&e, "author").unwrap_or_default(),
                        text: String::new(),
                    });
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"version" => {
                if let Some(ref mut entry) = current {
                    entry.evr = version_attrs(&e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut log) = changelog {
                    log.text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"changelog" => {
                    if let (Some(entry), Some(log)) = (current.as_mut(), changelog.take()) {
                        entry.changelogs.push(log);
                    }
                }
                b"package" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!("Failed to parse other.xml: {}", e)));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}
