// src/repository/parsers/filelists.rs

//! `filelists.xml` parser

use super::{attr, version_attrs};
use crate::error::{Error, Result};
use crate::version::Evr;
use quick_xml::Reader;
use quick_xml::events::Event;

/// Complete file list of one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilelistEntry {
    pub pkgid: String,
    pub name: String,
    pub arch: String,
    pub evr: Evr,
    pub files: Vec<String>,
}

pub fn parse_filelists(xml: &str) -> Result<Vec<FilelistEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<FilelistEntry> = None;
    let mut in_file = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"package" => {
                    current = Some(FilelistEntry {
                        pkgid: attr(&e, "pkgid").unwrap_or_default(),
                        name: attr(&e, "name").unwrap_or_default(),
                        arch: attr(&e, "arch").unwrap_or_default(),
                        ..Default::default()
                    });
                }
                b"file" => in_file = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"version" => {
                if let Some(ref mut entry) = current {
                    entry.evr = version_attrs(&e);
                }
            }
            Ok(Event::Text(e)) if in_file => {
                if let Some(ref mut entry) = current {
                    entry.files.push(e.unescape().unwrap_or_default().to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"package" => {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                b"file" => in_file = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "Failed to parse filelists.xml: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}
