// src/repository/parsers/repomd.rs

//! `repodata/repomd.xml` index

use super::attr;
use crate::error::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;

/// One `<data>` record of repomd.xml
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoMdRecord {
    /// Metadata type (`primary`, `filelists`, `other`, `group`, ...)
    pub kind: String,
    pub location: String,
    pub checksum_type: String,
    pub checksum: String,
    pub size: Option<u64>,
    pub timestamp: Option<i64>,
}

/// Parsed repomd.xml
#[derive(Debug, Clone, Default)]
pub struct RepoMd {
    pub revision: Option<String>,
    pub records: Vec<RepoMdRecord>,
}

impl RepoMd {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut repomd = RepoMd::default();
        let mut buf = Vec::new();
        let mut current: Option<RepoMdRecord> = None;
        let mut current_tag = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    current_tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    match current_tag.as_str() {
                        "data" => {
                            current = Some(RepoMdRecord {
                                kind: attr(&e, "type").unwrap_or_default(),
                                ..Default::default()
                            });
                        }
                        "checksum" => {
                            if let Some(ref mut record) = current {
                                record.checksum_type = attr(&e, "type").unwrap_or_default();
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"location" => {
                    if let Some(ref mut record) = current {
                        record.location = attr(&e, "href").unwrap_or_default();
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().unwrap_or_default().to_string();
                    match (current.as_mut(), current_tag.as_str()) {
                        (Some(record), "checksum") => record.checksum = text,
                        (Some(record), "size") => record.size = text.parse().ok(),
                        (Some(record), "timestamp") => {
                            record.timestamp = text.parse::<f64>().ok().map(|t| t as i64)
                        }
                        (None, "revision") => repomd.revision = Some(text),
                        _ => {}
                    }
                }
                Ok(Event::End(e)) => {
                    if e.local_name().as_ref() == b"data" {
                        if let Some(record) = current.take() {
                            repomd.records.push(record);
                        }
                    }
                    current_tag.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::ParseError(format!(
                        "Failed to parse repomd.xml: {}",
                        e
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        if repomd.record("primary").is_none() {
            return Err(Error::ParseError(
                "Could not find primary data location in repomd.xml".to_string(),
            ));
        }
        Ok(repomd)
    }

    pub fn record(&self, kind: &str) -> Option<&RepoMdRecord> {
        self.records.iter().find(|r| r.kind == kind)
    }

    /// Newest record timestamp
    pub fn timestamp(&self) -> Option<i64> {
        self.records.iter().filter_map(|r| r.timestamp).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPOMD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<repomd xmlns="http://linux.duke.edu/metadata/repo" xmlns:rpm="http://linux.duke.edu/metadata/rpm">
  <revision>1718000000</revision>
  <data type="primary">
    <checksum type="sha256">aaaa</checksum>
    <open-checksum type="sha256">bbbb</open-checksum>
    <location href="repodata/aaaa-primary.xml.gz"/>
    <timestamp>1718000000</timestamp>
    <size>1234</size>
  </data>
  <data type="filelists">
    <checksum type="sha256">cccc</checksum>
    <location href="repodata/cccc-filelists.xml.zst"/>
    <timestamp>1718000100</timestamp>
  </data>
</repomd>"#;

    #[test]
    fn test_parse_repomd() {
        let repomd = RepoMd::parse(REPOMD).unwrap();
        assert_eq!(repomd.revision.as_deref(), Some("1718000000"));
        assert_eq!(repomd.records.len(), 2);

        let primary = repomd.record("primary").unwrap();
        assert_eq!(primary.location, "repodata/aaaa-primary.xml.gz");
        assert_eq!(primary.checksum_type, "sha256");
        assert_eq!(primary.checksum, "aaaa");
        assert_eq!(primary.size, Some(1234));

        assert_eq!(repomd.record("filelists").unwrap().checksum, "cccc");
        assert!(repomd.record("other").is_none());
        assert_eq!(repomd.timestamp(), Some(1718000100));
    }

    #[test]
    fn test_missing_primary() {
        let err = RepoMd::parse("<repomd></repomd>").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }
}
