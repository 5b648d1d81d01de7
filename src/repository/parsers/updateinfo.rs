// src/repository/parsers/updateinfo.rs

//! `updateinfo.xml` parser (advisories)

use super::attr;
use crate::advisory::{Advisory, AdvisoryKind, AdvisoryPackage, AdvisoryReference};
use crate::error::{Error, Result};
use crate::version::Evr;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Text-carrying child of `<update>` being read
#[derive(Clone, Copy)]
enum Field {
    Id,
    Title,
    Severity,
}

fn package(e: &BytesStart) -> AdvisoryPackage {
    let epoch = attr(e, "epoch").and_then(|s| s.parse().ok()).unwrap_or(0);
    AdvisoryPackage {
        name: attr(e, "name").unwrap_or_default(),
        evr: Evr::new(
            epoch,
            attr(e, "version").unwrap_or_default(),
            attr(e, "release").unwrap_or_default(),
        ),
        arch: attr(e, "arch").unwrap_or_default(),
    }
}

fn reference(e: &BytesStart) -> AdvisoryReference {
    AdvisoryReference {
        id: attr(e, "id").unwrap_or_default(),
        kind: attr(e, "type").unwrap_or_default(),
        title: attr(e, "title").unwrap_or_default(),
        url: attr(e, "href").unwrap_or_default(),
    }
}

pub fn parse_updateinfo(xml: &str) -> Result<Vec<Advisory>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut advisories = Vec::new();
    let mut buf = Vec::new();
    let mut current: Option<Advisory> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"update" => {
                    let mut advisory = Advisory::new(
                        "",
                        AdvisoryKind::parse(&attr(&e, "type").unwrap_or_default()),
                    );
                    advisory.status = attr(&e, "status").unwrap_or_default();
                    current = Some(advisory);
                }
                b"id" => field = Some(Field::Id),
                b"title" => field = Some(Field::Title),
                b"severity" => field = Some(Field::Severity),
                b"package" => {
                    if let Some(ref mut advisory) = current {
                        advisory.packages.push(package(&e));
                    }
                }
                b"reference" => {
                    if let Some(ref mut advisory) = current {
                        advisory.references.push(reference(&e));
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"package" => {
                    if let Some(ref mut advisory) = current {
                        advisory.packages.push(package(&e));
                    }
                }
                b"reference" => {
                    if let Some(ref mut advisory) = current {
                        advisory.references.push(reference(&e));
                    }
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let (Some(advisory), Some(field)) = (current.as_mut(), field) {
                    let text = e.unescape().unwrap_or_default();
                    match field {
                        Field::Id => advisory.id.push_str(&text),
                        Field::Title => advisory.title.push_str(&text),
                        Field::Severity => advisory.severity.push_str(&text),
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"update" => {
                    if let Some(advisory) = current.take() {
                        advisories.push(advisory);
                    }
                }
                b"id" | b"title" | b"severity" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "Failed to parse updateinfo.xml: {}",
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(advisories)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_updateinfo() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<updates>
  <update from="updates@fedoraproject.org" status="stable" type="security" version="2.0">
    <id>FEDORA-2024-0a1b2c</id>
    <title>bash-5.2.37-1.fc40</title>
    <issued date="2024-11-02 01:12:44"/>
    <severity>Important</severity>
    <references>
      <reference href="https://bugzilla.redhat.com/2250001" id="2250001" type="bugzilla" title="CVE-2024-0001 bash: overflow"/>
      <reference href="https://www.cve.org/CVERecord?id=CVE-2024-0001" id="CVE-2024-0001" type="cve" title=""/>
    </references>
    <pkglist>
      <collection short="F40">
        <name>Fedora 40</name>
        <package name="bash" version="5.2.37" release="1.fc40" epoch="0" arch="x86_64" src="bash-5.2.37-1.fc40.src.rpm">
          <filename>bash-5.2.37-1.fc40.x86_64.rpm</filename>
        </package>
        <package name="bash-devel" version="5.2.37" release="1.fc40" epoch="0" arch="x86_64"/>
      </collection>
    </pkglist>
  </update>
  <update status="stable" type="enhancement">
    <id>FEDORA-2024-ffee00</id>
    <title>vim update</title>
  </update>
</updates>"#;
        let advisories = parse_updateinfo(xml).unwrap();
        assert_eq!(advisories.len(), 2);

        let sec = &advisories[0];
        assert_eq!(sec.id, "FEDORA-2024-0a1b2c");
        assert_eq!(sec.kind, AdvisoryKind::Security);
        assert_eq!(sec.severity, "Important");
        assert_eq!(sec.status, "stable");
        assert_eq!(sec.references.len(), 2);
        assert_eq!(sec.references[1].kind, "cve");
        assert_eq!(sec.packages.len(), 2);
        assert_eq!(sec.packages[0].name, "bash");
        assert_eq!(sec.packages[0].evr, Evr::new(0, "5.2.37", "1.fc40"));
        // the collection name is not an advisory field
        assert_eq!(sec.title, "bash-5.2.37-1.fc40");

        assert_eq!(advisories[1].kind, AdvisoryKind::Enhancement);
        assert!(advisories[1].packages.is_empty());
    }

    #[test]
    fn test_parse_updateinfo_malformed() {
        assert!(parse_updateinfo("<updates><update><id>x</title></update>").is_err());
    }
}
