// src/repository/parsers/primary.rs

//! `primary.xml` parser
//!
//! Produces one `PackageData` per `<package>` element, including its
//! dependencies and the primary subset of its files.

use super::{attr, version_attrs};
use crate::error::{Error, Result};
use crate::rpm::{CmpOp, DepKind, PackageData, Reldep};
use crate::version::Evr;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

/// Parse primary.xml and extract package metadata
pub fn parse_primary(xml: &str) -> Result<Vec<PackageData>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut packages = Vec::new();
    let mut buf = Vec::new();

    let mut current_package: Option<PackageBuilder> = None;
    let mut current_tag = String::new();
    let mut dep_kind: Option<DepKind> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag_name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();

                match tag_name.as_str() {
                    "package" => {
                        current_package = Some(PackageBuilder::new());
                    }
                    "checksum" => {
                        if let Some(ref mut pkg) = current_package {
                            pkg.checksum_type = attr(&e, "type");
                        }
                    }
                    other => {
                        if let Some(kind) = DepKind::from_element(other) {
                            dep_kind = Some(kind);
                        }
                    }
                }
                current_tag = tag_name;
            }
            Ok(Event::Empty(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let tag_name = e.local_name();
                    match tag_name.as_ref() {
                        b"version" => pkg.evr = Some(version_attrs(&e)),
                        b"time" => {
                            pkg.build_time = attr(&e, "build").and_then(|t| t.parse().ok());
                        }
                        b"size" => {
                            pkg.download_size = attr(&e, "package").and_then(|s| s.parse().ok());
                            pkg.install_size = attr(&e, "installed").and_then(|s| s.parse().ok());
                        }
                        b"location" => pkg.location = attr(&e, "href"),
                        b"entry" => {
                            if let Some(kind) = dep_kind {
                                pkg.add_entry(kind, &e);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let text = e.unescape().unwrap_or_default().to_string();
                    pkg.set_text(&current_tag, text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(ref mut pkg) = current_package {
                    let text = String::from_utf8_lossy(&e).to_string();
                    pkg.set_text(&current_tag, text);
                }
            }
            Ok(Event::End(e)) => {
                let tag_name = e.local_name();
                if tag_name.as_ref() == b"package" {
                    if let Some(builder) = current_package.take() {
                        match builder.build() {
                            Ok(pkg) => packages.push(pkg),
                            Err(e) => warn!("Skipping malformed package in primary.xml: {}", e),
                        }
                    }
                } else if DepKind::from_element(&String::from_utf8_lossy(tag_name.as_ref()))
                    .is_some()
                {
                    dep_kind = None;
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::ParseError(format!(
                    "Failed to parse primary.xml at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    debug!("Parsed {} packages from primary.xml", packages.len());
    Ok(packages)
}

/// Build a `Reldep` from a `<rpm:entry>` element
pub(crate) fn entry_reldep(e: &BytesStart) -> Option<Reldep> {
    let name = attr(e, "name")?;
    let op = attr(e, "flags").and_then(|f| CmpOp::from_repodata(&f));
    match (op, attr(e, "ver")) {
        (Some(op), Some(ver)) => {
            let epoch = attr(e, "epoch").and_then(|s| s.parse().ok()).unwrap_or(0);
            let rel = attr(e, "rel").unwrap_or_default();
            Some(Reldep::versioned(name, op, Evr::new(epoch, ver, rel)))
        }
        _ => Some(Reldep::new(name)),
    }
}

/// Builder for constructing PackageData from XML parsing
#[derive(Default)]
struct PackageBuilder {
    name: Option<String>,
    arch: Option<String>,
    evr: Option<Evr>,
    summary: Option<String>,
    description: Option<String>,
    packager: Option<String>,
    url: Option<String>,
    license: Option<String>,
    vendor: Option<String>,
    sourcerpm: Option<String>,
    checksum: Option<String>,
    checksum_type: Option<String>,
    location: Option<String>,
    download_size: Option<u64>,
    install_size: Option<u64>,
    build_time: Option<i64>,
    deps: Vec<(DepKind, Reldep)>,
    requires_pre: Vec<Reldep>,
    files: Vec<String>,
}

impl PackageBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn set_text(&mut self, tag: &str, text: String) {
        match tag {
            "name" => self.name = Some(text),
            "arch" => self.arch = Some(text),
            "summary" => self.summary = Some(text),
            "description" => self.description = Some(text),
            "packager" => self.packager = Some(text),
            "url" => self.url = Some(text),
            "checksum" => self.checksum = Some(text),
            "license" => self.license = Some(text),
            "vendor" => self.vendor = Some(text),
            "sourcerpm" => self.sourcerpm = Some(text),
            "file" => self.files.push(text),
            _ => {}
        }
    }

    fn add_entry(&mut self, kind: DepKind, e: &BytesStart) {
        let Some(dep) = entry_reldep(e) else {
            return;
        };
        if kind == DepKind::Requires {
            // rpmlib() capabilities are satisfied by rpm itself
            if dep.name.starts_with("rpmlib(") {
                return;
            }
            if attr(e, "pre").is_some_and(|p| p == "1") {
                self.requires_pre.push(dep.clone());
            }
        }
        self.deps.push((kind, dep));
    }

    fn build(self) -> Result<PackageData> {
        let name = self
            .name
            .ok_or_else(|| Error::ParseError("Missing package name".to_string()))?;
        let evr = self
            .evr
            .ok_or_else(|| Error::ParseError(format!("Missing version for {}", name)))?;
        let arch = self
            .arch
            .ok_or_else(|| Error::ParseError(format!("Missing arch for {}", name)))?;

        let mut data = PackageData::new(name, evr, arch);
        data.summary = self.summary.unwrap_or_default();
        data.description = self.description.unwrap_or_default();
        data.packager = self.packager.filter(|s| !s.is_empty());
        data.url = self.url.filter(|s| !s.is_empty());
        data.license = self.license;
        data.vendor = self.vendor.filter(|s| !s.is_empty());
        data.sourcerpm = self.sourcerpm.filter(|s| !s.is_empty());
        data.location = self.location;
        data.checksum = match (self.checksum_type.as_deref(), self.checksum) {
            (Some("sha256") | None, Some(sum)) => Some(sum),
            (Some(kind), Some(sum)) => Some(format!("{}:{}", kind, sum)),
            (_, None) => None,
        };
        data.download_size = self.download_size.unwrap_or(0);
        data.install_size = self.install_size.unwrap_or(0);
        data.build_time = self.build_time.unwrap_or(0);
        for (kind, dep) in self.deps {
            data.deps_mut(kind).push(dep);
        }
        data.requires_pre = self.requires_pre;
        data.files = self.files;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" xmlns:rpm="http://linux.duke.edu/metadata/rpm" packages="2">
<package type="rpm">
  <name>bash</name>
  <arch>x86_64</arch>
  <version epoch="0" ver="5.2.26" rel="3.fc40"/>
  <checksum type="sha256" pkgid="YES">abc123</checksum>
  <summary>The GNU Bourne Again shell</summary>
  <description>The GNU Bourne Again shell (Bash) is a shell &amp; command language interpreter.</description>
  <packager>Fedora Project</packager>
  <url>https://www.gnu.org/software/bash</url>
  <time file="1718000000" build="1717000000"/>
  <size package="1900000" installed="8300000" archive="8400000"/>
  <location href="Packages/b/bash-5.2.26-3.fc40.x86_64.rpm"/>
  <format>
    <rpm:license>GPL-3.0-or-later</rpm:license>
    <rpm:vendor>Fedora Project</rpm:vendor>
    <rpm:sourcerpm>bash-5.2.26-3.fc40.src.rpm</rpm:sourcerpm>
    <rpm:provides>
      <rpm:entry name="bash" flags="EQ" epoch="0" ver="5.2.26" rel="3.fc40"/>
      <rpm:entry name="/bin/sh"/>
    </rpm:provides>
    <rpm:requires>
      <rpm:entry name="filesystem" pre="1"/>
      <rpm:entry name="libc.so.6(GLIBC_2.34)(64bit)"/>
      <rpm:entry name="libtinfo.so.6()(64bit)"/>
      <rpm:entry name="rpmlib(CompressedFileNames)" flags="LE" epoch="0" ver="3.0.4" rel="1"/>
    </rpm:requires>
    <rpm:conflicts>
      <rpm:entry name="filesystem" flags="LT" epoch="0" ver="3"/>
    </rpm:conflicts>
    <file>/usr/bin/bash</file>
    <file>/usr/bin/sh</file>
  </format>
</package>
<package type="rpm">
  <name>fonts-filesystem</name>
  <arch>noarch</arch>
  <version epoch="1" ver="2.0.5" rel="14.fc40"/>
  <checksum type="sha256" pkgid="YES">def456</checksum>
  <summary>Directories used by font packages</summary>
  <description/>
  <location href="Packages/f/fonts-filesystem-2.0.5-14.fc40.noarch.rpm"/>
  <format>
    <rpm:recommends>
      <rpm:entry name="(fontconfig if xorg-x11-server-Xorg)"/>
    </rpm:recommends>
  </format>
</package>
</metadata>"#;

    #[test]
    fn test_parse_primary() {
        let packages = parse_primary(PRIMARY).unwrap();
        assert_eq!(packages.len(), 2);

        let bash = &packages[0];
        assert_eq!(bash.nevra(), "bash-5.2.26-3.fc40.x86_64");
        assert_eq!(bash.summary, "The GNU Bourne Again shell");
        assert!(bash.description.contains("shell & command"));
        assert_eq!(bash.license.as_deref(), Some("GPL-3.0-or-later"));
        assert_eq!(bash.sourcerpm.as_deref(), Some("bash-5.2.26-3.fc40.src.rpm"));
        assert_eq!(bash.checksum.as_deref(), Some("abc123"));
        assert_eq!(bash.download_size, 1900000);
        assert_eq!(bash.install_size, 8300000);
        assert_eq!(bash.build_time, 1717000000);
        assert_eq!(
            bash.location.as_deref(),
            Some("Packages/b/bash-5.2.26-3.fc40.x86_64.rpm")
        );
        assert_eq!(bash.provides.len(), 2);
        assert_eq!(bash.provides[0].to_string(), "bash = 5.2.26-3.fc40");
        assert_eq!(bash.requires.len(), 3);
        assert_eq!(bash.requires_pre.len(), 1);
        assert_eq!(bash.requires_pre[0].name, "filesystem");
        assert_eq!(bash.conflicts[0].to_string(), "filesystem < 3");
        assert_eq!(bash.files, vec!["/usr/bin/bash", "/usr/bin/sh"]);
    }

    #[test]
    fn test_parse_epoch_and_rich_deps() {
        let packages = parse_primary(PRIMARY).unwrap();
        let fonts = &packages[1];
        assert_eq!(fonts.evr.epoch, 1);
        assert_eq!(fonts.full_nevra(), "fonts-filesystem-1:2.0.5-14.fc40.noarch");
        assert!(fonts.recommends[0].is_rich());
        assert!(fonts.description.is_empty());
    }

    #[test]
    fn test_parse_malformed_xml() {
        let err = parse_primary("<metadata><package><name>x</nam></package>").unwrap_err();
        assert!(matches!(err, Error::ParseError(_)));
    }

    #[test]
    fn test_package_without_version_is_skipped() {
        let xml = "<metadata><package><name>broken</name><arch>noarch</arch></package></metadata>";
        assert!(parse_primary(xml).unwrap().is_empty());
    }
}
