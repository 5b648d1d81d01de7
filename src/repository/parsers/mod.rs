// src/repository/parsers/mod.rs

//! Repository metadata parsers
//!
//! rpm-md repositories describe themselves with `repodata/repomd.xml`,
//! which references the other metadata files:
//! - primary: package NEVRA, dependencies and primary files
//! - filelists: complete file lists
//! - other: changelogs
//! - group: comps package groups
//! - updateinfo: advisories
//!
//! Metadata files may be compressed with gzip, zstd or xz.

pub mod comps;
pub mod filelists;
pub mod other;
pub mod primary;
pub mod repomd;
pub mod updateinfo;

use crate::error::{Error, Result};
use crate::version::Evr;
use flate2::read::GzDecoder;
use quick_xml::events::BytesStart;
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use xz2::read::XzDecoder;

/// Read a metadata file, decompressing it based on its extension
pub fn read_metadata(path: &Path) -> Result<String> {
    let raw = fs::read(path)?;
    let name = path.to_string_lossy();

    let bytes = if name.ends_with(".gz") {
        debug!("Decompressing gzip-compressed {}", name);
        let mut out = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", name, e)))?;
        out
    } else if name.ends_with(".zst") {
        debug!("Decompressing zstd-compressed {}", name);
        zstd::decode_all(raw.as_slice())
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", name, e)))?
    } else if name.ends_with(".xz") {
        debug!("Decompressing xz-compressed {}", name);
        let mut out = Vec::new();
        XzDecoder::new(raw.as_slice())
            .read_to_end(&mut out)
            .map_err(|e| Error::ParseError(format!("Failed to decompress {}: {}", name, e)))?;
        out
    } else {
        raw
    };

    String::from_utf8(bytes)
        .map_err(|e| Error::ParseError(format!("Invalid UTF-8 in {}: {}", name, e)))
}

/// Value of attribute `key` on an element
pub(crate) fn attr(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes()
        .filter_map(|a| a.ok())
        .find(|a| a.key.as_ref() == key.as_bytes())
        .map(|a| {
            a.unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned())
        })
}

/// EVR from the `epoch`, `ver` and `rel` attributes of a `<version>` element
pub(crate) fn version_attrs(e: &BytesStart) -> Evr {
    let epoch = attr(e, "epoch")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    Evr::new(
        epoch,
        attr(e, "ver").unwrap_or_default(),
        attr(e, "rel").unwrap_or_default(),
    )
}
