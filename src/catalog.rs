//! The materialized catalog consumed by the gallery UI.
//!
//! A catalog is a JSON array of entries in strict descending-timestamp
//! order, newest first. The field names (`fileName`, `assetPath`,
//! `meta.type`, …) are an external contract shared with the gallery UI and
//! the move/delete/sort endpoints that operate on entries — they must not
//! change shape.
//!
//! Sorting uses only the composite timestamp as the key; the sort is stable,
//! so entries with identical timestamps keep their input (scan) order. That
//! makes catalog output deterministic regardless of how the walk was
//! parallelized.

use crate::parse::ParsedStamp;
use crate::persist::{self, Loaded};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::Path;

/// One catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "fileName")]
    pub file_name: String,
    /// Extension of the raw source file, without the dot.
    #[serde(rename = "fileFormat")]
    pub file_format: String,
    pub yyyy: u32,
    pub mm: u32,
    pub dd: u32,
    pub hh: u32,
    pub minute: u32,
    pub second: u32,
    /// Web path of the derived artifact, e.g. `/images_optimized/x.webp`.
    #[serde(rename = "assetPath")]
    pub asset_path: String,
    #[serde(rename = "fileDescription")]
    pub file_description: String,
    pub meta: EntryMeta,
}

/// Constant entry metadata; kept as data because the consumer filters on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl EntryMeta {
    pub fn timestamp_image() -> Self {
        Self {
            value: "timestamp".to_string(),
            kind: "image".to_string(),
        }
    }
}

impl CatalogEntry {
    /// Build an entry from its parts.
    pub fn new(file_name: String, file_format: String, stamp: &ParsedStamp, asset_path: String) -> Self {
        Self {
            file_name,
            file_format,
            yyyy: stamp.yyyy,
            mm: stamp.mm,
            dd: stamp.dd,
            hh: stamp.hh,
            minute: stamp.minute,
            second: stamp.second,
            asset_path,
            file_description: stamp.description.clone().unwrap_or_default(),
            meta: EntryMeta::timestamp_image(),
        }
    }

    /// Composite timestamp, most significant field first.
    pub fn timestamp_key(&self) -> (u32, u32, u32, u32, u32, u32) {
        (self.yyyy, self.mm, self.dd, self.hh, self.minute, self.second)
    }

    /// Basename of the raw file — the join key against record store and
    /// derived artifacts.
    pub fn basename(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => &self.file_name,
        }
    }
}

/// Sort newest-first. Stable: equal timestamps keep their input order.
pub fn sort_newest_first(entries: &mut [CatalogEntry]) {
    entries.sort_by(|a, b| b.timestamp_key().cmp(&a.timestamp_key()));
}

/// Append `new` onto `existing` and re-sort the whole catalog.
pub fn merge(existing: Vec<CatalogEntry>, new: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut all = existing;
    all.extend(new);
    sort_newest_first(&mut all);
    all
}

/// Basenames already present — the walker's catalog-level exclusion set.
pub fn known_basenames(entries: &[CatalogEntry]) -> HashSet<String> {
    entries.iter().map(|e| e.basename().to_string()).collect()
}

/// Load a catalog. Missing → empty; corrupt → empty plus a warning.
pub fn load(path: &Path) -> (Vec<CatalogEntry>, Option<String>) {
    match persist::load_json(path) {
        Loaded::Value(entries) => (entries, None),
        Loaded::Missing => (Vec::new(), None),
        Loaded::Corrupt(reason) => (
            Vec::new(),
            Some(format!(
                "Warning: catalog file is unreadable ({reason}); rebuilding from scratch"
            )),
        ),
    }
}

/// Write the catalog atomically. Failure here is fatal to the run.
pub fn save(path: &Path, entries: &[CatalogEntry]) -> io::Result<()> {
    persist::save_json_atomic(path, &entries)
}
