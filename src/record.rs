//! The optimization record store.
//!
//! A persisted map from image basename to optimization bookkeeping. The
//! store is the pipeline's cache: a key being present means "this image has
//! been optimized once — do not re-derive it".
//!
//! ## Cache validity
//!
//! Presence-only by default: no mtime, size, or content comparison happens
//! on a hit, so a raw image replaced in-place under the same name is never
//! re-optimized. That matches the write-once nature of screenshot capture.
//! For trees where sources do mutate, `[cache] verify_content` stores a
//! SHA-256 of the source bytes in each record and a hit additionally
//! requires the stored hash to match.
//!
//! ## Persistence
//!
//! The whole map is loaded at the start of a run and rewritten wholesale
//! (atomically) at the end. A corrupt file loads as empty with a warning;
//! the reconciler and the next walk rebuild it. The serialized form is a
//! plain basename → metadata JSON object.

use crate::persist::{self, Loaded};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// Bookkeeping for one optimized image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEntry {
    /// Source size in bytes.
    pub original_file_size: u64,
    /// Derived artifact size in bytes.
    pub optimized_file_size: u64,
    pub original_file_extension: String,
    pub optimized_file_extension: String,
    /// SHA-256 of the source bytes. Present only when content verification
    /// was enabled at optimization time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_hash: Option<String>,
}

/// Basename-keyed record map. `BTreeMap` keeps the serialized file in a
/// stable order, so an unchanged run rewrites it byte-identically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordStore {
    entries: BTreeMap<String, RecordEntry>,
}

impl RecordStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load from `path`. Missing → empty; corrupt → empty plus a warning
    /// message the caller is expected to surface.
    pub fn load(path: &Path) -> (Self, Option<String>) {
        match persist::load_json(path) {
            Loaded::Value(store) => (store, None),
            Loaded::Missing => (Self::empty(), None),
            Loaded::Corrupt(reason) => (
                Self::empty(),
                Some(format!(
                    "Warning: optimization record store is unreadable ({reason}); starting empty"
                )),
            ),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        persist::save_json_atomic(path, self)
    }

    pub fn has(&self, basename: &str) -> bool {
        self.entries.contains_key(basename)
    }

    pub fn get(&self, basename: &str) -> Option<&RecordEntry> {
        self.entries.get(basename)
    }

    pub fn put(&mut self, basename: String, entry: RecordEntry) {
        self.entries.insert(basename, entry);
    }

    pub fn remove(&mut self, basename: &str) -> Option<RecordEntry> {
        self.entries.remove(basename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in stable (sorted) order.
    pub fn basenames(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Cache-validity check for one basename.
    ///
    /// With `source_hash = None` (presence-only mode) any entry counts as
    /// current. With a hash, the entry must carry a matching stored hash —
    /// an entry written without one never verifies, forcing one re-derive
    /// that backfills it.
    pub fn is_current(&self, basename: &str, source_hash: Option<&str>) -> bool {
        match (self.get(basename), source_hash) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(entry), Some(hash)) => entry.source_hash.as_deref() == Some(hash),
        }
    }
}

/// SHA-256 of a byte buffer as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
