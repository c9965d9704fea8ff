//! JSON-file persistence for the record store, run state, and catalog.
//!
//! All three stores are single JSON files loaded wholesale at the start of a
//! run and rewritten wholesale at the end. Two policies are fixed here so
//! every store behaves identically:
//!
//! - **Reads**: a missing file is normal (first run); a malformed file is
//!   reported to the caller as [`Loaded::Corrupt`] so it can log a warning
//!   and continue with an empty value. The reconciler repairs whatever drift
//!   an emptied store introduces on the same pass, so aborting would only
//!   trade a full reprocess for a dead pipeline.
//! - **Writes**: temp-file-plus-rename, so a crash mid-write leaves the
//!   previous file intact instead of a truncated one.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io;
use std::path::Path;

/// Outcome of loading a JSON store from disk.
#[derive(Debug)]
pub enum Loaded<T> {
    Value(T),
    /// File does not exist — a fresh start, not an error.
    Missing,
    /// File exists but could not be read or parsed.
    Corrupt(String),
}

/// Read and deserialize a JSON file.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Loaded<T> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Loaded::Missing,
        Err(e) => return Loaded::Corrupt(e.to_string()),
    };
    match serde_json::from_str(&text) {
        Ok(value) => Loaded::Value(value),
        Err(e) => Loaded::Corrupt(e.to_string()),
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
///
/// Writes to a sibling `.tmp` file first, then renames over the target, so
/// readers never observe a partially written store.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("not a file path: {}", path.display())))?;
    let tmp = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}
