//! Drift detection and record-store repair.
//!
//! The record store, the raw-image tree, and the derived-images directory
//! are mutated by different actors (this pipeline, external deletes, crash
//! recovery), so they drift. Reconciliation is the only repair mechanism:
//!
//! - **Orphans** — record keys whose raw image no longer exists — are
//!   removed so the store never claims more than the tree holds.
//! - **Missing artifacts** — record keys whose derived file is gone — are
//!   removed so presence-only caching cannot skip an image whose artifact
//!   no longer exists. Removal forces re-optimization on the next walk.
//!
//! Drift is not an error: every removal is reported for observability and
//! the run continues. Reconciliation must run before the walker makes skip
//! decisions, otherwise stale records hide missing artifacts for one more
//! pass.

use crate::record::RecordStore;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// What one reconciliation pass removed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    /// Record keys with no corresponding raw image.
    pub orphaned: Vec<String>,
    /// Record keys whose derived artifact is missing on disk.
    pub missing_artifacts: Vec<String>,
}

impl PruneReport {
    pub fn removed(&self) -> usize {
        self.orphaned.len() + self.missing_artifacts.len()
    }

    pub fn is_clean(&self) -> bool {
        self.orphaned.is_empty() && self.missing_artifacts.is_empty()
    }
}

/// Basenames of the files in the flat derived-images directory.
///
/// A missing directory reads as empty — every record then counts as
/// missing its artifact, which is exactly the repair a wiped derived root
/// needs.
pub fn derived_basenames(derived_root: &Path) -> HashSet<String> {
    let Ok(entries) = fs::read_dir(derived_root) else {
        return HashSet::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .collect()
}

/// Remove stale record entries. See the module docs for the two rules.
pub fn prune(
    store: &mut RecordStore,
    raw_basenames: &HashSet<String>,
    derived_root: &Path,
) -> PruneReport {
    let derived = derived_basenames(derived_root);
    let mut report = PruneReport::default();

    let keys: Vec<String> = store.basenames().map(str::to_string).collect();
    for key in keys {
        if !raw_basenames.contains(&key) {
            store.remove(&key);
            report.orphaned.push(key);
        } else if !derived.contains(&key) {
            store.remove(&key);
            report.missing_artifacts.push(key);
        }
    }

    report
}
