//! The run-state gate.
//!
//! A single persisted counter lets a run skip all work when nothing has
//! changed: if the current raw-image count equals the count recorded after
//! the last full pass (and `forceUpdate` is unset), the pipeline exits
//! before touching the record store, the optimizer, or the catalog.
//!
//! The gate is a coarse, count-based heuristic. It cannot see
//! count-preserving drift — N images removed and N different ones added —
//! which is why `forceUpdate` exists and why the reconciler's raw-vs-record
//! comparison runs independently on every full pass.

use crate::persist::{self, Loaded};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Persisted gate state. A corrupt or missing file loads as the default,
/// which never gates (count 0 only matches an empty tree, where skipping
/// is correct anyway).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunState {
    pub total_images_processed: usize,
    pub force_update: bool,
}

impl RunState {
    pub fn load(path: &Path) -> (Self, Option<String>) {
        match persist::load_json(path) {
            Loaded::Value(state) => (state, None),
            Loaded::Missing => (Self::default(), None),
            Loaded::Corrupt(reason) => (
                Self::default(),
                Some(format!(
                    "Warning: run-state file is unreadable ({reason}); forcing a full pass"
                )),
            ),
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        persist::save_json_atomic(path, self)
    }

    /// Gate decision: skip the run entirely?
    pub fn should_skip(&self, current_raw_count: usize) -> bool {
        !self.force_update && current_raw_count == self.total_images_processed
    }

    /// State to persist after a completed full pass: the fresh count, with
    /// any pending force flag consumed.
    pub fn completed(raw_count: usize) -> Self {
        Self {
            total_images_processed: raw_count,
            force_update: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn unchanged_count_skips() {
        let state = RunState::completed(42);
        assert!(state.should_skip(42));
    }

    #[test]
    fn changed_count_runs() {
        let state = RunState::completed(42);
        assert!(!state.should_skip(43));
        assert!(!state.should_skip(41));
    }

    #[test]
    fn force_update_overrides_matching_count() {
        let state = RunState {
            total_images_processed: 42,
            force_update: true,
        };
        assert!(!state.should_skip(42));
    }

    #[test]
    fn completed_consumes_force_flag() {
        let state = RunState::completed(7);
        assert_eq!(state.total_images_processed, 7);
        assert!(!state.force_update);
    }

    #[test]
    fn roundtrips_with_camel_case_field_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run-state.json");

        RunState::completed(9).save(&path).unwrap();
        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains(r#""totalImagesProcessed": 9"#));
        assert!(json.contains(r#""forceUpdate": false"#));

        let (loaded, warning) = RunState::load(&path);
        assert!(warning.is_none());
        assert_eq!(loaded, RunState::completed(9));
    }

    #[test]
    fn missing_file_defaults_without_warning() {
        let tmp = TempDir::new().unwrap();
        let (state, warning) = RunState::load(&tmp.path().join("absent.json"));
        assert_eq!(state, RunState::default());
        assert!(warning.is_none());
    }

    #[test]
    fn corrupt_file_defaults_with_warning() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run-state.json");
        fs::write(&path, "not json").unwrap();

        let (state, warning) = RunState::load(&path);
        assert_eq!(state, RunState::default());
        assert!(warning.unwrap().contains("run-state"));
    }

    #[test]
    fn externally_set_force_flag_is_honored() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run-state.json");
        fs::write(
            &path,
            r#"{"totalImagesProcessed": 5, "forceUpdate": true}"#,
        )
        .unwrap();

        let (state, _) = RunState::load(&path);
        assert!(!state.should_skip(5));
    }
}
