//! Pipeline orchestration.
//!
//! Wires the stages together in the only order that is safe:
//!
//! ```text
//! gate → reconcile → walk → merge catalog → persist stores → update state
//! ```
//!
//! Reconciliation must precede the walk, or stale record entries would let
//! the walker skip images whose derived artifact no longer exists. There is
//! no transactional write across the four outputs — a crash between writes
//! leaves a recoverable state that the next run's reconcile pass repairs.
//!
//! Everything a run learns is threaded back through [`RunReport`]; no
//! module-level counters or other ambient state, so concurrent runs in
//! tests cannot interfere.

use crate::catalog::{self, CatalogEntry};
use crate::config::PipelineConfig;
use crate::parse;
use crate::record::{RecordEntry, RecordStore};
use crate::reconcile::{self, PruneReport};
use crate::state::RunState;
use crate::walk::{self, WalkContext, WalkError};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Fatal pipeline failures. Per-image failures never surface here — they
/// land in [`RunSummary::unprocessed`] and the run continues.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Walk(#[from] WalkError),
}

/// Caller switches for one `run` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Bypass the run-state gate.
    pub force: bool,
    /// Rebuild the catalog from scratch instead of appending to it.
    pub full: bool,
}

/// What a run did.
#[derive(Debug)]
pub enum RunReport {
    /// The run-state gate matched: nothing changed since the last pass.
    Skipped { raw_count: usize },
    Completed(Box<RunSummary>),
}

/// Structured summary of a completed pass.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub raw_count: usize,
    /// Entries in the catalog after this pass (0 for optimize-only runs).
    pub catalog_len: usize,
    pub processed: Vec<String>,
    pub unprocessed: Vec<String>,
    /// Skipped via the catalog-level already-known set.
    pub skipped: Vec<String>,
    pub prune: PruneReport,
    /// Corrupt-store notices and similar non-fatal conditions.
    pub warnings: Vec<String>,
}

/// The full pipeline: gate, reconcile, walk, merge, persist.
///
/// Incremental by default — the existing catalog survives and its basenames
/// are excluded from the walk. `opts.full` rebuilds the catalog from the
/// walk alone.
pub fn run(config: &PipelineConfig, opts: RunOptions) -> Result<RunReport, PipelineError> {
    let raw_count = walk::count_raw_images(&config.paths.raw_root)?;

    let mut warnings = Vec::new();
    let (run_state, state_warning) = RunState::load(&config.paths.state_file);
    warnings.extend(state_warning);

    if !opts.force && run_state.should_skip(raw_count) {
        return Ok(RunReport::Skipped { raw_count });
    }

    let summary = full_pass(config, opts, raw_count, warnings, true)?;

    RunState::completed(raw_count).save(&config.paths.state_file)?;
    Ok(RunReport::Completed(Box::new(summary)))
}

/// Optimizer-only pass: derived artifacts and the record store are brought
/// up to date, the catalog and run state are left untouched. Ungated, so it
/// can never mask a later `run` from seeing new images.
pub fn optimize_only(config: &PipelineConfig) -> Result<RunSummary, PipelineError> {
    let raw_count = walk::count_raw_images(&config.paths.raw_root)?;
    full_pass(config, RunOptions::default(), raw_count, Vec::new(), false)
}

fn full_pass(
    config: &PipelineConfig,
    opts: RunOptions,
    raw_count: usize,
    mut warnings: Vec<String>,
    update_catalog: bool,
) -> Result<RunSummary, PipelineError> {
    let (raw, non_images) = walk::enumerate(&config.paths.raw_root)?;

    let (mut store, record_warning) = RecordStore::load(&config.paths.record_file);
    warnings.extend(record_warning);

    // Repair drift before any skip decision trusts the store.
    let raw_basenames: HashSet<String> = raw.iter().map(|i| i.basename.clone()).collect();
    let prune = reconcile::prune(&mut store, &raw_basenames, &config.paths.derived_root);

    let (existing, known) = if update_catalog && !opts.full {
        let (mut existing, catalog_warning) = catalog::load(&config.paths.catalog_file);
        warnings.extend(catalog_warning);
        // Entries whose raw image is gone are orphans too: dropping them
        // here keeps the catalog equal to what the tree can still back.
        existing.retain(|entry| raw_basenames.contains(entry.basename()));
        let known = catalog::known_basenames(&existing);
        (existing, Some(known))
    } else {
        (Vec::new(), None)
    };

    let settings = config.optimizer.to_settings();
    let ctx = WalkContext {
        derived_root: &config.paths.derived_root,
        settings: &settings,
        verify_content: config.cache.verify_content,
    };
    let mut outcome = walk::build(&raw, &mut store, known.as_ref(), &ctx)?;
    outcome.unprocessed.extend(non_images);

    let catalog_len = if update_catalog {
        let merged = catalog::merge(existing, outcome.entries);
        catalog::save(&config.paths.catalog_file, &merged)?;
        merged.len()
    } else {
        0
    };

    store.save(&config.paths.record_file)?;

    Ok(RunSummary {
        raw_count,
        catalog_len,
        processed: outcome.processed,
        unprocessed: outcome.unprocessed,
        skipped: outcome.skipped,
        prune,
        warnings,
    })
}

/// Standalone reconciler pass, runnable without touching the optimizer or
/// the catalog.
pub fn clean(config: &PipelineConfig) -> Result<(PruneReport, Vec<String>), PipelineError> {
    let (raw, _) = walk::enumerate(&config.paths.raw_root)?;
    let raw_basenames: HashSet<String> = raw.into_iter().map(|i| i.basename).collect();

    let mut warnings = Vec::new();
    let (mut store, warning) = RecordStore::load(&config.paths.record_file);
    warnings.extend(warning);

    let report = reconcile::prune(&mut store, &raw_basenames, &config.paths.derived_root);
    if !report.is_clean() {
        store.save(&config.paths.record_file)?;
    }
    Ok((report, warnings))
}

/// Bootstrap a record store by pairing raw images with derived artifacts
/// already on disk. Only pairs that exist on both sides get a record.
pub fn seed(config: &PipelineConfig) -> Result<Vec<String>, PipelineError> {
    let (raw, _) = walk::enumerate(&config.paths.raw_root)?;
    let derived = derived_files(&config.paths.derived_root)?;

    let mut store = RecordStore::empty();
    let mut seeded = Vec::new();
    for image in &raw {
        let Some(artifact_name) = derived.get(&image.basename) else {
            continue;
        };
        let artifact_path = config.paths.derived_root.join(artifact_name);
        let original_len = fs::metadata(&image.path)?.len();
        let optimized_len = fs::metadata(&artifact_path)?.len();
        let optimized_ext = Path::new(artifact_name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        store.put(
            image.basename.clone(),
            RecordEntry {
                original_file_size: original_len,
                optimized_file_size: optimized_len,
                original_file_extension: image.extension.clone(),
                optimized_file_extension: optimized_ext,
                source_hash: None,
            },
        );
        seeded.push(image.basename.clone());
    }

    store.save(&config.paths.record_file)?;
    Ok(seeded)
}

/// Summary of a catalog rebuild from the derived-images root.
#[derive(Debug, Default)]
pub struct RebuildReport {
    pub catalog_len: usize,
    /// Derived files whose names did not parse.
    pub unparsed: Vec<String>,
}

/// Regenerate the catalog purely from the derived-images root, treating it
/// as the source of truth. Recovers a lost or corrupt catalog without
/// re-optimizing anything.
pub fn rebuild(config: &PipelineConfig) -> Result<RebuildReport, PipelineError> {
    let derived_root = &config.paths.derived_root;
    if !derived_root.is_dir() {
        return Err(WalkError::RootUnreadable(derived_root.clone()).into());
    }

    let asset_prefix = format!(
        "/{}",
        derived_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    let mut names: Vec<String> = fs::read_dir(derived_root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    let mut entries = Vec::new();
    let mut unparsed = Vec::new();
    for name in names {
        match parse::parse_timestamp(&name) {
            Some(stamp) => {
                let format = Path::new(&name)
                    .extension()
                    .map(|e| e.to_string_lossy().to_lowercase())
                    .unwrap_or_default();
                let asset_path = format!("{asset_prefix}/{name}");
                entries.push(CatalogEntry::new(name, format, &stamp, asset_path));
            }
            None => unparsed.push(name),
        }
    }

    catalog::sort_newest_first(&mut entries);
    catalog::save(&config.paths.catalog_file, &entries)?;

    Ok(RebuildReport {
        catalog_len: entries.len(),
        unparsed,
    })
}

/// Read-only snapshot of all stores and the drift between them.
#[derive(Debug)]
pub struct StatusReport {
    pub raw_count: usize,
    pub derived_count: usize,
    pub record_count: usize,
    pub catalog_len: usize,
    pub state: RunState,
    /// What a reconcile pass would remove right now.
    pub pending_prune: PruneReport,
}

impl StatusReport {
    /// Would the gate skip the next `run`?
    pub fn gate_would_skip(&self) -> bool {
        self.state.should_skip(self.raw_count)
    }
}

/// Inspect counts and drift without modifying anything.
pub fn status(config: &PipelineConfig) -> Result<StatusReport, PipelineError> {
    let (raw, _) = walk::enumerate(&config.paths.raw_root)?;
    let raw_basenames: HashSet<String> = raw.iter().map(|i| i.basename.clone()).collect();

    let (store, _) = RecordStore::load(&config.paths.record_file);
    let record_count = store.len();
    let mut probe = store;
    let pending_prune = reconcile::prune(&mut probe, &raw_basenames, &config.paths.derived_root);

    let (entries, _) = catalog::load(&config.paths.catalog_file);
    let (state, _) = RunState::load(&config.paths.state_file);

    Ok(StatusReport {
        raw_count: raw.len(),
        derived_count: reconcile::derived_basenames(&config.paths.derived_root).len(),
        record_count,
        catalog_len: entries.len(),
        state,
        pending_prune,
    })
}

/// Map basename → file name for the flat derived directory.
fn derived_files(derived_root: &Path) -> Result<std::collections::HashMap<String, String>, PipelineError> {
    let mut map = std::collections::HashMap::new();
    let Ok(entries) = fs::read_dir(derived_root) else {
        return Ok(map);
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            map.insert(
                stem.to_string_lossy().into_owned(),
                entry.file_name().to_string_lossy().into_owned(),
            );
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PathsConfig;
    use crate::test_helpers::write_jpeg;
    use tempfile::TempDir;

    fn test_config(base: &Path) -> PipelineConfig {
        PipelineConfig {
            paths: PathsConfig {
                raw_root: base.join("images"),
                derived_root: base.join("images_optimized"),
                record_file: base.join("optimization-record.json"),
                state_file: base.join("run-state.json"),
                catalog_file: base.join("catalog.json"),
            },
            ..PipelineConfig::default()
        }
    }

    fn expect_completed(report: RunReport) -> RunSummary {
        match report {
            RunReport::Completed(summary) => *summary,
            RunReport::Skipped { raw_count } => {
                panic!("expected a full pass, gate skipped at {raw_count}")
            }
        }
    }

    #[test]
    fn missing_raw_root_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let result = run(&config, RunOptions::default());
        assert!(matches!(
            result,
            Err(PipelineError::Walk(WalkError::RootUnreadable(_)))
        ));
    }

    #[test]
    fn first_run_builds_everything() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_2024-12-04_170033.jpg"),
            8,
            8,
        );
        write_jpeg(&config.paths.raw_root.join("IMG_1234.jpg"), 8, 8);

        let summary = expect_completed(run(&config, RunOptions::default()).unwrap());

        assert_eq!(summary.raw_count, 2);
        assert_eq!(summary.catalog_len, 1);
        assert_eq!(summary.processed.len(), 1);
        assert_eq!(summary.unprocessed, vec!["IMG_1234.jpg".to_string()]);

        assert!(config.paths.catalog_file.exists());
        assert!(config.paths.record_file.exists());
        assert!(config.paths.state_file.exists());
        assert!(
            config
                .paths
                .derived_root
                .join("Screenshot_2024-12-04_170033.webp")
                .exists()
        );
    }

    #[test]
    fn second_run_is_gated() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_2024-12-04_170033.jpg"),
            8,
            8,
        );

        expect_completed(run(&config, RunOptions::default()).unwrap());
        let second = run(&config, RunOptions::default()).unwrap();
        assert!(matches!(second, RunReport::Skipped { raw_count: 1 }));
    }

    #[test]
    fn force_bypasses_gate() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_2024-12-04_170033.jpg"),
            8,
            8,
        );

        expect_completed(run(&config, RunOptions::default()).unwrap());
        let forced = run(
            &config,
            RunOptions {
                force: true,
                ..RunOptions::default()
            },
        )
        .unwrap();
        let summary = expect_completed(forced);
        // Record hit: no re-optimization, but the entry is still cataloged.
        assert_eq!(summary.catalog_len, 1);
    }

    #[test]
    fn incremental_run_appends_new_image_only() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );
        expect_completed(run(&config, RunOptions::default()).unwrap());

        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20250101_000000.jpg"),
            8,
            8,
        );
        let summary = expect_completed(run(&config, RunOptions::default()).unwrap());

        // The first image is excluded at the catalog level, the new one appended.
        assert_eq!(summary.skipped, vec!["Screenshot_20240101_000000.jpg".to_string()]);
        assert_eq!(summary.catalog_len, 2);

        let (entries, _) = catalog::load(&config.paths.catalog_file);
        assert_eq!(entries[0].yyyy, 2025);
        assert_eq!(entries[1].yyyy, 2024);
    }

    #[test]
    fn incremental_run_drops_catalog_entries_for_deleted_images() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        let doomed = config.paths.raw_root.join("Screenshot_20240101_000000.jpg");
        write_jpeg(&doomed, 8, 8);
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240202_000000.jpg"),
            8,
            8,
        );
        expect_completed(run(&config, RunOptions::default()).unwrap());

        // External delete changes the count, so the gate opens.
        fs::remove_file(&doomed).unwrap();
        let summary = expect_completed(run(&config, RunOptions::default()).unwrap());

        assert_eq!(summary.catalog_len, 1);
        assert_eq!(
            summary.prune.orphaned,
            vec!["Screenshot_20240101_000000".to_string()]
        );

        let (entries, _) = catalog::load(&config.paths.catalog_file);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].basename(), "Screenshot_20240202_000000");
    }

    #[test]
    fn full_run_rebuilds_catalog_from_walk() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );
        expect_completed(run(&config, RunOptions::default()).unwrap());

        // Poison the catalog with an entry whose raw image never existed.
        let (mut entries, _) = catalog::load(&config.paths.catalog_file);
        entries[0].file_name = "Screenshot_19990101_000000.jpg".into();
        catalog::save(&config.paths.catalog_file, &entries).unwrap();

        let summary = expect_completed(
            run(
                &config,
                RunOptions {
                    force: true,
                    full: true,
                },
            )
            .unwrap(),
        );
        assert_eq!(summary.catalog_len, 1);

        let (rebuilt, _) = catalog::load(&config.paths.catalog_file);
        assert_eq!(rebuilt[0].file_name, "Screenshot_20240101_000000.jpg");
    }

    #[test]
    fn reconcile_runs_before_skip_decisions() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );
        expect_completed(run(&config, RunOptions::default()).unwrap());

        // Delete the derived artifact behind the record store's back.
        let artifact = config
            .paths
            .derived_root
            .join("Screenshot_20240101_000000.webp");
        fs::remove_file(&artifact).unwrap();

        let summary = expect_completed(
            run(
                &config,
                RunOptions {
                    force: true,
                    full: true,
                },
            )
            .unwrap(),
        );

        // The stale record was pruned, so the image was re-optimized.
        assert_eq!(
            summary.prune.missing_artifacts,
            vec!["Screenshot_20240101_000000".to_string()]
        );
        assert!(artifact.exists());
    }

    #[test]
    fn optimize_only_leaves_catalog_and_state_alone() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );

        let summary = optimize_only(&config).unwrap();
        assert_eq!(summary.processed.len(), 1);
        assert!(
            config
                .paths
                .derived_root
                .join("Screenshot_20240101_000000.webp")
                .exists()
        );
        assert!(!config.paths.catalog_file.exists());
        assert!(!config.paths.state_file.exists());
    }

    #[test]
    fn clean_prunes_orphans_standalone() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        fs::create_dir_all(&config.paths.derived_root).unwrap();

        let mut store = RecordStore::empty();
        store.put(
            "ghost".into(),
            RecordEntry {
                original_file_size: 1,
                optimized_file_size: 1,
                original_file_extension: "jpg".into(),
                optimized_file_extension: "webp".into(),
                source_hash: None,
            },
        );
        store.save(&config.paths.record_file).unwrap();

        let (report, _) = clean(&config).unwrap();
        assert_eq!(report.orphaned, vec!["ghost".to_string()]);

        let (reloaded, _) = RecordStore::load(&config.paths.record_file);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn seed_pairs_raw_with_existing_artifacts() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        fs::create_dir_all(&config.paths.derived_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240102_000000.jpg"),
            8,
            8,
        );
        fs::write(
            config
                .paths
                .derived_root
                .join("Screenshot_20240101_000000.webp"),
            "webp bytes",
        )
        .unwrap();

        let seeded = seed(&config).unwrap();
        assert_eq!(seeded, vec!["Screenshot_20240101_000000".to_string()]);

        let (store, _) = RecordStore::load(&config.paths.record_file);
        assert_eq!(store.len(), 1);
        let entry = store.get("Screenshot_20240101_000000").unwrap();
        assert_eq!(entry.optimized_file_extension, "webp");
        assert!(entry.original_file_size > 0);
    }

    #[test]
    fn rebuild_regenerates_catalog_from_derived_root() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.derived_root).unwrap();
        fs::write(
            config
                .paths
                .derived_root
                .join("Screenshot_20240101_000000.webp"),
            "x",
        )
        .unwrap();
        fs::write(
            config
                .paths
                .derived_root
                .join("Screenshot_20250101_000000.webp"),
            "x",
        )
        .unwrap();
        fs::write(config.paths.derived_root.join("unparsable.webp"), "x").unwrap();

        let report = rebuild(&config).unwrap();
        assert_eq!(report.catalog_len, 2);
        assert_eq!(report.unparsed, vec!["unparsable.webp".to_string()]);

        let (entries, _) = catalog::load(&config.paths.catalog_file);
        assert_eq!(entries[0].yyyy, 2025);
        assert_eq!(entries[0].file_format, "webp");
        assert_eq!(
            entries[0].asset_path,
            "/images_optimized/Screenshot_20250101_000000.webp"
        );
    }

    #[test]
    fn status_reports_counts_and_pending_drift() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        fs::create_dir_all(&config.paths.raw_root).unwrap();
        write_jpeg(
            &config.paths.raw_root.join("Screenshot_20240101_000000.jpg"),
            8,
            8,
        );
        expect_completed(run(&config, RunOptions::default()).unwrap());

        let report = status(&config).unwrap();
        assert_eq!(report.raw_count, 1);
        assert_eq!(report.derived_count, 1);
        assert_eq!(report.record_count, 1);
        assert_eq!(report.catalog_len, 1);
        assert!(report.gate_would_skip());
        assert!(report.pending_prune.is_clean());

        // status never mutates the record store
        let (store, _) = RecordStore::load(&config.paths.record_file);
        assert_eq!(store.len(), 1);
    }
}
