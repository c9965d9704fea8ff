//! Directory walking and catalog building.
//!
//! Walks the raw-image tree (subdirectories included), decides per image
//! whether the record store lets it skip re-optimization, and assembles
//! catalog entries. The walker owns the per-image
//! parse → optimize → persist-artifact → record sequence; it never writes
//! the catalog or the record file — the caller does, after merging.
//!
//! ## Skip decisions
//!
//! Two independent cache levels, checked in this order:
//!
//! 1. **Catalog-level**: a caller-supplied set of already-known basenames
//!    (from the previous catalog). Hits are skipped entirely — their entries
//!    already exist and are carried over by the caller's merge.
//! 2. **Record-level**: a record-store hit skips the optimizer, but the
//!    filename is still parsed and an entry emitted, pointing at the derived
//!    artifact whose path is reconstructed from basename + target format —
//!    never read back from the record.
//!
//! ## Parallelism and determinism
//!
//! Images fan out across the rayon pool; each worker returns a partial
//! result and `collect` reassembles them in scan order. Record-store
//! writes are merged sequentially afterwards, so no
//! lock guards the map. Basenames are unique, so no two workers write the
//! same artifact path. Entries are re-sorted newest-first before return, so
//! output ordering is independent of worker scheduling.

use crate::catalog::{self, CatalogEntry};
use crate::optimize::{self, OptimizeSettings, OutputFormat};
use crate::parse;
use crate::record::{self, RecordEntry, RecordStore};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum WalkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("raw-image root is not a readable directory: {0}")]
    RootUnreadable(PathBuf),
}

/// Extensions accepted as raw images (case-insensitive).
const RAW_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// A source-of-truth image file under the raw root.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub path: PathBuf,
    /// File stem — the join key between raw image, artifact, and record.
    pub basename: String,
    /// Extension without the dot, lowercased.
    pub extension: String,
    pub directory: PathBuf,
}

impl RawImage {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What one walk produced. The caller owns catalog and store persistence.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// New catalog entries, sorted newest-first.
    pub entries: Vec<CatalogEntry>,
    /// Files that made it into `entries` (freshly optimized or record hits).
    pub processed: Vec<String>,
    /// Files that could not be cataloged: unparsable name, undecodable
    /// image, or unreadable file. The run continues past all of these.
    pub unprocessed: Vec<String>,
    /// Files excluded by the caller's already-known set.
    pub skipped: Vec<String>,
}

/// Walk-wide inputs that are not per-image.
#[derive(Debug)]
pub struct WalkContext<'a> {
    pub derived_root: &'a Path,
    pub settings: &'a OptimizeSettings,
    /// Compare source hashes instead of trusting key presence.
    pub verify_content: bool,
}

fn is_raw_extension(ext: &str) -> bool {
    RAW_EXTENSIONS.contains(&ext)
}

/// Count raw images under `root` without building anything.
///
/// This is the run-state gate's only input — kept separate from
/// [`enumerate`] so a gated run does no work beyond the count.
pub fn count_raw_images(root: &Path) -> Result<usize, WalkError> {
    if !root.is_dir() {
        return Err(WalkError::RootUnreadable(root.to_path_buf()));
    }
    Ok(WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|e| is_raw_extension(&e.to_string_lossy().to_lowercase()))
                .unwrap_or(false)
        })
        .count())
}

/// Enumerate raw images under `root` in stable (sorted) scan order.
///
/// Returns the images plus the names of non-image files encountered, which
/// the caller reports as unprocessed.
pub fn enumerate(root: &Path) -> Result<(Vec<RawImage>, Vec<String>), WalkError> {
    if !root.is_dir() {
        return Err(WalkError::RootUnreadable(root.to_path_buf()));
    }

    let mut images = Vec::new();
    let mut non_images = Vec::new();

    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
    {
        let path = entry.path();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if !is_raw_extension(&extension) {
            non_images.push(file_name);
            continue;
        }

        let basename = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        images.push(RawImage {
            basename,
            extension,
            directory: path.parent().unwrap_or(root).to_path_buf(),
            path: path.to_path_buf(),
        });
    }

    Ok((images, non_images))
}

/// Build catalog entries for `raw`, optimizing whatever the record store
/// does not already cover.
///
/// `known` is the optional catalog-level exclusion set: basenames already
/// present in a previous catalog are skipped entirely. Record-store updates
/// accumulate into `store`; the caller persists it.
pub fn build(
    raw: &[RawImage],
    store: &mut RecordStore,
    known: Option<&HashSet<String>>,
    ctx: &WalkContext<'_>,
) -> Result<WalkOutcome, WalkError> {
    fs::create_dir_all(ctx.derived_root)?;

    let asset_prefix = asset_prefix(ctx.derived_root);

    // Fan out over a shared read-only view of the store; collect preserves
    // scan order.
    let store_view: &RecordStore = store;
    let results: Vec<ItemOutcome> = raw
        .par_iter()
        .map(|image| process_one(image, store_view, known, ctx, &asset_prefix))
        .collect();

    // Sequential merge of per-worker partial results.
    let mut outcome = WalkOutcome::default();
    for result in results {
        match result {
            ItemOutcome::Entry {
                entry,
                file_name,
                record,
            } => {
                if let Some((basename, record_entry)) = record {
                    store.put(basename, record_entry);
                }
                outcome.entries.push(entry);
                outcome.processed.push(file_name);
            }
            ItemOutcome::Unprocessed { file_name } => outcome.unprocessed.push(file_name),
            ItemOutcome::Skipped { file_name } => outcome.skipped.push(file_name),
        }
    }

    catalog::sort_newest_first(&mut outcome.entries);
    Ok(outcome)
}

/// Web path prefix for derived artifacts, e.g. `/images_optimized`.
fn asset_prefix(derived_root: &Path) -> String {
    format!(
        "/{}",
        derived_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    )
}

/// Derived-artifact encoding for one raw image.
///
/// With `preserve_format` the target follows the raw file's extension, so
/// the artifact path stays reconstructable without reading the source.
fn effective_format(image: &RawImage, settings: &OptimizeSettings) -> OutputFormat {
    if settings.preserve_format {
        OutputFormat::from_extension(&image.extension).unwrap_or(settings.format)
    } else {
        settings.format
    }
}

enum ItemOutcome {
    Entry {
        entry: CatalogEntry,
        file_name: String,
        record: Option<(String, RecordEntry)>,
    },
    Unprocessed {
        file_name: String,
    },
    Skipped {
        file_name: String,
    },
}

fn process_one(
    image: &RawImage,
    store: &RecordStore,
    known: Option<&HashSet<String>>,
    ctx: &WalkContext<'_>,
    asset_prefix: &str,
) -> ItemOutcome {
    let file_name = image.file_name();

    if let Some(known) = known
        && known.contains(&image.basename)
    {
        return ItemOutcome::Skipped { file_name };
    }

    let format = effective_format(image, ctx.settings);

    // Cache check. Content verification needs the source bytes up front;
    // presence-only mode reads nothing on a hit.
    let (cache_hit, prefetched) = if ctx.verify_content {
        match fs::read(&image.path) {
            Ok(bytes) => {
                let hash = record::hash_bytes(&bytes);
                let hit = store.is_current(&image.basename, Some(&hash));
                (hit, Some((bytes, hash)))
            }
            Err(_) => (false, None),
        }
    } else {
        (store.is_current(&image.basename, None), None)
    };

    let Some(stamp) = parse::parse_timestamp(&file_name) else {
        return ItemOutcome::Unprocessed { file_name };
    };

    let asset_path = format!("{asset_prefix}/{}.{}", image.basename, format.extension());
    let entry = CatalogEntry::new(file_name.clone(), image.extension.clone(), &stamp, asset_path);

    if cache_hit {
        return ItemOutcome::Entry {
            entry,
            file_name,
            record: None,
        };
    }

    let (bytes, hash) = match prefetched {
        Some((bytes, hash)) => (bytes, Some(hash)),
        None => match fs::read(&image.path) {
            Ok(bytes) => (bytes, None),
            Err(_) => return ItemOutcome::Unprocessed { file_name },
        },
    };

    // The effective format is pinned per file, so encode and artifact path
    // always agree even in preserve-format mode.
    let per_image = OptimizeSettings {
        format,
        preserve_format: false,
        ..ctx.settings.clone()
    };
    let optimized = match optimize::optimize(&bytes, &per_image) {
        Ok(optimized) => optimized,
        Err(_) => return ItemOutcome::Unprocessed { file_name },
    };

    let artifact = ctx
        .derived_root
        .join(format!("{}.{}", image.basename, format.extension()));
    if fs::write(&artifact, &optimized.bytes).is_err() {
        return ItemOutcome::Unprocessed { file_name };
    }

    let record_entry = RecordEntry {
        original_file_size: bytes.len() as u64,
        optimized_file_size: optimized.bytes.len() as u64,
        original_file_extension: image.extension.clone(),
        optimized_file_extension: format.extension().to_string(),
        source_hash: if ctx.verify_content {
            hash.or_else(|| Some(record::hash_bytes(&bytes)))
        } else {
            None
        },
    };

    ItemOutcome::Entry {
        entry,
        file_name,
        record: Some((image.basename.clone(), record_entry)),
    }
}
