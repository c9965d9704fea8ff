//! # shotbook
//!
//! A batch catalog builder for timestamped screenshot libraries. Your
//! filesystem is the data source: a directory tree of raw screenshots goes
//! in, and three derived artifacts come out — web-optimized image files, a
//! per-image optimization record, and a materialized catalog a gallery UI
//! can consume directly.
//!
//! # Architecture: One Gated Pass
//!
//! ```text
//! 1. Gate        run-state.json            (skip everything if nothing changed)
//! 2. Reconcile   record store vs. disk     (prune orphans and missing artifacts)
//! 3. Walk        images/  →  images_optimized/  (parse, optimize, record)
//! 4. Catalog     entries  →  catalog.json  (merge, sort newest-first)
//! ```
//!
//! The pass is incremental at three levels: a count-based gate skips whole
//! runs, the catalog's basename set skips known images, and the record
//! store skips re-optimization. Each level can be bypassed independently
//! (`--force`, `--full`, deleting the record file), and the reconciler
//! repairs whatever drift external actors introduce between runs.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`parse`] | Ordered-pattern timestamp extraction from filenames |
//! | [`optimize`] | Pure resize + re-encode, bytes in → bytes out |
//! | [`record`] | Basename-keyed optimization record store (the cache) |
//! | [`walk`] | Raw-tree enumeration and catalog building |
//! | [`reconcile`] | Drift detection and record-store repair |
//! | [`state`] | Count-based run-state gate |
//! | [`catalog`] | Catalog entries, merging, and newest-first ordering |
//! | [`pipeline`] | Orchestration of the stages above + standalone tools |
//! | [`persist`] | JSON load-or-default and atomic-rename writes |
//! | [`config`] | `shotbook.toml` loading, validation, stock config |
//! | [`output`] | CLI output formatting — pure `format_*` line builders |
//!
//! # Design Decisions
//!
//! ## Presence-Only Caching, Verifiable on Request
//!
//! A record-store key existing means "already optimized, skip". No mtime or
//! hash comparison happens by default — screenshot capture is write-once,
//! and skipping without re-reading unchanged sources is what makes large
//! libraries cheap to re-scan. Trees where sources mutate in place can set
//! `[cache] verify_content`, which stores a SHA-256 per record and
//! re-optimizes on mismatch.
//!
//! ## JSON Files As Stores
//!
//! The record store, run state, and catalog are single JSON files, loaded
//! wholesale and rewritten wholesale through a temp-file-plus-rename so a
//! crash never leaves a truncated store. A corrupt file degrades to empty
//! with a warning rather than aborting: the reconciler plus a full
//! reprocessing pass rebuild everything the file knew. The catalog's entry
//! shape is an external contract shared with the gallery UI.
//!
//! ## Deterministic Output Under Parallelism
//!
//! Image work fans out across a rayon pool, but workers return partial
//! results that are merged in scan order and entries are re-sorted by
//! timestamp (stably) before anything is written. Two runs over the same
//! tree produce byte-identical stores regardless of scheduling.

pub mod catalog;
pub mod config;
pub mod optimize;
pub mod output;
pub mod parse;
pub mod persist;
pub mod pipeline;
pub mod record;
pub mod reconcile;
pub mod state;
pub mod walk;

#[cfg(test)]
pub(crate) mod test_helpers;
