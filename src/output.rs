//! CLI output formatting.
//!
//! Each report type has a `format_*` function returning `Vec<String>` for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.
//!
//! Output is information-centric: the headline is what happened (counts,
//! drift repaired), with per-file details as indented context underneath.
//!
//! ```text
//! --- Run Summary ---
//! 14 files processed (including cached)
//! 2 files could not be processed:
//!     IMG_1234.jpg
//!     notes.txt
//! Catalog written with 14 entries
//! ```

use crate::pipeline::{RebuildReport, RunReport, RunSummary, StatusReport};
use crate::reconcile::PruneReport;

/// Indented list of filenames under a header line.
fn push_file_list(lines: &mut Vec<String>, header: String, files: &[String]) {
    lines.push(header);
    for file in files {
        lines.push(format!("    {file}"));
    }
}

/// Format the outcome of a `run` invocation.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    match report {
        RunReport::Skipped { raw_count } => vec![format!(
            "Nothing to do: {raw_count} raw images, unchanged since the last pass"
        )],
        RunReport::Completed(summary) => format_run_summary(summary, true),
    }
}

/// Format a completed pass. `wrote_catalog` selects the catalog line.
pub fn format_run_summary(summary: &RunSummary, wrote_catalog: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for warning in &summary.warnings {
        lines.push(warning.clone());
    }
    lines.extend(format_prune_report(&summary.prune));

    lines.push(String::new());
    lines.push("--- Run Summary ---".to_string());
    lines.push(format!(
        "{} files processed (including cached)",
        summary.processed.len()
    ));
    if !summary.skipped.is_empty() {
        lines.push(format!(
            "{} files already cataloged, skipped",
            summary.skipped.len()
        ));
    }
    if summary.unprocessed.is_empty() {
        lines.push("0 files could not be processed".to_string());
    } else {
        push_file_list(
            &mut lines,
            format!("{} files could not be processed:", summary.unprocessed.len()),
            &summary.unprocessed,
        );
    }
    if wrote_catalog {
        lines.push(format!("Catalog written with {} entries", summary.catalog_len));
    }

    lines
}

/// Format reconciler removals. Silent when there was no drift to repair.
pub fn format_prune_report(report: &PruneReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.is_clean() {
        return lines;
    }
    if !report.orphaned.is_empty() {
        push_file_list(
            &mut lines,
            format!(
                "Removed {} orphaned record entries (raw image gone):",
                report.orphaned.len()
            ),
            &report.orphaned,
        );
    }
    if !report.missing_artifacts.is_empty() {
        push_file_list(
            &mut lines,
            format!(
                "Removed {} record entries with missing artifacts (will re-optimize):",
                report.missing_artifacts.len()
            ),
            &report.missing_artifacts,
        );
    }
    lines
}

/// Format a standalone `clean` pass, which reports even when clean.
pub fn format_clean_report(report: &PruneReport) -> Vec<String> {
    if report.is_clean() {
        return vec!["No orphaned entries found. The record store is already clean.".to_string()];
    }
    let mut lines = format_prune_report(report);
    lines.push(format!("Total entries removed: {}", report.removed()));
    lines
}

/// Format a `rebuild` pass.
pub fn format_rebuild_report(report: &RebuildReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Catalog rebuilt from derived images: {} entries",
        report.catalog_len
    )];
    if !report.unparsed.is_empty() {
        push_file_list(
            &mut lines,
            format!(
                "{} derived files had unparsable names:",
                report.unparsed.len()
            ),
            &report.unparsed,
        );
    }
    lines
}

/// Format a `seed` pass.
pub fn format_seed_report(seeded: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for basename in seeded {
        lines.push(format!("Generated record for {basename}"));
    }
    lines.push(format!("Total records created: {}", seeded.len()));
    lines
}

/// Format a `status` snapshot.
pub fn format_status(report: &StatusReport) -> Vec<String> {
    let mut lines = vec![
        format!("Raw images:      {}", report.raw_count),
        format!("Derived images:  {}", report.derived_count),
        format!("Record entries:  {}", report.record_count),
        format!("Catalog entries: {}", report.catalog_len),
        format!(
            "Last full pass:  {} images{}",
            report.state.total_images_processed,
            if report.state.force_update {
                " (force update pending)"
            } else {
                ""
            }
        ),
        format!(
            "Next run:        {}",
            if report.gate_would_skip() {
                "would skip (gate)"
            } else {
                "would process"
            }
        ),
    ];
    if !report.pending_prune.is_clean() {
        lines.push(format!(
            "Pending drift:   {} record entries would be pruned",
            report.pending_prune.removed()
        ));
    }
    lines
}

pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

pub fn print_run_report(report: &RunReport) {
    print_lines(&format_run_report(report));
}

pub fn print_status(report: &StatusReport) {
    print_lines(&format_status(report));
}
