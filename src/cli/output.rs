//! Output formatting for CLI

use crate::models::{Baseline, ComparisonResult};
use crate::monitor::registry::TaskStatus;
use crate::services::clock::format_timestamp;
use crate::services::diff::render_comparison;
use crate::services::format::format_size;
use std::fmt::Write as _;

/// One-paragraph summary printed after a baseline is captured.
#[must_use]
pub fn format_baseline_summary(baseline: &Baseline) -> String {
    let total_bytes: u64 = baseline.files().map(|file| file.size).sum();
    let error_count = baseline.errors().count();

    let mut out = format!(
        "Baseline of {} captured at {}\n  Folders: {}\n  Files:   {} ({})",
        baseline.root,
        format_timestamp(&baseline.captured_at),
        baseline.folders.len(),
        baseline.file_count(),
        format_size(total_bytes)
    );
    if error_count > 0 {
        let _ = write!(out, "\n  Unreadable entries: {error_count}");
    }
    out
}

/// Comparison report as written to the comparison log.
#[must_use]
pub fn format_comparison_text(result: &ComparisonResult) -> String {
    render_comparison(result)
}

/// Format a comparison as JSON
#[must_use]
pub fn format_comparison_json(result: &ComparisonResult, baseline: &str, directory: &str) -> String {
    let output = serde_json::json!({
        "baseline": baseline,
        "directory": directory,
        "compared_at": format_timestamp(&result.compared_at),
        "matched_file_count": result.matched_file_count,
        "unmatched_file_count": result.unmatched_file_count,
        "matching_percentage": result.matching_percentage,
        "added_files": result.added_files,
        "added_folders": result.added_folders,
        "baseline_error": result.baseline_error,
        "clean": result.is_clean(),
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

/// Table of monitored directories, one per line.
#[must_use]
pub fn format_task_table(tasks: &[TaskStatus]) -> String {
    if tasks.is_empty() {
        return "No directories are being monitored.".to_string();
    }

    let mut out = format!(
        "{:<60} {:>7} {:>6} {:>8}",
        "DIRECTORY", "REGULAR", "RANDOM", "STATE"
    );
    for task in tasks {
        let state = if task.running { "running" } else { "stopped" };
        let _ = write!(
            out,
            "\n{:<60} {:>7} {:>6} {:>8}",
            task.directory.display().to_string(),
            task.regular_per_hour,
            task.random_per_interval,
            state
        );
    }
    out
}
