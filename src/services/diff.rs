//! Baseline comparison keyed by content hash.
//!
//! Files are identified by their hash, not their path: a renamed file with
//! unchanged content still matches, and a file whose content changed shows up
//! as added even when its path already existed in the original.

use crate::models::{AddedFile, BaselineIndex, ComparisonResult};
use crate::services::clock::format_timestamp;
use chrono::NaiveDateTime;

/// Compare `generated` against `original`.
#[must_use]
pub fn compare(
    original: &BaselineIndex,
    generated: &BaselineIndex,
    compared_at: NaiveDateTime,
) -> ComparisonResult {
    if original.collapsed > 0 || generated.collapsed > 0 {
        log::warn!(
            "Files with identical content collapsed to one path (original: {}, generated: {})",
            original.collapsed,
            generated.collapsed
        );
    }

    let matched_folders = generated
        .folders
        .iter()
        .filter(|folder| original.folders.contains(*folder))
        .count();
    let added_folders: Vec<String> = generated
        .folders
        .iter()
        .filter(|folder| !original.folders.contains(*folder))
        .cloned()
        .collect();

    let matched_files = generated
        .hashes
        .keys()
        .filter(|hash| original.hashes.contains_key(*hash))
        .count();
    let mut added_files: Vec<AddedFile> = generated
        .hashes
        .iter()
        .filter(|(hash, _)| !original.hashes.contains_key(*hash))
        .map(|(hash, path)| AddedFile {
            path: path.clone(),
            hash: hash.clone(),
        })
        .collect();
    added_files.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.hash.cmp(&b.hash)));

    let matching_percentage = matching_percentage(
        matched_files + matched_folders,
        matched_files + added_files.len() + matched_folders + added_folders.len(),
    );

    ComparisonResult {
        compared_at,
        matched_file_count: matched_files,
        unmatched_file_count: added_files.len(),
        matching_percentage,
        added_files,
        added_folders,
        baseline_error: None,
    }
}

/// Result for a pass whose stored baseline could not be read: nothing
/// matches and every generated file is reported.
#[must_use]
pub fn failed_closed(
    generated: &BaselineIndex,
    compared_at: NaiveDateTime,
    reason: impl Into<String>,
) -> ComparisonResult {
    let mut result = compare(&BaselineIndex::new(), generated, compared_at);
    result.matching_percentage = 0;
    result.baseline_error = Some(reason.into());
    result
}

/// `round(100 * matched / total)` with ties to even; 100 for an empty total.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn matching_percentage(matched: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }

    let ratio = (matched as f64 / total as f64) * 100.0;
    ratio.round_ties_even().clamp(0.0, 100.0) as u8
}

/// Render the human-readable comparison report (no trailing newline).
#[must_use]
pub fn render_comparison(result: &ComparisonResult) -> String {
    let mut lines = vec![
        format!("Comparison time: {}", format_timestamp(&result.compared_at)),
        format!("No of files matched: {}", result.matched_file_count),
        format!("No of files not matched: {}", result.unmatched_file_count),
        format!("Matching percentage: {}%", result.matching_percentage),
    ];

    if let Some(reason) = &result.baseline_error {
        lines.push(format!("Baseline error: {reason}"));
    }

    if !result.added_files.is_empty() {
        lines.push(String::new());
        lines.push("Added or modified files:".to_string());
        for file in &result.added_files {
            lines.push(format!("  Path: {}", file.path));
            lines.push(format!("  Hash: {}", file.hash));
        }
    }

    if !result.added_folders.is_empty() {
        lines.push(String::new());
        lines.push("Added or modified directories:".to_string());
        for folder in &result.added_folders {
            lines.push(format!("  Folder: {folder}"));
        }
    }

    lines.join("\n")
}
