//! Baseline text report read/write operations
//!
//! The report is line oriented, one block per folder:
//!
//! ```text
//! Folder: /data
//! Number of subdirectories: 1
//! Number of files: 1
//! Files:
//!   Name: a.txt
//!   Path: /data/a.txt
//!   Size: 5.00 B (5 B)
//!   Hash: 2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824
//!   Date Created: 2024-05-01 10:00:00
//!   Date Modified: 2024-05-01 10:00:00
//! Subdirectories:
//!   Name: sub
//!   Path: /data/sub
//! ```
//!
//! Parsing only extracts what the diff engine needs: the folder paths and a
//! hash → path map. A file's `Path:` line must precede its `Hash:` line within
//! the same sub-block; everything else is order independent. Date lines are
//! checked but not kept.
//!
//! Every value sits on a single line, so the walk never records an entry
//! whose name contains a line break.

use crate::models::{Baseline, BaselineIndex, FolderEntry};
use crate::services::clock::{format_timestamp, parse_timestamp};
use crate::services::format::format_size;
use crate::services::hash::is_sha256_hex;
use crate::{Error, Result};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const FOLDER: &str = "Folder: ";
const NAME: &str = "  Name: ";
const PATH: &str = "  Path: ";
const HASH: &str = "  Hash: ";
const CREATED: &str = "  Date Created: ";
const MODIFIED: &str = "  Date Modified: ";

/// Render a baseline as a text report.
#[must_use]
pub fn render_baseline(baseline: &Baseline) -> String {
    let mut out = String::new();
    for folder in &baseline.folders {
        render_folder(&mut out, folder);
    }
    out
}

fn render_folder(out: &mut String, folder: &FolderEntry) {
    // Writing into a String cannot fail.
    let _ = writeln!(out, "{FOLDER}{}", folder.path);
    let _ = writeln!(out, "Number of subdirectories: {}", folder.subdirectory_count);
    let _ = writeln!(out, "Number of files: {}", folder.file_count);

    out.push_str("Files:\n");
    for file in &folder.files {
        let _ = writeln!(out, "{NAME}{}", file.name);
        let _ = writeln!(out, "{PATH}{}", file.path);
        let _ = writeln!(out, "  Size: {}", format_size(file.size));
        let _ = writeln!(out, "{HASH}{}", file.hash);
        let _ = writeln!(out, "{CREATED}{}", format_timestamp(&file.created_at));
        let _ = writeln!(out, "{MODIFIED}{}", format_timestamp(&file.modified_at));
    }

    if !folder.subdirectories.is_empty() {
        out.push_str("Subdirectories:\n");
        for subdir in &folder.subdirectories {
            let _ = writeln!(out, "{NAME}{}", subdir.name);
            let _ = writeln!(out, "{PATH}{}", subdir.path);
        }
    }

    if !folder.errors.is_empty() {
        out.push_str("Unreadable:\n");
        for error in &folder.errors {
            let _ = writeln!(out, "  {}: {} ({})", error.code, error.path, error.message);
        }
    }

    out.push('\n');
}

/// Write a baseline report to `path`, creating parent directories.
pub fn write_baseline<P: AsRef<Path>>(path: P, baseline: &Baseline) -> Result<()> {
    let file_path = path.as_ref();

    if let Some(parent) = file_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    fs::write(file_path, render_baseline(baseline))?;
    log::info!(
        "Baseline of {} written to {}",
        baseline.root,
        file_path.display()
    );
    Ok(())
}

/// Read and parse a stored baseline report.
pub fn read_baseline<P: AsRef<Path>>(path: P) -> Result<BaselineIndex> {
    let text = fs::read_to_string(path.as_ref())?;
    parse_report(&text)
}

/// Parse report text into folder paths and a hash → path map.
pub fn parse_report(text: &str) -> Result<BaselineIndex> {
    let mut index = BaselineIndex::new();
    let mut saw_folder = false;
    let mut pending_path: Option<&str> = None;
    let mut last_line = 0;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;

        if let Some(folder) = line.strip_prefix(FOLDER) {
            saw_folder = true;
            pending_path = None;
            index.insert_folder(folder);
        } else if line.starts_with(NAME) {
            pending_path = None;
        } else if let Some(path) = line.strip_prefix(PATH) {
            pending_path = Some(path);
        } else if let Some(hash) = line.strip_prefix(HASH) {
            if !saw_folder {
                return Err(parse_error(line_no, "file hash before any folder block"));
            }
            let Some(path) = pending_path.take() else {
                return Err(parse_error(line_no, "file hash without a preceding path"));
            };
            let hash = hash.trim();
            if !is_sha256_hex(hash) {
                return Err(parse_error(
                    line_no,
                    format!("'{hash}' is not a SHA-256 hex digest"),
                ));
            }
            index.insert_file(hash.to_ascii_lowercase(), path);
        } else if let Some(date) = line
            .strip_prefix(CREATED)
            .or_else(|| line.strip_prefix(MODIFIED))
        {
            if parse_timestamp(date).is_err() {
                return Err(parse_error(
                    line_no,
                    format!("'{}' is not a YYYY-MM-DD HH:MM:SS timestamp", date.trim()),
                ));
            }
        }
    }

    // Even an empty tree has its root folder block.
    if !saw_folder {
        return Err(parse_error(last_line.max(1), "no folder blocks found"));
    }

    log::debug!(
        "Parsed baseline report: {} folders, {} file hashes",
        index.folders.len(),
        index.hashes.len()
    );

    Ok(index)
}

fn parse_error(line: usize, message: impl Into<String>) -> Error {
    Error::Parse {
        line,
        message: message.into(),
    }
}
