//! Append-only log files: comparison reports and audit lines
//!
//! Each monitored directory gets its own files, named after the directory's
//! base name plus a short digest of its full path so two directories with the
//! same base name never share a log.

use crate::config::MonitorConfig;
use crate::models::{AuditEvent, ComparisonResult};
use crate::services::clock::format_timestamp;
use crate::services::diff::render_comparison;
use crate::Result;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File locations belonging to one monitored directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub event_log: PathBuf,
    pub comparison_log: PathBuf,
    pub baseline: PathBuf,
}

impl LogPaths {
    #[must_use]
    pub fn for_directory(config: &MonitorConfig, directory: &Path) -> Self {
        let stem = file_stem(directory);
        Self {
            event_log: config.event_log_dir().join(format!("{stem}_event_log.txt")),
            comparison_log: config
                .comparison_log_dir()
                .join(format!("{stem}_comparison_log.txt")),
            baseline: config.baseline_dir().join(format!("{stem}_baseline.txt")),
        }
    }
}

/// `<basename>-<first 8 hex chars of SHA-256(path)>`
#[must_use]
pub fn file_stem(directory: &Path) -> String {
    let full = directory.to_string_lossy();
    let base = directory
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "root".to_string());

    let digest = format!("{:x}", Sha256::digest(full.as_bytes()));
    format!("{base}-{}", &digest[..8])
}

/// Append one comparison report, followed by a blank separator line.
pub fn append_comparison(path: &Path, result: &ComparisonResult) -> Result<()> {
    let mut report = render_comparison(result);
    report.push_str("\n\n");
    append_text(path, &report)?;
    Ok(())
}

/// `[<timestamp>] - <user> - <event kind> - <path>[ -> <dest>]`
#[must_use]
pub fn format_audit_line(event: &AuditEvent) -> String {
    let mut line = format!(
        "[{}] - {} - {} - {}",
        format_timestamp(&event.occurred_at),
        event.principal,
        event.kind,
        event.path
    );
    if let Some(destination) = &event.destination {
        line.push_str(" -> ");
        line.push_str(destination);
    }
    line
}

/// Read a log for display; `None` when nothing has been logged yet.
pub fn read_log(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn append_text(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()
}
