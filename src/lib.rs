//! File Integrity Monitoring Library
//!
//! This library builds SHA-256 baselines of directory trees, persists them as
//! a line-oriented text report, and compares a live tree against a stored
//! baseline. The [`monitor`] module keeps directories under continuous
//! supervision with a live filesystem watcher and a randomized re-verification
//! schedule per directory.

pub mod cli;
pub mod config;
pub mod io;
pub mod models;
pub mod monitor;
pub mod services;

pub use config::MonitorConfig;
pub use models::{
    AddedFile, AuditEvent, Baseline, BaselineIndex, ComparisonResult, ErrorItem, FileRecord,
    FolderEntry, SubdirectoryRef, WatchEventKind,
};
pub use monitor::registry::{TaskRegistry, TaskStatus};
pub use services::clock::ReportClock;

use std::path::Path;
use std::result;

/// Custom error type for the library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Baseline parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("Failed to watch {path}: {source}")]
    WatchSetup {
        path: String,
        #[source]
        source: notify::Error,
    },
    #[error("Directory is already monitored: {0}")]
    SchedulingConflict(String),
    #[error("No monitoring task for: {0}")]
    TaskNotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Startup failed: {0}")]
    Startup(String),
}

pub type Result<T> = result::Result<T, Error>;

/// Options for building a baseline
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Time zone used for the file timestamps and the capture time.
    pub clock: ReportClock,
}

/// Walk `directory` and produce a baseline of every file under it.
///
/// Unreadable files are recorded in the baseline instead of failing the walk.
pub fn generate_baseline<P: AsRef<Path>>(directory: P, opts: &BuildOptions) -> Result<Baseline> {
    services::traverse::build_baseline(directory, opts)
}

/// Persist a baseline as a text report, creating parent directories.
pub fn save_baseline<P: AsRef<Path>>(baseline: &Baseline, path: P) -> Result<()> {
    io::report::write_baseline(path, baseline)
}

/// Read a stored baseline report into its comparable form.
pub fn load_baseline<P: AsRef<Path>>(path: P) -> Result<BaselineIndex> {
    io::report::read_baseline(path)
}

/// Compare an original baseline index against a freshly generated one.
#[must_use]
pub fn compare(
    original: &BaselineIndex,
    generated: &BaselineIndex,
    clock: &ReportClock,
) -> ComparisonResult {
    services::diff::compare(original, generated, clock.now_naive())
}

/// Generate a baseline of `directory` and compare it with the stored report.
///
/// # Errors
/// Returns `Error::Parse` when the stored report is malformed, so callers can
/// render a named failure instead of an empty report.
pub fn compare_directory<B: AsRef<Path>, D: AsRef<Path>>(
    baseline_file: B,
    directory: D,
    opts: &BuildOptions,
) -> Result<ComparisonResult> {
    let original = load_baseline(baseline_file)?;
    let generated = generate_baseline(directory, opts)?;
    let generated = BaselineIndex::from_baseline(&generated);
    Ok(compare(&original, &generated, &opts.clock))
}
