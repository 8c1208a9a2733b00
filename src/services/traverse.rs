//! Baseline traversal: walks a directory tree and hashes every file.
//!
//! The walk is a single recursive pre-order pass. A folder entry is recorded
//! before its subdirectories are visited, and entries inside a folder are
//! sorted by name so two walks over an unchanged tree produce identical
//! baselines. Files of one folder are hashed in parallel on the rayon pool.
//!
//! Read failures below the root never abort the walk: they are recorded as
//! [`ErrorItem`]s on the enclosing folder and the walk moves on. Names with a
//! line break cannot be written to the line-oriented report and are recorded
//! the same way.

use crate::models::{Baseline, ErrorItem, FileRecord, FolderEntry, SubdirectoryRef};
use crate::services::clock::ReportClock;
use crate::services::hash::hash_file;
use crate::{BuildOptions, Error, Result};
use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// State accumulated while walking one tree
struct TraversalContext {
    clock: ReportClock,
    folders: Vec<FolderEntry>,
    failures: usize,
}

impl TraversalContext {
    fn new(clock: ReportClock) -> Self {
        Self {
            clock,
            folders: Vec::new(),
            failures: 0,
        }
    }

    /// Record an error against the folder at `folder_idx`
    fn record_error(&mut self, folder_idx: usize, path: &Path, error: &io::Error) {
        log::warn!("Skipping {}: {error}", path.display());
        self.failures += 1;
        if let Some(folder) = self.folders.get_mut(folder_idx) {
            folder.errors.push(error_item(path, error));
        }
    }
}

/// A direct child of the directory being visited
struct Child {
    name: String,
    path: PathBuf,
    /// Directories reached through a symlink are listed but not walked.
    descend: bool,
}

#[derive(Default)]
struct Listing {
    files: Vec<Child>,
    dirs: Vec<Child>,
    errors: Vec<ErrorItem>,
}

/// Build a baseline for `root`.
pub fn build_baseline<P: AsRef<Path>>(root: P, opts: &BuildOptions) -> Result<Baseline> {
    let root = root.as_ref();
    let root_display = root.to_string_lossy().to_string();

    if !root.exists() {
        return Err(Error::InvalidInput(format!(
            "Path does not exist: {root_display}"
        )));
    }

    if !root.is_dir() {
        return Err(Error::InvalidInput(format!(
            "Path is not a directory: {root_display}"
        )));
    }

    let root = std::path::absolute(root)?;
    if has_line_break(&path_string(&root)) {
        return Err(Error::InvalidInput(format!(
            "Path contains a line break: {}",
            escape_line_breaks(&root_display)
        )));
    }
    let captured_at = opts.clock.now_naive();
    let mut context = TraversalContext::new(opts.clock);

    traverse_recursive(&root, &mut context)?;

    let file_count: usize = context.folders.iter().map(|f| f.files.len()).sum();
    log::info!(
        "Baseline of {} captured: {} folders, {} files, {} unreadable",
        root.display(),
        context.folders.len(),
        file_count,
        context.failures
    );

    Ok(Baseline {
        root: path_string(&root),
        captured_at,
        folders: context.folders,
    })
}

fn traverse_recursive(current: &Path, context: &mut TraversalContext) -> io::Result<()> {
    let listing = list_directory(current)?;
    let clock = context.clock;

    let hashed: Vec<std::result::Result<FileRecord, ErrorItem>> = listing
        .files
        .par_iter()
        .map(|child| file_record(child, &clock).map_err(|e| error_item(&child.path, &e)))
        .collect();

    let mut files = Vec::with_capacity(hashed.len());
    let mut errors = listing.errors;
    for outcome in hashed {
        match outcome {
            Ok(record) => files.push(record),
            Err(item) => {
                log::warn!("Could not hash {}: {}", item.path, item.message);
                errors.push(item);
            }
        }
    }
    context.failures += errors.len();

    let entry = FolderEntry {
        path: path_string(current),
        subdirectory_count: count(listing.dirs.len()),
        file_count: count(listing.files.len()),
        files,
        subdirectories: listing
            .dirs
            .iter()
            .map(|child| SubdirectoryRef {
                name: child.name.clone(),
                path: path_string(&child.path),
            })
            .collect(),
        errors,
    };

    log::debug!(
        "Folder entry: {} (files: {}, dirs: {}, errors: {})",
        entry.path,
        entry.file_count,
        entry.subdirectory_count,
        entry.errors.len()
    );

    let folder_idx = context.folders.len();
    context.folders.push(entry);

    for child in listing.dirs.iter().filter(|child| child.descend) {
        if let Err(e) = traverse_recursive(&child.path, context) {
            context.record_error(folder_idx, &child.path, &e);
        }
    }

    Ok(())
}

/// Split a directory's children into files and subdirectories, sorted by name
fn list_directory(current: &Path) -> io::Result<Listing> {
    let mut listing = Listing::default();

    for entry in fs::read_dir(current)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                listing.errors.push(error_item(current, &e));
                continue;
            }
        };

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if has_line_break(&name) {
            let error = io::Error::new(io::ErrorKind::InvalidData, "name contains a line break");
            listing.errors.push(error_item(&path, &error));
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                listing.errors.push(error_item(&path, &e));
                continue;
            }
        };

        if file_type.is_symlink() {
            match fs::metadata(&path) {
                Ok(target) if target.is_dir() => listing.dirs.push(Child {
                    name,
                    path,
                    descend: false,
                }),
                Ok(target) if target.is_file() => listing.files.push(Child {
                    name,
                    path,
                    descend: false,
                }),
                Ok(_) => log::debug!("Skipping special file behind link {}", path.display()),
                Err(e) => listing.errors.push(error_item(&path, &e)),
            }
        } else if file_type.is_dir() {
            listing.dirs.push(Child {
                name,
                path,
                descend: true,
            });
        } else if file_type.is_file() {
            listing.files.push(Child {
                name,
                path,
                descend: false,
            });
        } else {
            // FIFOs and sockets would block or fail on read.
            log::debug!("Skipping special file {}", path.display());
        }
    }

    listing.files.sort_by(|a, b| a.name.cmp(&b.name));
    listing.dirs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

fn file_record(child: &Child, clock: &ReportClock) -> io::Result<FileRecord> {
    let metadata = fs::metadata(&child.path)?;
    let hash = hash_file(&child.path)?;
    let modified = metadata.modified()?;
    let created = metadata.created().unwrap_or(modified);

    log::trace!("Hashed {}: {hash}", child.path.display());

    Ok(FileRecord {
        name: child.name.clone(),
        path: path_string(&child.path),
        size: metadata.len(),
        hash,
        created_at: clock.localize(created),
        modified_at: clock.localize(modified),
    })
}

fn error_item(path: &Path, error: &io::Error) -> ErrorItem {
    let code = match error.kind() {
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::InvalidData => "EINVAL",
        _ => "IO",
    };

    ErrorItem {
        path: escape_line_breaks(&path_string(path)),
        code: code.to_string(),
        message: error.to_string(),
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\n', '\r'])
}

fn escape_line_breaks(text: &str) -> String {
    text.replace('\n', "\\n").replace('\r', "\\r")
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
