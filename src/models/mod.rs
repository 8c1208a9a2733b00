//! Data models for baselines, comparison results and audit events

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One tracked file inside a baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub name: String,
    pub path: String,
    pub size: u64,
    /// Lowercase hex SHA-256 of the file content.
    pub hash: String,
    pub created_at: NaiveDateTime,
    pub modified_at: NaiveDateTime,
}

/// Child directory listed under a folder block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirectoryRef {
    pub name: String,
    pub path: String,
}

/// Represents a direct child that could not be read during the walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    pub path: String,
    pub code: String,
    pub message: String,
}

/// One directory visited during a baseline walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    pub path: String,
    pub subdirectory_count: u32,
    pub file_count: u32,
    pub files: Vec<FileRecord>,
    pub subdirectories: Vec<SubdirectoryRef>,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

/// Point-in-time capture of a directory tree.
///
/// Folders appear in walk order (a directory precedes its descendants). Every
/// `FileRecord::path` has exactly one enclosing `FolderEntry` in `folders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub root: String,
    pub captured_at: NaiveDateTime,
    pub folders: Vec<FolderEntry>,
}

impl Baseline {
    /// Iterate every file record in walk order.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.folders.iter().flat_map(|folder| folder.files.iter())
    }

    /// Iterate every read failure recorded during the walk.
    pub fn errors(&self) -> impl Iterator<Item = &ErrorItem> {
        self.folders.iter().flat_map(|folder| folder.errors.iter())
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.folders.iter().map(|folder| folder.files.len()).sum()
    }
}

/// The fields of a baseline the diff engine works with.
///
/// Files are keyed by content hash. When two records share a hash the later
/// one (in walk order) wins and `collapsed` is incremented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineIndex {
    pub folders: BTreeSet<String>,
    pub hashes: BTreeMap<String, String>,
    pub collapsed: usize,
}

impl BaselineIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_folder(&mut self, path: impl Into<String>) {
        self.folders.insert(path.into());
    }

    pub fn insert_file(&mut self, hash: impl Into<String>, path: impl Into<String>) {
        if self.hashes.insert(hash.into(), path.into()).is_some() {
            self.collapsed += 1;
        }
    }

    /// Derive the index straight from an in-memory baseline.
    #[must_use]
    pub fn from_baseline(baseline: &Baseline) -> Self {
        let mut index = Self::new();
        for folder in &baseline.folders {
            index.insert_folder(folder.path.as_str());
            for file in &folder.files {
                index.insert_file(file.hash.as_str(), file.path.as_str());
            }
        }
        index
    }
}

/// A file present in the generated side whose hash the original lacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedFile {
    pub path: String,
    pub hash: String,
}

/// Outcome of one baseline comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub compared_at: NaiveDateTime,
    pub matched_file_count: usize,
    pub unmatched_file_count: usize,
    pub matching_percentage: u8,
    pub added_files: Vec<AddedFile>,
    pub added_folders: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_error: Option<String>,
}

impl ComparisonResult {
    /// True when the live tree matches the baseline with nothing added.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.baseline_error.is_none()
            && self.added_files.is_empty()
            && self.added_folders.is_empty()
            && self.matching_percentage == 100
    }
}

/// Classification of a live filesystem notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WatchEventKind {
    FileCreated,
    FileDeleted,
    FileModified,
    FileMoved,
    DirectoryCreated,
    DirectoryDeleted,
    DirectoryModified,
    DirectoryMoved,
}

impl WatchEventKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::FileCreated => "File Created",
            WatchEventKind::FileDeleted => "File Deleted",
            WatchEventKind::FileModified => "File Modified",
            WatchEventKind::FileMoved => "File Moved",
            WatchEventKind::DirectoryCreated => "Directory Created",
            WatchEventKind::DirectoryDeleted => "Directory Deleted",
            WatchEventKind::DirectoryModified => "Directory Modified",
            WatchEventKind::DirectoryMoved => "Directory Moved",
        }
    }

    #[must_use]
    pub fn created(is_dir: bool) -> Self {
        if is_dir {
            WatchEventKind::DirectoryCreated
        } else {
            WatchEventKind::FileCreated
        }
    }

    #[must_use]
    pub fn deleted(is_dir: bool) -> Self {
        if is_dir {
            WatchEventKind::DirectoryDeleted
        } else {
            WatchEventKind::FileDeleted
        }
    }

    #[must_use]
    pub fn modified(is_dir: bool) -> Self {
        if is_dir {
            WatchEventKind::DirectoryModified
        } else {
            WatchEventKind::FileModified
        }
    }

    #[must_use]
    pub fn moved(is_dir: bool) -> Self {
        if is_dir {
            WatchEventKind::DirectoryMoved
        } else {
            WatchEventKind::FileMoved
        }
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub occurred_at: NaiveDateTime,
    pub principal: String,
    pub kind: WatchEventKind,
    pub path: String,
    pub destination: Option<String>,
}
