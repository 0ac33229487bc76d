//! Point-in-time enumeration of a replica.
//!
//! A directory's recorded time is the directory's own mtime. A file changing
//! deep inside a directory does not by itself make the directory look
//! modified; the delete/restore rules for directories rely on that.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use tandem_core::Baseline;

use crate::error::{io_err, SyncError};

/// Relative path → last-modified time.
pub type Entries = BTreeMap<PathBuf, DateTime<Utc>>;

/// Every regular file and directory under `root`, keyed by relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub root: PathBuf,
    pub files: Entries,
    pub folders: Entries,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    /// Walk `root` and record every file and sub-directory.
    ///
    /// Symlinks and special files are not followed or recorded. Fails with
    /// [`SyncError::RootNotFound`] when `root` does not exist.
    pub fn capture(root: &Path) -> Result<Self, SyncError> {
        if !root.exists() {
            return Err(SyncError::RootNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut files = Entries::new();
        let mut folders = Entries::new();

        for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
            let entry = entry?;
            let ty = entry.file_type();
            if !ty.is_file() && !ty.is_dir() {
                tracing::debug!("not a file or directory, ignoring: {}", entry.path().display());
                continue;
            }

            let metadata = entry.metadata()?;
            let modified = metadata
                .modified()
                .map_err(|e| io_err(entry.path(), e))?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();

            if ty.is_dir() {
                folders.insert(relative, to_utc(modified));
            } else {
                files.insert(relative, to_utc(modified));
            }
        }

        let snapshot = Self {
            root: root.to_path_buf(),
            files,
            folders,
            captured_at: Utc::now(),
        };
        tracing::debug!(
            "captured {}: {} files, {} folders",
            root.display(),
            snapshot.files.len(),
            snapshot.folders.len()
        );
        Ok(snapshot)
    }

    /// Build a snapshot from already-known entries without touching disk.
    pub fn from_parts(
        root: impl Into<PathBuf>,
        files: Entries,
        folders: Entries,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            root: root.into(),
            files,
            folders,
            captured_at,
        }
    }

    /// Relative paths of every file.
    pub fn file_paths(&self) -> BTreeSet<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Relative paths of every directory.
    pub fn folder_paths(&self) -> BTreeSet<PathBuf> {
        self.folders.keys().cloned().collect()
    }

    /// Baseline holding only the paths present in both `self` and `other`,
    /// stamped with `self.captured_at`.
    pub fn shared_baseline(&self, other: &Snapshot) -> Baseline {
        Baseline {
            time: Some(self.captured_at),
            files: self
                .files
                .keys()
                .filter(|p| other.files.contains_key(*p))
                .cloned()
                .collect(),
            folders: self
                .folders
                .keys()
                .filter(|p| other.folders.contains_key(*p))
                .cloned()
                .collect(),
        }
    }
}

pub(crate) fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// True when `time` is strictly newer than the last sync, or when there was
/// no previous sync at all.
pub(crate) fn newer_than(time: DateTime<Utc>, last_sync: Option<DateTime<Utc>>) -> bool {
    match last_sync {
        Some(last) => time > last,
        None => true,
    }
}
