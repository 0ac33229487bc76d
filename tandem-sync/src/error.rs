//! Error types for tandem-sync.
//!
//! [`SyncError`] aborts a whole cycle and is only raised before anything was
//! mutated. Failures on individual paths during execution are collected as
//! [`PathFailure`]s instead and never stop the batch.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use tandem_core::error::RegistryError;
use tandem_core::paths;

use crate::delta::Side;

/// All errors that abort a sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A replica root required by the cycle does not exist.
    #[error("replica root not found: {path}")]
    RootNotFound { path: PathBuf },

    /// A replica root exists but is not a directory.
    #[error("replica root is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// One replica lies inside the other.
    #[error("replicas overlap: {a} and {b}")]
    OverlappingRoots { a: PathBuf, b: PathBuf },

    /// A filter entry is not a single top-level name.
    #[error("invalid entry name {name:?}: must be a single top-level name")]
    InvalidEntryName { name: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Enumerating a replica failed part-way.
    #[error("failed to walk replica: {0}")]
    Walk(#[from] walkdir::Error),

    /// An error from the pair registry.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// JSON serialization/deserialization error (state store).
    #[error("state store JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Refuse roots where one contains the other.
pub(crate) fn ensure_disjoint(a: &Path, b: &Path) -> Result<(), SyncError> {
    if paths::roots_overlap(a, b) {
        return Err(SyncError::OverlappingRoots {
            a: a.to_path_buf(),
            b: b.to_path_buf(),
        });
    }
    Ok(())
}

/// Refuse filter entries that would resolve outside the roots.
pub(crate) fn ensure_entry_names(names: &[String]) -> Result<(), SyncError> {
    match names.iter().find(|n| !paths::is_entry_name(n)) {
        Some(bad) => Err(SyncError::InvalidEntryName { name: bad.clone() }),
        None => Ok(()),
    }
}

/// Why a single path could not be reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The operating system refused the copy or delete.
    PermissionDenied,
    /// The path is a file on one side and a directory on the other.
    TypeMismatch,
    /// Any other I/O failure.
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::PermissionDenied => write!(f, "permission denied"),
            FailureKind::TypeMismatch => write!(f, "file/directory mismatch"),
            FailureKind::Io => write!(f, "I/O error"),
        }
    }
}

/// A path that was skipped during a cycle. The rest of the batch still ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathFailure {
    /// Path relative to the replica roots.
    pub path: PathBuf,
    /// Side the failing operation targeted, when there is one.
    pub side: Option<Side>,
    pub kind: FailureKind,
    pub detail: String,
}

impl PathFailure {
    pub(crate) fn from_io(path: impl Into<PathBuf>, side: Side, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            _ => FailureKind::Io,
        };
        Self {
            path: path.into(),
            side: Some(side),
            kind,
            detail: err.to_string(),
        }
    }

    pub(crate) fn type_mismatch(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            side: None,
            kind: FailureKind::TypeMismatch,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            Some(side) => write!(
                f,
                "{} on side {side}: {} ({})",
                self.path.display(),
                self.kind,
                self.detail
            ),
            None => write!(f, "{}: {} ({})", self.path.display(), self.kind, self.detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_is_classified() {
        let err = std::io::Error::new(ErrorKind::PermissionDenied, "nope");
        let failure = PathFailure::from_io("drafts/a.txt", Side::B, &err);
        assert_eq!(failure.kind, FailureKind::PermissionDenied);
        assert_eq!(failure.side, Some(Side::B));
        assert!(failure.to_string().contains("permission denied"));
    }

    #[test]
    fn other_io_errors_are_generic() {
        let err = std::io::Error::new(ErrorKind::Other, "disk on fire");
        let failure = PathFailure::from_io("a.txt", Side::A, &err);
        assert_eq!(failure.kind, FailureKind::Io);
        assert!(failure.detail.contains("disk on fire"));
    }

    #[test]
    fn root_not_found_message_names_path() {
        let err = SyncError::RootNotFound {
            path: PathBuf::from("/missing/root"),
        };
        assert!(err.to_string().contains("/missing/root"));
    }
}
