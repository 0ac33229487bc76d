use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the watcher runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] tandem_core::RegistryError),

    #[error("sync error: {0}")]
    Sync(#[from] tandem_sync::SyncError),

    #[error("{task} task join failure: {detail}")]
    Join { task: String, detail: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
