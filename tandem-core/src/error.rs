//! Error types for tandem-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse pair file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.tandem/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The pair YAML file did not exist at the expected path.
    #[error("pair not found at {path}")]
    PairNotFound { path: PathBuf },

    /// Both sides of a pair point at the same directory.
    #[error("side A and side B must be different paths (both are {path})")]
    SameRoots { path: PathBuf },

    /// One side lies inside the other.
    #[error("side A ({a}) and side B ({b}) overlap; one is inside the other")]
    OverlappingRoots { a: PathBuf, b: PathBuf },

    /// A filter entry is not a single top-level name.
    #[error("invalid entry name {name:?}: must be a single top-level name")]
    InvalidEntryName { name: String },
}
