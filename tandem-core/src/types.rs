//! Domain types shared by the sync engine, the watcher and the CLI.
//!
//! All path fields use `PathBuf`; relative paths inside a replica are stored
//! relative to that replica's root.
//! All types are serializable/deserializable via serde (YAML for the
//! registry, JSON for the state store).

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a registered replica pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairName(pub String);

impl fmt::Display for PairName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PairName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PairName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Sync state
// ---------------------------------------------------------------------------

/// What both replicas agreed on right after the previous successful sync.
///
/// `time` is the capture time of the post-sync snapshot of side A; the path
/// sets hold every relative path present in *both* replicas at that moment.
/// An empty baseline (`Baseline::default()`) means "never synced".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: BTreeSet<PathBuf>,
    #[serde(default)]
    pub folders: BTreeSet<PathBuf>,
}

impl Baseline {
    /// True when no previous sync has been recorded.
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.files.is_empty() && self.folders.is_empty()
    }
}

/// Persisted state of one named top-level entry of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryState {
    /// The entry is a directory on both sides; synced as a full cycle.
    Tree(Baseline),
    /// The entry is a single file; only the last sync time matters.
    File { time: DateTime<Utc> },
}

impl EntryState {
    /// Time of the last sync that produced this state.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        match self {
            EntryState::Tree(baseline) => baseline.time,
            EntryState::File { time } => Some(*time),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry structs
// ---------------------------------------------------------------------------

/// How a pair is reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Three-way, baseline-relative sync in both directions.
    #[default]
    Bidirectional,
    /// Make side B identical to side A; no baseline is kept.
    Mirror,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Bidirectional => write!(f, "bidirectional"),
            SyncMode::Mirror => write!(f, "mirror"),
        }
    }
}

/// A registered pair of replicas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub name: PairName,
    /// Absolute path to replica A (the mirror source in `Mirror` mode).
    pub side_a: PathBuf,
    /// Absolute path to replica B.
    pub side_b: PathBuf,
    #[serde(default)]
    pub mode: SyncMode,
    /// When set, only these top-level entry names are reconciled, each
    /// independently of the others.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
