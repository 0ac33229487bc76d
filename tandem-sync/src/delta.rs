//! Baseline-relative classification of every path into seven categories.
//!
//! Given the path sets of side A, side B and the baseline:
//!
//! ```text
//! undeleted      = A ∩ B ∩ base   → unmodified | undeleted_modified
//! delete_from_a  = (B ∩ base) − A   A lost it; accept the deletion or restore
//! delete_from_b  = (A ∩ base) − B
//! add_to_both    = (A ∩ B) − base
//! add_to_a       = (B − A) − base   A lacks it and receives it from B
//! add_to_b       = (A − B) − base
//! (dropped)      = base − A − B     deleted on both sides, nothing to do
//! ```
//!
//! Files and folders share the set algebra; only files split `undeleted` by
//! mtime, since directory content is never compared.

use std::collections::BTreeSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use tandem_core::Baseline;

use crate::snapshot::{Entries, Snapshot};

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }

    /// Pick the value belonging to this side.
    pub fn pick<T>(self, a: T, b: T) -> T {
        match self {
            Side::A => a,
            Side::B => b,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::B => write!(f, "B"),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry kinds
// ---------------------------------------------------------------------------

/// Selects which half of a snapshot and baseline a [`Delta`] works on.
pub trait EntryKind {
    /// Human-readable label used in logs.
    const LABEL: &'static str;
    /// Whether undeleted entries are split by mtime into modified/unmodified.
    const COMPARES_MTIME: bool;

    fn entries(snapshot: &Snapshot) -> &Entries;
    fn baseline_paths(baseline: &Baseline) -> &BTreeSet<PathBuf>;
}

/// Regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Files;

/// Directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Folders;

impl EntryKind for Files {
    const LABEL: &'static str = "file";
    const COMPARES_MTIME: bool = true;

    fn entries(snapshot: &Snapshot) -> &Entries {
        &snapshot.files
    }

    fn baseline_paths(baseline: &Baseline) -> &BTreeSet<PathBuf> {
        &baseline.files
    }
}

impl EntryKind for Folders {
    const LABEL: &'static str = "folder";
    const COMPARES_MTIME: bool = false;

    fn entries(snapshot: &Snapshot) -> &Entries {
        &snapshot.folders
    }

    fn baseline_paths(baseline: &Baseline) -> &BTreeSet<PathBuf> {
        &baseline.folders
    }
}

// ---------------------------------------------------------------------------
// Delta
// ---------------------------------------------------------------------------

/// Seven disjoint path sets describing what changed since the baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<K> {
    pub unmodified: BTreeSet<PathBuf>,
    pub undeleted_modified: BTreeSet<PathBuf>,
    pub delete_from_a: BTreeSet<PathBuf>,
    pub delete_from_b: BTreeSet<PathBuf>,
    pub add_to_a: BTreeSet<PathBuf>,
    pub add_to_b: BTreeSet<PathBuf>,
    pub add_to_both: BTreeSet<PathBuf>,
    _kind: PhantomData<K>,
}

impl<K> Default for Delta<K> {
    fn default() -> Self {
        Self {
            unmodified: BTreeSet::new(),
            undeleted_modified: BTreeSet::new(),
            delete_from_a: BTreeSet::new(),
            delete_from_b: BTreeSet::new(),
            add_to_a: BTreeSet::new(),
            add_to_b: BTreeSet::new(),
            add_to_both: BTreeSet::new(),
            _kind: PhantomData,
        }
    }
}

impl<K: EntryKind> Delta<K> {
    /// Partition `A ∪ B ∪ baseline` for entry kind `K`.
    ///
    /// Paths in `excluded` (and everything below them) are left out of every
    /// set; the cycle uses this for paths that are a file on one side and a
    /// directory on the other.
    pub fn classify(
        a: &Snapshot,
        b: &Snapshot,
        baseline: &Baseline,
        excluded: &BTreeSet<PathBuf>,
    ) -> Self {
        let entries_a = K::entries(a);
        let entries_b = K::entries(b);
        let keep = |p: &&PathBuf| !is_excluded(p, excluded);

        let paths_a: BTreeSet<&PathBuf> = entries_a.keys().filter(keep).collect();
        let paths_b: BTreeSet<&PathBuf> = entries_b.keys().filter(keep).collect();
        let paths_0: BTreeSet<&PathBuf> = K::baseline_paths(baseline).iter().filter(keep).collect();

        let mut delta = Self::default();
        let all: BTreeSet<&PathBuf> = paths_a
            .iter()
            .chain(paths_b.iter())
            .chain(paths_0.iter())
            .copied()
            .collect();

        for path in all {
            let in_a = paths_a.contains(path);
            let in_b = paths_b.contains(path);
            let in_0 = paths_0.contains(path);

            let set = match (in_a, in_b, in_0) {
                (true, true, true) => {
                    if K::COMPARES_MTIME
                        && modified_since(entries_a[path], entries_b[path], baseline.time)
                    {
                        &mut delta.undeleted_modified
                    } else {
                        &mut delta.unmodified
                    }
                }
                (false, true, true) => &mut delta.delete_from_a,
                (true, false, true) => &mut delta.delete_from_b,
                (true, true, false) => &mut delta.add_to_both,
                (false, true, false) => &mut delta.add_to_a,
                (true, false, false) => &mut delta.add_to_b,
                (false, false, _) => continue,
            };
            set.insert(path.clone());
        }

        tracing::debug!(
            "{} delta: {} unmodified, {} changed",
            K::LABEL,
            delta.unmodified.len(),
            delta.change_count()
        );
        delta
    }
}

impl<K> Delta<K> {
    /// Paths the side `side` no longer has.
    pub fn delete_from(&self, side: Side) -> &BTreeSet<PathBuf> {
        side.pick(&self.delete_from_a, &self.delete_from_b)
    }

    /// Paths the side `side` lacks and must receive.
    pub fn add_to(&self, side: Side) -> &BTreeSet<PathBuf> {
        side.pick(&self.add_to_a, &self.add_to_b)
    }

    /// Number of paths that require a decision (everything but `unmodified`).
    pub fn change_count(&self) -> usize {
        self.undeleted_modified.len()
            + self.delete_from_a.len()
            + self.delete_from_b.len()
            + self.add_to_a.len()
            + self.add_to_b.len()
            + self.add_to_both.len()
    }

    /// Total number of classified paths.
    pub fn len(&self) -> usize {
        self.unmodified.len() + self.change_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move `path` from `delete_from_<side>` to `add_to_<side>`.
    ///
    /// Returns false when the path was not scheduled for deletion.
    pub(crate) fn promote_to_add(&mut self, side: Side, path: &Path) -> bool {
        let (deletes, adds) = match side {
            Side::A => (&mut self.delete_from_a, &mut self.add_to_a),
            Side::B => (&mut self.delete_from_b, &mut self.add_to_b),
        };
        if deletes.remove(path) {
            adds.insert(path.to_path_buf());
            true
        } else {
            false
        }
    }
}

fn modified_since(
    time_a: DateTime<Utc>,
    time_b: DateTime<Utc>,
    last_sync: Option<DateTime<Utc>>,
) -> bool {
    match last_sync {
        Some(last) => time_a.max(time_b) > last,
        None => true,
    }
}

fn is_excluded(path: &Path, excluded: &BTreeSet<PathBuf>) -> bool {
    !excluded.is_empty() && path.ancestors().any(|p| excluded.contains(p))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
