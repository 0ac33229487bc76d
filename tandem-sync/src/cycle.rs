//! One bidirectional sync cycle over two replica roots.
//!
//! ```text
//! verify roots → snapshot A, B → type collisions → classify folders, files
//!   → resolve → plan → apply folders, then files → snapshot A, B → baseline
//! ```
//!
//! The cycle aborts with a [`SyncError`] only before anything on disk has
//! changed. After that, failures are per path and end up in the report.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use tandem_core::Baseline;

use crate::conflict::{self, Resolution};
use crate::delta::{Delta, Files, Folders};
use crate::error::{ensure_disjoint, PathFailure, SyncError};
use crate::executor::{self, Action, Execution};
use crate::snapshot::Snapshot;

/// How a finished cycle went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Every planned action succeeded.
    Clean,
    /// Some paths were skipped. Re-running the cycle retries them.
    Partial { failures: Vec<PathFailure> },
}

/// Everything a cycle decided and did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub planned: Vec<Action>,
    pub execution: Execution,
    pub resolution: Resolution,
    /// Paths that are a file on one side and a directory on the other.
    pub type_collisions: Vec<PathFailure>,
    /// Post-sync snapshot of side A (the pre-sync one in dry-run mode).
    pub snapshot: Snapshot,
    /// Baseline for the next cycle. Unchanged in dry-run mode.
    pub baseline: Baseline,
    pub dry_run: bool,
}

impl CycleReport {
    /// Type collisions and execution failures, in that order.
    pub fn failures(&self) -> impl Iterator<Item = &PathFailure> {
        self.type_collisions.iter().chain(&self.execution.failures)
    }

    pub fn outcome(&self) -> Outcome {
        let failures: Vec<PathFailure> = self.failures().cloned().collect();
        if failures.is_empty() {
            Outcome::Clean
        } else {
            Outcome::Partial { failures }
        }
    }
}

/// Run one cycle between `root_a` and `root_b` relative to `baseline`.
///
/// Both roots must be existing, non-overlapping directories; otherwise the
/// cycle aborts before anything is read or written.
pub fn sync_bidirectional(
    root_a: &Path,
    root_b: &Path,
    baseline: &Baseline,
    dry_run: bool,
) -> Result<CycleReport, SyncError> {
    for root in [root_a, root_b] {
        if !root.exists() {
            return Err(SyncError::RootNotFound {
                path: root.to_path_buf(),
            });
        }
        if !root.is_dir() {
            return Err(SyncError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
    }
    ensure_disjoint(root_a, root_b)?;

    let a = Snapshot::capture(root_a)?;
    let b = Snapshot::capture(root_b)?;

    let (excluded, type_collisions) = type_collisions(&a, &b);

    let mut folders = Delta::<Folders>::classify(&a, &b, baseline, &excluded);
    let files = Delta::<Files>::classify(&a, &b, baseline, &excluded);
    let resolution = conflict::resolve(&files, &mut folders, &a, &b, baseline.time);

    let planned = executor::plan(&files, &folders, &a, &b, baseline.time);
    let execution = executor::apply(&planned, root_a, root_b, dry_run);

    let (snapshot, next) = if dry_run {
        (a, baseline.clone())
    } else {
        let post_a = Snapshot::capture(root_a)?;
        let post_b = Snapshot::capture(root_b)?;
        let mut next = post_a.shared_baseline(&post_b);
        keep_failed_removals(&mut next, baseline, &execution.failures, &planned);
        (post_a, next)
    };

    tracing::debug!(
        "cycle {} <-> {}: {} planned, {} applied, {} failed",
        root_a.display(),
        root_b.display(),
        planned.len(),
        execution.applied.len(),
        execution.failures.len() + type_collisions.len()
    );

    Ok(CycleReport {
        planned,
        execution,
        resolution,
        type_collisions,
        snapshot,
        baseline: next,
        dry_run,
    })
}

/// Paths that are a file on one side and a directory on the other.
///
/// They are left out of classification together with everything below them.
fn type_collisions(a: &Snapshot, b: &Snapshot) -> (BTreeSet<PathBuf>, Vec<PathFailure>) {
    let mut excluded = BTreeSet::new();
    let mut failures = Vec::new();

    let file_vs_dir = a.files.keys().filter(|p| b.folders.contains_key(*p));
    let dir_vs_file = a.folders.keys().filter(|p| b.files.contains_key(*p));

    for path in file_vs_dir {
        excluded.insert(path.clone());
        failures.push(PathFailure::type_mismatch(path, "file on A, directory on B"));
    }
    for path in dir_vs_file {
        excluded.insert(path.clone());
        failures.push(PathFailure::type_mismatch(path, "directory on A, file on B"));
    }
    for failure in &failures {
        tracing::warn!("skipping {failure}");
    }

    (excluded, failures)
}

/// A deletion that could not be propagated must still look like a deletion
/// next cycle, so the old baseline entries at and below it are carried over.
/// Without this the surviving copy would be classified as new and restored.
fn keep_failed_removals(
    next: &mut Baseline,
    previous: &Baseline,
    failures: &[PathFailure],
    planned: &[Action],
) {
    let failed: BTreeSet<&Path> = failures.iter().map(|f| f.path.as_path()).collect();
    let roots: Vec<&Path> = planned
        .iter()
        .filter(|a| matches!(a, Action::Remove { .. }) && failed.contains(a.path()))
        .map(Action::path)
        .collect();
    if roots.is_empty() {
        return;
    }

    let under = |p: &&PathBuf| roots.iter().any(|root| p.starts_with(root));
    next.files.extend(previous.files.iter().filter(under).cloned());
    next.folders.extend(previous.folders.iter().filter(under).cloned());
}
