//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::path::Path;

use chrono::{DateTime, Utc};

use tandem_core::{registry, Baseline, EntryState, Pair, PairName, SyncMode};

use crate::cycle::{sync_bidirectional, CycleReport};
use crate::entries::{settled_state, sync_entries, EntriesReport};
use crate::error::{ensure_disjoint, PathFailure, SyncError};
use crate::mirror::{mirror, MirrorReport};
use crate::single::{reconcile_as, SingleOutcome};
use crate::state_store;

/// Scope for a sync pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// Sync every registered pair.
    All,
    /// Sync a single named pair.
    Pair(PairName),
}

/// What ran for a pair, by mode.
#[derive(Debug, Clone)]
pub enum PairRun {
    /// Whole-root bidirectional cycle.
    Cycle(Box<CycleReport>),
    /// Whole-root pair where a root is missing or is a plain file.
    Single(SingleOutcome),
    /// Bidirectional sync of the pair's named entries.
    Entries(EntriesReport),
    /// One-way mirror from side A to side B.
    Mirror(MirrorReport),
}

/// Outcome of syncing a single pair.
#[derive(Debug, Clone)]
pub struct PairSyncResult {
    pub pair: PairName,
    pub mode: SyncMode,
    pub run: PairRun,
    pub dry_run: bool,
    /// Time of the sync before this one, if any.
    pub previous_sync: Option<DateTime<Utc>>,
}

impl PairSyncResult {
    /// Number of filesystem changes made (or planned, in dry-run mode).
    pub fn change_count(&self) -> usize {
        match &self.run {
            PairRun::Cycle(report) => report.planned.len(),
            PairRun::Single(outcome) => outcome.change_count(),
            PairRun::Entries(report) => report.outcomes.iter().map(|(_, o)| o.change_count()).sum(),
            PairRun::Mirror(report) => report.change_count(),
        }
    }

    /// Every path that was skipped.
    pub fn failures(&self) -> Vec<PathFailure> {
        match &self.run {
            PairRun::Cycle(report) => report.failures().cloned().collect(),
            PairRun::Single(outcome) => outcome.failures(),
            PairRun::Entries(report) => report
                .outcomes
                .iter()
                .flat_map(|(_, o)| o.failures())
                .collect(),
            PairRun::Mirror(report) => report.failures.clone(),
        }
    }

    /// Names of filtered entries that could not be reconciled at all.
    pub fn failed_entries(&self) -> Vec<&str> {
        match &self.run {
            PairRun::Entries(report) => report
                .outcomes
                .iter()
                .filter(|(_, o)| matches!(o, crate::entries::EntryOutcome::Failed(_)))
                .map(|(name, _)| name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures().is_empty() && self.failed_entries().is_empty()
    }
}

/// Run the sync pipeline for a scope.
///
/// This is the canonical sync entrypoint for both `tandem sync` and the
/// watcher.
pub fn run(home: &Path, scope: SyncScope, dry_run: bool) -> Result<Vec<PairSyncResult>, SyncError> {
    match scope {
        SyncScope::All => sync_all(home, dry_run),
        SyncScope::Pair(name) => Ok(vec![sync_pair(home, &name, dry_run)?]),
    }
}

/// Sync all registered pairs.
pub fn sync_all(home: &Path, dry_run: bool) -> Result<Vec<PairSyncResult>, SyncError> {
    let pairs = registry::list_pairs_at(home)?;
    let mut results = Vec::new();
    for pair in pairs {
        results.push(sync_loaded_pair(home, &pair, dry_run)?);
    }
    Ok(results)
}

/// Sync the registered pair `name`.
///
/// Loads the pair and its stored state, runs the mode's reconciliation and,
/// unless `dry_run` is set or the pair is a mirror, saves the new state.
pub fn sync_pair(home: &Path, name: &PairName, dry_run: bool) -> Result<PairSyncResult, SyncError> {
    let pair = registry::load_pair_at(home, name)?;
    sync_loaded_pair(home, &pair, dry_run)
}

fn sync_loaded_pair(home: &Path, pair: &Pair, dry_run: bool) -> Result<PairSyncResult, SyncError> {
    let started_at = Utc::now();
    let mut state = state_store::load_at(home, &pair.name)?;
    let previous_sync = state.synced_at;

    let run = match (pair.mode, &pair.entries) {
        (SyncMode::Mirror, entries) => {
            if !pair.side_a.exists() {
                return Err(SyncError::RootNotFound {
                    path: pair.side_a.clone(),
                });
            }
            if !pair.side_a.is_dir() {
                return Err(SyncError::NotADirectory {
                    path: pair.side_a.clone(),
                });
            }
            PairRun::Mirror(mirror(&pair.side_a, &pair.side_b, entries.as_deref(), dry_run)?)
        }
        (SyncMode::Bidirectional, Some(names)) => {
            let report = sync_entries(&pair.side_a, &pair.side_b, names, &state.entries, dry_run)?;
            state.entries = report.states.clone();
            PairRun::Entries(report)
        }
        (SyncMode::Bidirectional, None) => {
            let (run, root) = sync_root(&pair.side_a, &pair.side_b, state.root.as_ref(), dry_run)?;
            state.root = root;
            run
        }
    };

    if !dry_run && pair.mode == SyncMode::Bidirectional {
        state.synced_at = Some(started_at);
        state_store::save_at(home, &pair.name, &state)?;
    }

    let result = PairSyncResult {
        pair: pair.name.clone(),
        mode: pair.mode,
        run,
        dry_run,
        previous_sync,
    };
    tracing::info!(
        "{} ({}): {} change(s), {} failure(s){}",
        result.pair,
        result.mode,
        result.change_count(),
        result.failures().len(),
        if dry_run { " [dry-run]" } else { "" }
    );
    Ok(result)
}

/// Reconcile a whole-root pair.
///
/// Two directories get a full cycle. A missing root is seeded from the
/// other side, and two plain files are compared by modification time.
/// Returns the run and the root state to store.
fn sync_root(
    a: &Path,
    b: &Path,
    previous: Option<&Baseline>,
    dry_run: bool,
) -> Result<(PairRun, Option<Baseline>), SyncError> {
    if !a.exists() && !b.exists() {
        return Err(SyncError::RootNotFound { path: a.to_path_buf() });
    }
    ensure_disjoint(a, b)?;

    // Directory roots report paths relative to the root, file roots by name.
    let rel = match a.file_name() {
        Some(name) if a.is_file() || b.is_file() => Path::new(name),
        _ => Path::new(""),
    };
    let baseline = previous.cloned().unwrap_or_default();
    match reconcile_as(a, b, rel, baseline.time, dry_run)? {
        SingleOutcome::NeedsCycle => {
            let report = sync_bidirectional(a, b, &baseline, dry_run)?;
            let root = Some(report.baseline.clone());
            Ok((PairRun::Cycle(Box::new(report)), root))
        }
        outcome if dry_run => Ok((PairRun::Single(outcome), previous.cloned())),
        outcome => {
            let prev = previous.cloned().map(EntryState::Tree);
            let root = settled_state(a, b, prev.as_ref())?.map(|state| match state {
                EntryState::Tree(baseline) => baseline,
                EntryState::File { time } => Baseline {
                    time: Some(time),
                    ..Baseline::default()
                },
            });
            Ok((PairRun::Single(outcome), root))
        }
    }
}
