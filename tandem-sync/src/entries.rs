//! Per-entry sync of a filtered pair.
//!
//! Each named top-level entry (`drafts`, `output`, `styles.yml`, ...) is
//! reconciled on its own with its own state. Directories present on both
//! sides get a full cycle; anything else goes through the single-path
//! reconciler. One entry failing leaves the others unaffected.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;

use tandem_core::{Baseline, EntryState};

use crate::cycle::{sync_bidirectional, CycleReport};
use crate::error::{ensure_disjoint, ensure_entry_names, PathFailure, SyncError};
use crate::single::{reconcile, SingleOutcome};
use crate::snapshot::Snapshot;

/// What happened to one entry.
#[derive(Debug, Clone)]
pub enum EntryOutcome {
    Cycle(Box<CycleReport>),
    Single(SingleOutcome),
    /// The entry could not be reconciled; its previous state was kept.
    Failed(String),
}

impl EntryOutcome {
    /// Number of filesystem changes made (or planned, in dry-run mode).
    pub fn change_count(&self) -> usize {
        match self {
            EntryOutcome::Cycle(report) => report.planned.len(),
            EntryOutcome::Single(single) => single.change_count(),
            EntryOutcome::Failed(_) => 0,
        }
    }

    pub fn failures(&self) -> Vec<PathFailure> {
        match self {
            EntryOutcome::Cycle(report) => report.failures().cloned().collect(),
            EntryOutcome::Single(single) => single.failures(),
            EntryOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Result of [`sync_entries`].
#[derive(Debug, Clone, Default)]
pub struct EntriesReport {
    pub outcomes: Vec<(String, EntryOutcome)>,
    /// State to persist for the next run.
    pub states: BTreeMap<String, EntryState>,
}

/// Reconcile each of `names` between `root_a` and `root_b`.
///
/// In dry-run mode the returned states equal `previous`. One root may be
/// missing; its entries are then seeded from the other side. Every name must
/// be a single top-level component.
pub fn sync_entries(
    root_a: &Path,
    root_b: &Path,
    names: &[String],
    previous: &BTreeMap<String, EntryState>,
    dry_run: bool,
) -> Result<EntriesReport, SyncError> {
    ensure_entry_names(names)?;
    for root in [root_a, root_b] {
        if root.exists() && !root.is_dir() {
            return Err(SyncError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
    }
    if !root_a.exists() && !root_b.exists() {
        return Err(SyncError::RootNotFound {
            path: root_a.to_path_buf(),
        });
    }
    ensure_disjoint(root_a, root_b)?;

    let mut report = EntriesReport {
        outcomes: Vec::new(),
        states: previous.clone(),
    };

    for name in names {
        let prev = previous.get(name);
        let (a, b) = (root_a.join(name), root_b.join(name));

        let outcome = match sync_entry(&a, &b, prev, dry_run) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("entry {name} skipped: {e}");
                report.outcomes.push((name.clone(), EntryOutcome::Failed(e.to_string())));
                continue;
            }
        };

        if !dry_run {
            let next = match &outcome {
                EntryOutcome::Cycle(cycle) => Ok(Some(EntryState::Tree(cycle.baseline.clone()))),
                _ => settled_state(&a, &b, prev),
            };
            match next {
                Ok(Some(state)) => {
                    report.states.insert(name.clone(), state);
                }
                Ok(None) => {
                    report.states.remove(name);
                }
                Err(e) => tracing::warn!("entry {name}: could not record state: {e}"),
            }
        }
        report.outcomes.push((name.clone(), outcome));
    }

    Ok(report)
}

fn sync_entry(
    a: &Path,
    b: &Path,
    prev: Option<&EntryState>,
    dry_run: bool,
) -> Result<EntryOutcome, SyncError> {
    let last_sync = prev.and_then(EntryState::time);
    match reconcile(a, b, last_sync, dry_run)? {
        SingleOutcome::NeedsCycle => {
            let baseline = match prev {
                Some(EntryState::Tree(baseline)) => baseline.clone(),
                Some(EntryState::File { time }) => Baseline {
                    time: Some(*time),
                    ..Baseline::default()
                },
                None => Baseline::default(),
            };
            let cycle = sync_bidirectional(a, b, &baseline, dry_run)?;
            Ok(EntryOutcome::Cycle(Box::new(cycle)))
        }
        other => Ok(EntryOutcome::Single(other)),
    }
}

/// State of an entry after the single-path reconciler ran.
///
/// Two directories get a fresh tree baseline, two files a new sync time.
/// An entry left on one side only keeps its old state so a later deletion of
/// the survivor still compares against the right time; an entry gone from
/// both sides is forgotten.
pub(crate) fn settled_state(
    a: &Path,
    b: &Path,
    prev: Option<&EntryState>,
) -> Result<Option<EntryState>, SyncError> {
    match (a.exists(), b.exists()) {
        (false, false) => Ok(None),
        (true, true) if a.is_dir() && b.is_dir() => {
            let post_a = Snapshot::capture(a)?;
            let post_b = Snapshot::capture(b)?;
            Ok(Some(EntryState::Tree(post_a.shared_baseline(&post_b))))
        }
        (true, true) if a.is_file() && b.is_file() => {
            Ok(Some(EntryState::File { time: Utc::now() }))
        }
        _ => Ok(prev.cloned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn each_entry_gets_its_own_state() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "drafts/one.txt", "1");
        write(b.path(), "drafts/two.txt", "2");
        write(a.path(), "styles.yml", "s");
        write(a.path(), "unlisted.txt", "u");

        let report = sync_entries(
            a.path(),
            b.path(),
            &names(&["drafts", "styles.yml", "output"]),
            &BTreeMap::new(),
            false,
        )
        .unwrap();

        assert!(b.path().join("drafts/one.txt").exists());
        assert!(a.path().join("drafts/two.txt").exists());
        assert!(b.path().join("styles.yml").exists());
        assert!(!b.path().join("unlisted.txt").exists());

        assert!(matches!(report.states.get("drafts"), Some(EntryState::Tree(_))));
        assert!(matches!(report.states.get("styles.yml"), Some(EntryState::File { .. })));
        assert!(!report.states.contains_key("output"));
        assert_eq!(report.outcomes.len(), 3);
    }

    #[test]
    fn deletion_inside_entry_propagates_on_second_run() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "drafts/keep.txt", "k");
        write(a.path(), "drafts/drop.txt", "d");
        let list = names(&["drafts"]);

        let first = sync_entries(a.path(), b.path(), &list, &BTreeMap::new(), false).unwrap();
        fs::remove_file(a.path().join("drafts/drop.txt")).unwrap();
        sync_entries(a.path(), b.path(), &list, &first.states, false).unwrap();

        assert!(b.path().join("drafts/keep.txt").exists());
        assert!(!b.path().join("drafts/drop.txt").exists());
    }

    #[test]
    fn dry_run_keeps_previous_states() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "drafts/one.txt", "1");

        let report =
            sync_entries(a.path(), b.path(), &names(&["drafts"]), &BTreeMap::new(), true).unwrap();

        assert!(report.states.is_empty());
        assert!(!b.path().join("drafts").exists());
        assert_eq!(report.outcomes[0].1.change_count(), 2);
    }

    #[test]
    fn parent_entry_name_is_refused_before_copying() {
        let t = TempDir::new().unwrap();
        let (a, b) = (t.path().join("x/a"), t.path().join("y/b"));
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write(&t.path().join("x"), "outside_a.txt", "secret");

        let err = sync_entries(&a, &b, &names(&[".."]), &BTreeMap::new(), false).unwrap_err();

        assert!(matches!(err, SyncError::InvalidEntryName { .. }));
        assert!(!t.path().join("y/outside_a.txt").exists());
    }

    #[test]
    fn nested_entry_paths_are_refused() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        write(a.path(), "drafts/one.txt", "1");

        for bad in ["drafts/one.txt", "/etc", ""] {
            let err =
                sync_entries(a.path(), b.path(), &names(&[bad]), &BTreeMap::new(), false).unwrap_err();
            assert!(matches!(err, SyncError::InvalidEntryName { .. }), "{bad:?}");
        }
        assert!(!b.path().join("drafts").exists());
    }

    #[test]
    fn missing_root_is_seeded_entry_by_entry() {
        let a = TempDir::new().unwrap();
        let t = TempDir::new().unwrap();
        let b = t.path().join("fresh");
        write(a.path(), "drafts/one.txt", "1");
        write(a.path(), "unlisted.txt", "u");

        let report =
            sync_entries(a.path(), &b, &names(&["drafts"]), &BTreeMap::new(), false).unwrap();

        assert!(b.join("drafts/one.txt").exists());
        assert!(!b.join("unlisted.txt").exists());
        assert!(matches!(report.states.get("drafts"), Some(EntryState::Tree(_))));
    }

    #[test]
    fn both_roots_missing_is_an_error() {
        let t = TempDir::new().unwrap();
        let err = sync_entries(
            &t.path().join("a"),
            &t.path().join("b"),
            &names(&["drafts"]),
            &BTreeMap::new(),
            false,
        )
        .unwrap_err();

        assert!(matches!(err, SyncError::RootNotFound { .. }));
    }
}
