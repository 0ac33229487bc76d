//! Reconciliation of a single path that may be a file, a directory or
//! missing on either side.
//!
//! Used for single-file entries and for entries that exist on one side
//! only. Two directories are handed back to the caller, which runs a full
//! cycle on them.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::delta::Side;
use crate::error::{io_err, PathFailure, SyncError};
use crate::mirror::{mirror_path, MirrorReport};
use crate::snapshot::{newer_than, to_utc};

/// Result of [`reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SingleOutcome {
    /// Nothing to do: both absent, identical, or a one-sided path that has
    /// not changed since the last sync.
    Untouched,
    /// `from` was mirrored onto the other side.
    Transferred { from: Side, report: MirrorReport },
    /// Both sides are directories; run a full cycle.
    NeedsCycle,
    /// A file on one side and a directory on the other. Nothing was touched.
    TypeMismatch(PathFailure),
}

impl SingleOutcome {
    /// Number of filesystem changes made (or planned, in dry-run mode).
    pub fn change_count(&self) -> usize {
        match self {
            SingleOutcome::Transferred { report, .. } => report.change_count(),
            _ => 0,
        }
    }

    pub fn failures(&self) -> Vec<PathFailure> {
        match self {
            SingleOutcome::Transferred { report, .. } => report.failures.clone(),
            SingleOutcome::TypeMismatch(failure) => vec![failure.clone()],
            SingleOutcome::Untouched | SingleOutcome::NeedsCycle => Vec::new(),
        }
    }
}

/// Reconcile `a` and `b`, two absolute paths naming the same entry.
///
/// When only one side exists it is mirrored onto the other if it changed
/// after `last_sync` (or there never was a sync). Otherwise the lone copy is
/// left where it is: a deletion on one side is not propagated here.
pub fn reconcile(
    a: &Path,
    b: &Path,
    last_sync: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<SingleOutcome, SyncError> {
    let rel = a.file_name().or_else(|| b.file_name()).map(Path::new).unwrap_or(Path::new(""));
    reconcile_as(a, b, rel, last_sync, dry_run)
}

/// [`reconcile`] reporting paths relative to `rel` instead of the entry name.
pub(crate) fn reconcile_as(
    a: &Path,
    b: &Path,
    rel: &Path,
    last_sync: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<SingleOutcome, SyncError> {
    match (a.exists(), b.exists()) {
        (false, false) => Ok(SingleOutcome::Untouched),
        (true, false) => one_sided(Side::A, a, b, rel, last_sync, dry_run),
        (false, true) => one_sided(Side::B, b, a, rel, last_sync, dry_run),
        (true, true) => match (a.is_dir(), b.is_dir()) {
            (true, true) => Ok(SingleOutcome::NeedsCycle),
            (false, false) => {
                let (ta, tb) = (modified(a)?, modified(b)?);
                let from = match ta.cmp(&tb) {
                    std::cmp::Ordering::Greater => Side::A,
                    std::cmp::Ordering::Less => Side::B,
                    std::cmp::Ordering::Equal => return Ok(SingleOutcome::Untouched),
                };
                transfer(from, from.pick(a, b), from.other().pick(a, b), rel, dry_run)
            }
            (a_is_dir, _) => {
                let detail = if a_is_dir {
                    "directory on A, file on B"
                } else {
                    "file on A, directory on B"
                };
                let failure = PathFailure::type_mismatch(rel, detail);
                tracing::warn!("skipping {failure}");
                Ok(SingleOutcome::TypeMismatch(failure))
            }
        },
    }
}

fn one_sided(
    side: Side,
    present: &Path,
    missing: &Path,
    rel: &Path,
    last_sync: Option<DateTime<Utc>>,
    dry_run: bool,
) -> Result<SingleOutcome, SyncError> {
    if newer_than(modified(present)?, last_sync) {
        return transfer(side, present, missing, rel, dry_run);
    }
    tracing::info!(
        "{} is gone from {} and unchanged on {side}; leaving it",
        rel.display(),
        side.other()
    );
    Ok(SingleOutcome::Untouched)
}

fn transfer(
    from: Side,
    src: &Path,
    dst: &Path,
    rel: &Path,
    dry_run: bool,
) -> Result<SingleOutcome, SyncError> {
    let mut report = MirrorReport::default();
    mirror_path(src, dst, rel, from.other(), dry_run, &mut report)?;
    Ok(SingleOutcome::Transferred { from, report })
}

fn modified(path: &Path) -> Result<DateTime<Utc>, SyncError> {
    let metadata = fs::metadata(path).map_err(|e| io_err(path, e))?;
    let time = metadata.modified().map_err(|e| io_err(path, e))?;
    Ok(to_utc(time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    fn pair() -> (TempDir, TempDir) {
        (TempDir::new().unwrap(), TempDir::new().unwrap())
    }

    #[test]
    fn both_missing_is_untouched() {
        let (a, b) = pair();
        let outcome = reconcile(&a.path().join("x"), &b.path().join("x"), None, false).unwrap();
        assert_eq!(outcome, SingleOutcome::Untouched);
    }

    #[test]
    fn newer_file_overwrites_older() {
        let (a, b) = pair();
        let (fa, fb) = (a.path().join("styles.yml"), b.path().join("styles.yml"));
        fs::write(&fa, "old").unwrap();
        fs::write(&fb, "new").unwrap();
        set_file_mtime(&fa, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();
        set_file_mtime(&fb, FileTime::from_unix_time(1_700_000_000, 0)).unwrap();

        let outcome = reconcile(&fa, &fb, None, false).unwrap();

        assert!(matches!(outcome, SingleOutcome::Transferred { from: Side::B, .. }));
        assert_eq!(fs::read_to_string(&fa).unwrap(), "new");
    }

    #[test]
    fn lone_new_entry_is_copied_over() {
        let (a, b) = pair();
        let dir = a.path().join("drafts");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("one.txt"), "1").unwrap();

        let outcome = reconcile(&dir, &b.path().join("drafts"), None, false).unwrap();

        let SingleOutcome::Transferred { from, report } = outcome else {
            panic!("expected transfer");
        };
        assert_eq!(from, Side::A);
        assert!(report.failures.is_empty());
        assert!(b.path().join("drafts/one.txt").is_file());
    }

    #[test]
    fn lone_stale_entry_is_left_alone() {
        let (a, b) = pair();
        let fa = a.path().join("styles.yml");
        fs::write(&fa, "x").unwrap();
        set_file_mtime(&fa, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let last_sync = Some(Utc::now() - Duration::hours(1));
        let outcome = reconcile(&fa, &b.path().join("styles.yml"), last_sync, false).unwrap();

        assert_eq!(outcome, SingleOutcome::Untouched);
        assert!(fa.exists());
        assert!(!b.path().join("styles.yml").exists());
    }

    #[test]
    fn two_directories_need_a_cycle() {
        let (a, b) = pair();
        let outcome = reconcile(a.path(), b.path(), None, false).unwrap();
        assert_eq!(outcome, SingleOutcome::NeedsCycle);
    }

    #[test]
    fn file_against_directory_is_a_mismatch() {
        let (a, b) = pair();
        fs::write(a.path().join("output"), "file").unwrap();
        fs::create_dir(b.path().join("output")).unwrap();

        let outcome =
            reconcile(&a.path().join("output"), &b.path().join("output"), None, false).unwrap();

        let SingleOutcome::TypeMismatch(failure) = outcome else {
            panic!("expected mismatch");
        };
        assert_eq!(failure.path, Path::new("output"));
        assert!(a.path().join("output").is_file());
        assert!(b.path().join("output").is_dir());
    }

    #[test]
    fn dry_run_does_not_copy() {
        let (a, b) = pair();
        let fa = a.path().join("new.txt");
        fs::write(&fa, "x").unwrap();

        let outcome = reconcile(&fa, &b.path().join("new.txt"), None, true).unwrap();

        assert!(matches!(outcome, SingleOutcome::Transferred { from: Side::A, .. }));
        assert!(!b.path().join("new.txt").exists());
    }
}
