//! Unconditional one-way mirror.
//!
//! The destination is made identical to the source: changed files are
//! copied, missing directories created, destination-only entries removed and
//! file/directory clashes replaced by whatever the source has. With a filter
//! only the named top-level entries are mirrored, each on its own, and the
//! rest of the destination is left alone.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::delta::Side;
use crate::error::{ensure_disjoint, ensure_entry_names, PathFailure, SyncError};
use crate::executor::{copy_file, remove_entry, EntryType};
use crate::snapshot::{Entries, Snapshot};

/// What a mirror run changed (or would change, in dry-run mode).
///
/// Paths are relative to the destination passed to [`mirror`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub copied: Vec<PathBuf>,
    pub created: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    pub failures: Vec<PathFailure>,
}

impl MirrorReport {
    /// True when nothing needed to change.
    pub fn is_noop(&self) -> bool {
        self.copied.is_empty()
            && self.created.is_empty()
            && self.removed.is_empty()
            && self.failures.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.copied.len() + self.created.len() + self.removed.len()
    }
}

/// Mirror `source` onto `destination`.
///
/// `filter` restricts the run to the named top-level entries of `source`.
/// A missing source (or missing filtered entry) is skipped. Overlapping
/// roots and filter entries that are not plain top-level names are refused
/// before anything is touched.
pub fn mirror(
    source: &Path,
    destination: &Path,
    filter: Option<&[String]>,
    dry_run: bool,
) -> Result<MirrorReport, SyncError> {
    ensure_disjoint(source, destination)?;
    if let Some(names) = filter {
        ensure_entry_names(names)?;
    }

    let mut report = MirrorReport::default();
    match filter {
        Some(names) => {
            for name in names {
                mirror_path(
                    &source.join(name),
                    &destination.join(name),
                    Path::new(name),
                    Side::B,
                    dry_run,
                    &mut report,
                )?;
            }
        }
        None => mirror_path(source, destination, Path::new(""), Side::B, dry_run, &mut report)?,
    }
    Ok(report)
}

/// Mirror a single path, recording results under `rel`.
///
/// `target` names the replica the destination belongs to, for failure
/// reports.
pub(crate) fn mirror_path(
    src: &Path,
    dst: &Path,
    rel: &Path,
    target: Side,
    dry_run: bool,
    report: &mut MirrorReport,
) -> Result<(), SyncError> {
    if !src.exists() {
        tracing::debug!("mirror source missing, nothing to do: {}", src.display());
        return Ok(());
    }

    if src.is_file() {
        if dst.is_dir() {
            remove(dst, rel, EntryType::Folder, target, dry_run, report);
        }
        if dst.is_dir() || differs(src, dst) {
            let result = if dry_run { Ok(()) } else { copy_file(src, dst) };
            record(result, rel, target, &mut report.copied, &mut report.failures);
        }
        return Ok(());
    }

    // Both sides are read before the first removal.
    let source = Snapshot::capture(src)?;
    let existing = if dst.is_dir() {
        Snapshot::capture(dst)?
    } else {
        Snapshot::from_parts(dst, Entries::new(), Entries::new(), Utc::now())
    };

    if dst.is_file() {
        remove(dst, rel, EntryType::File, target, dry_run, report);
    }
    if !dst.is_dir() {
        let result = if dry_run { Ok(()) } else { fs::create_dir_all(dst) };
        record(result, rel, target, &mut report.created, &mut report.failures);
    }

    // Remove what the source does not have, shallowest first.
    let mut gone: BTreeSet<PathBuf> = BTreeSet::new();
    for path in existing.folders.keys() {
        if !source.folders.contains_key(path) && !under_any(path, &gone) {
            remove(&dst.join(path), &rel.join(path), EntryType::Folder, target, dry_run, report);
            gone.insert(path.clone());
        }
    }
    for path in existing.files.keys() {
        if !source.files.contains_key(path) && !under_any(path, &gone) {
            remove(&dst.join(path), &rel.join(path), EntryType::File, target, dry_run, report);
        }
    }

    for path in source.folders.keys() {
        if !existing.folders.contains_key(path) {
            let result = if dry_run {
                Ok(())
            } else {
                fs::create_dir_all(dst.join(path))
            };
            record(result, &rel.join(path), target, &mut report.created, &mut report.failures);
        }
    }

    for (path, mtime) in &source.files {
        let changed = match existing.files.get(path) {
            Some(current) if current == mtime => differs(&src.join(path), &dst.join(path)),
            _ => true,
        };
        if changed {
            let result = if dry_run {
                Ok(())
            } else {
                copy_file(&src.join(path), &dst.join(path))
            };
            record(result, &rel.join(path), target, &mut report.copied, &mut report.failures);
        }
    }

    Ok(())
}

fn remove(
    path: &Path,
    rel: &Path,
    kind: EntryType,
    target: Side,
    dry_run: bool,
    report: &mut MirrorReport,
) {
    let result = if dry_run { Ok(()) } else { remove_entry(path, kind) };
    record(result, rel, target, &mut report.removed, &mut report.failures);
}

fn record(
    result: io::Result<()>,
    rel: &Path,
    target: Side,
    done: &mut Vec<PathBuf>,
    failures: &mut Vec<PathFailure>,
) {
    match result {
        Ok(()) => {
            tracing::debug!("mirrored {}", rel.display());
            done.push(rel.to_path_buf());
        }
        Err(e) => {
            let failure = PathFailure::from_io(rel, target, &e);
            tracing::warn!("mirror skipped {failure}");
            failures.push(failure);
        }
    }
}

/// Whether `dst` is missing or differs from `src` in size or mtime.
fn differs(src: &Path, dst: &Path) -> bool {
    let (Ok(s), Ok(d)) = (fs::metadata(src), fs::metadata(dst)) else {
        return true;
    };
    if s.len() != d.len() {
        return true;
    }
    match (s.modified(), d.modified()) {
        (Ok(ms), Ok(md)) => ms != md,
        _ => true,
    }
}

fn under_any(path: &Path, roots: &BTreeSet<PathBuf>) -> bool {
    path.ancestors().skip(1).any(|p| roots.contains(p))
}
