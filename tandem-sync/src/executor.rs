//! Delta execution: turn classified deltas into filesystem actions.
//!
//! [`plan`] is pure and decides what happens to every changed path.
//! [`apply`] performs the actions against the two roots. Directory actions
//! run before file actions and each group is ordered by path, so a parent
//! is always created before its children.
//!
//! Every action is applied on its own: an I/O failure is recorded as a
//! [`PathFailure`] and the batch moves on.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use filetime::FileTime;
use serde::Serialize;

use crate::delta::{Delta, Files, Folders, Side};
use crate::error::PathFailure;
use crate::snapshot::{newer_than, Snapshot};

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Whether an action touches a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Folder,
}

/// Why an action was planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// Both sides have the path; the newer copy wins.
    Newer,
    /// One side lacks a path that is not in the baseline.
    Added,
    /// A deletion accepted and propagated to the other side.
    Deleted,
    /// A deleted file was edited on the other side since the last sync.
    EditBeatsDelete,
    /// A deleted directory was touched on the other side since the last sync.
    Recreated,
}

/// A single filesystem operation against one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Copy the file at `path` from side `from` onto the other side.
    Copy {
        path: PathBuf,
        from: Side,
        reason: Reason,
    },
    /// Create the directory `path` on side `on`.
    CreateDir {
        path: PathBuf,
        on: Side,
        reason: Reason,
    },
    /// Remove `path` from side `from`; directories are removed recursively.
    Remove {
        path: PathBuf,
        from: Side,
        kind: EntryType,
        reason: Reason,
    },
}

impl Action {
    pub fn path(&self) -> &Path {
        match self {
            Action::Copy { path, .. }
            | Action::CreateDir { path, .. }
            | Action::Remove { path, .. } => path,
        }
    }

    /// The side this action writes to.
    pub fn target(&self) -> Side {
        match self {
            Action::Copy { from, .. } => from.other(),
            Action::CreateDir { on, .. } => *on,
            Action::Remove { from, .. } => *from,
        }
    }

    pub fn reason(&self) -> Reason {
        match self {
            Action::Copy { reason, .. }
            | Action::CreateDir { reason, .. }
            | Action::Remove { reason, .. } => *reason,
        }
    }

    fn is_folder(&self) -> bool {
        matches!(
            self,
            Action::CreateDir { .. }
                | Action::Remove {
                    kind: EntryType::Folder,
                    ..
                }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Copy { path, from, .. } => {
                write!(f, "copy {} {from} -> {}", path.display(), from.other())
            }
            Action::CreateDir { path, on, .. } => write!(f, "mkdir {} on {on}", path.display()),
            Action::Remove {
                path, from, kind, ..
            } => {
                let what = match kind {
                    EntryType::File => "rm",
                    EntryType::Folder => "rmdir",
                };
                write!(f, "{what} {} on {from}", path.display())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// plan
// ---------------------------------------------------------------------------

/// Decide the action for every changed path.
///
/// `folders` must already have been through [`crate::conflict::resolve`].
pub fn plan(
    files: &Delta<Files>,
    folders: &Delta<Folders>,
    a: &Snapshot,
    b: &Snapshot,
    last_sync: Option<DateTime<Utc>>,
) -> Vec<Action> {
    let mut folder_actions = Vec::new();
    for side in [Side::A, Side::B] {
        let survivor = side.other().pick(a, b);

        for path in folders.add_to(side) {
            folder_actions.push(Action::CreateDir {
                path: path.clone(),
                on: side,
                reason: Reason::Added,
            });
        }

        for path in folders.delete_from(side) {
            let touched = survivor
                .folders
                .get(path)
                .is_some_and(|t| newer_than(*t, last_sync));
            if touched {
                tracing::info!(
                    "folder {} deleted on {side} but touched on {}; recreating",
                    path.display(),
                    side.other()
                );
                folder_actions.push(Action::CreateDir {
                    path: path.clone(),
                    on: side,
                    reason: Reason::Recreated,
                });
            } else {
                folder_actions.push(Action::Remove {
                    path: path.clone(),
                    from: side.other(),
                    kind: EntryType::Folder,
                    reason: Reason::Deleted,
                });
            }
        }
    }

    let mut file_actions = Vec::new();
    for path in files.undeleted_modified.iter().chain(&files.add_to_both) {
        if let Some(from) = newer_side(path, a, b) {
            file_actions.push(Action::Copy {
                path: path.clone(),
                from,
                reason: Reason::Newer,
            });
        }
    }
    for side in [Side::A, Side::B] {
        let survivor = side.other().pick(a, b);

        for path in files.add_to(side) {
            file_actions.push(Action::Copy {
                path: path.clone(),
                from: side.other(),
                reason: Reason::Added,
            });
        }

        for path in files.delete_from(side) {
            let edited = survivor
                .files
                .get(path)
                .is_some_and(|t| newer_than(*t, last_sync));
            if edited {
                tracing::info!(
                    "{} deleted on {side} but edited on {}; restoring",
                    path.display(),
                    side.other()
                );
                file_actions.push(Action::Copy {
                    path: path.clone(),
                    from: side.other(),
                    reason: Reason::EditBeatsDelete,
                });
            } else {
                file_actions.push(Action::Remove {
                    path: path.clone(),
                    from: side.other(),
                    kind: EntryType::File,
                    reason: Reason::Deleted,
                });
            }
        }
    }

    folder_actions.sort_by(|x, y| x.path().cmp(y.path()));
    file_actions.sort_by(|x, y| x.path().cmp(y.path()));
    folder_actions.extend(file_actions);
    folder_actions
}

/// Side holding the strictly newer copy of `path`; `None` on a tie.
fn newer_side(path: &Path, a: &Snapshot, b: &Snapshot) -> Option<Side> {
    let (ta, tb) = (a.files.get(path)?, b.files.get(path)?);
    match ta.cmp(tb) {
        std::cmp::Ordering::Greater => Some(Side::A),
        std::cmp::Ordering::Less => Some(Side::B),
        std::cmp::Ordering::Equal => {
            tracing::debug!("{}: same mtime on both sides, leaving as is", path.display());
            None
        }
    }
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

/// What [`apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Execution {
    /// Actions that completed.
    pub applied: Vec<Action>,
    /// Actions that failed, one entry per path.
    pub failures: Vec<PathFailure>,
}

impl Execution {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Perform `actions` against `root_a` and `root_b`.
///
/// In dry-run mode nothing is touched and the returned [`Execution`] is
/// empty; every action is logged instead.
pub fn apply(actions: &[Action], root_a: &Path, root_b: &Path, dry_run: bool) -> Execution {
    let mut execution = Execution::default();

    let (folder_actions, file_actions): (Vec<&Action>, Vec<&Action>) =
        actions.iter().partition(|a| a.is_folder());

    for action in folder_actions.into_iter().chain(file_actions) {
        if dry_run {
            tracing::info!("[dry-run] would {action}");
            continue;
        }
        match apply_one(action, root_a, root_b) {
            Ok(()) => {
                tracing::info!("{action}");
                execution.applied.push(action.clone());
            }
            Err(e) => {
                let failure = PathFailure::from_io(action.path(), action.target(), &e);
                tracing::warn!("skipped {action}: {failure}");
                execution.failures.push(failure);
            }
        }
    }

    execution
}

fn apply_one(action: &Action, root_a: &Path, root_b: &Path) -> io::Result<()> {
    let root = |side: Side| side.pick(root_a, root_b);
    match action {
        Action::Copy { path, from, .. } => {
            copy_file(&root(*from).join(path), &root(from.other()).join(path))
        }
        Action::CreateDir { path, on, .. } => fs::create_dir_all(root(*on).join(path)),
        Action::Remove {
            path, from, kind, ..
        } => remove_entry(&root(*from).join(path), *kind),
    }
}

/// Copy `src` to `dst` preserving the modification time.
///
/// The data lands in a `.tandem.tmp` sibling first and is renamed into
/// place. Missing parent directories of `dst` are created.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_sibling(dst);
    let result = fs::copy(src, &tmp).and_then(|_| {
        let mtime = FileTime::from_last_modification_time(&fs::metadata(src)?);
        filetime::set_file_mtime(&tmp, mtime)?;
        fs::rename(&tmp, dst)
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Remove a file or a whole directory tree. A path that is already gone is
/// not an error.
pub(crate) fn remove_entry(path: &Path, kind: EntryType) -> io::Result<()> {
    let result = match kind {
        EntryType::File => fs::remove_file(path),
        EntryType::Folder => fs::remove_dir_all(path),
    };
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!("already gone: {}", path.display());
            Ok(())
        }
        other => other,
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tandem.tmp");
    path.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
