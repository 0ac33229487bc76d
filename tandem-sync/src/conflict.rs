//! Directory-deletion vs file-materialisation conflict resolution.
//!
//! A directory can look deleted on side X (it is in the folder delta's
//! `delete_from_X`) while something underneath it is about to be written
//! onto X: a file or directory in `add_to_X`, a file deleted on X but
//! edited on the other side since the last sync (restored onto X), or a
//! sub-directory being recreated on X. Executing the directory deletion would destroy the
//! location the incoming entry needs, so every such ancestor is moved from
//! `delete_from_X` to `add_to_X`: creation wins over deletion.
//!
//! Running [`resolve`] twice on the same pair of deltas changes nothing the
//! second time.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::delta::{Delta, Files, Folders, Side};
use crate::snapshot::{newer_than, Snapshot};

/// A directory whose deletion on `side` was overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub side: Side,
    pub folder: PathBuf,
    /// The entry whose materialisation required the folder.
    pub because_of: PathBuf,
}

/// Outcome of a resolver pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub promoted: Vec<Promotion>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty()
    }
}

/// Move directory deletions that would race an incoming entry into the
/// corresponding `add_to` set.
pub fn resolve(
    files: &Delta<Files>,
    folders: &mut Delta<Folders>,
    a: &Snapshot,
    b: &Snapshot,
    last_sync: Option<DateTime<Utc>>,
) -> Resolution {
    let mut resolution = Resolution::default();

    for side in [Side::A, Side::B] {
        let survivor = side.other().pick(a, b);
        let mut incoming: BTreeSet<PathBuf> = files.add_to(side).clone();
        incoming.extend(folders.add_to(side).iter().cloned());

        // Files deleted on `side` but edited on the other side are restored.
        incoming.extend(
            files
                .delete_from(side)
                .iter()
                .filter(|p| restores(survivor.files.get(*p).copied(), last_sync))
                .cloned(),
        );

        // Directories deleted on `side` that still see activity on the other
        // side are recreated.
        incoming.extend(
            folders
                .delete_from(side)
                .iter()
                .filter(|p| restores(survivor.folders.get(*p).copied(), last_sync))
                .cloned(),
        );

        for path in &incoming {
            for ancestor in ancestors(path) {
                if folders.promote_to_add(side, &ancestor) {
                    tracing::info!(
                        "keeping folder {} on side {side}: {} is being written there",
                        ancestor.display(),
                        path.display()
                    );
                    resolution.promoted.push(Promotion {
                        side,
                        folder: ancestor,
                        because_of: path.clone(),
                    });
                }
            }
        }
    }

    resolution
}

/// Every proper ancestor of a relative path, nearest first.
///
/// `a/b/c.txt` yields `a/b`, then `a`.
pub fn ancestors(path: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut current = path.parent();
    while let Some(parent) = current {
        if parent.as_os_str().is_empty() {
            break;
        }
        out.push(parent.to_path_buf());
        current = parent.parent();
    }
    out
}

fn restores(survivor_time: Option<DateTime<Utc>>, last_sync: Option<DateTime<Utc>>) -> bool {
    survivor_time.is_some_and(|t| newer_than(t, last_sync))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Entries;
    use chrono::Duration;
    use tandem_core::Baseline;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn snapshot(files: &[(&str, DateTime<Utc>)], folders: &[(&str, DateTime<Utc>)]) -> Snapshot {
        let files: Entries = files.iter().map(|(k, t)| (p(k), *t)).collect();
        let folders: Entries = folders.iter().map(|(k, t)| (p(k), *t)).collect();
        Snapshot::from_parts("/r", files, folders, Utc::now())
    }

    #[test]
    fn ancestors_are_listed_nearest_first() {
        assert_eq!(ancestors(Path::new("a/b/c.txt")), vec![p("a/b"), p("a")]);
        assert!(ancestors(Path::new("top.txt")).is_empty());
    }

    /// Baseline had folder `f`; A removed it, B recreated it with a new file.
    #[test]
    fn new_file_keeps_its_folder_alive() {
        let last = Utc::now() - Duration::hours(1);
        let old = last - Duration::hours(1);
        let new = Utc::now();

        let a = snapshot(&[], &[]);
        // B's folder mtime is deliberately old: the rule must not depend on it.
        let b = snapshot(&[("f/x.txt", new)], &[("f", old)]);
        let baseline = Baseline {
            time: Some(last),
            files: BTreeSet::new(),
            folders: BTreeSet::from([p("f")]),
        };

        let files = Delta::<Files>::classify(&a, &b, &baseline, &BTreeSet::new());
        let mut folders = Delta::<Folders>::classify(&a, &b, &baseline, &BTreeSet::new());
        assert!(folders.delete_from_a.contains(&p("f")));

        let resolution = resolve(&files, &mut folders, &a, &b, baseline.time);

        assert_eq!(resolution.promoted.len(), 1);
        assert_eq!(resolution.promoted[0].folder, p("f"));
        assert!(folders.delete_from_a.is_empty());
        assert!(folders.add_to_a.contains(&p("f")));
    }

    #[test]
    fn restored_file_keeps_whole_ancestor_chain() {
        let last = Utc::now() - Duration::hours(1);
        let old = last - Duration::hours(1);
        let edited = Utc::now();

        let a = snapshot(&[("deep/er/doc.txt", edited)], &[("deep", old), ("deep/er", old)]);
        let b = snapshot(&[], &[]);
        let baseline = Baseline {
            time: Some(last),
            files: BTreeSet::from([p("deep/er/doc.txt")]),
            folders: BTreeSet::from([p("deep"), p("deep/er")]),
        };

        let files = Delta::<Files>::classify(&a, &b, &baseline, &BTreeSet::new());
        let mut folders = Delta::<Folders>::classify(&a, &b, &baseline, &BTreeSet::new());
        resolve(&files, &mut folders, &a, &b, baseline.time);

        assert_eq!(folders.add_to_b, BTreeSet::from([p("deep"), p("deep/er")]));
        assert!(folders.delete_from_b.is_empty());
    }

    #[test]
    fn untouched_deletion_is_left_alone() {
        let last = Utc::now() - Duration::hours(1);
        let old = last - Duration::hours(1);

        let a = snapshot(&[("gone/a.txt", old)], &[("gone", old)]);
        let b = snapshot(&[], &[]);
        let baseline = Baseline {
            time: Some(last),
            files: BTreeSet::from([p("gone/a.txt")]),
            folders: BTreeSet::from([p("gone")]),
        };

        let files = Delta::<Files>::classify(&a, &b, &baseline, &BTreeSet::new());
        let mut folders = Delta::<Folders>::classify(&a, &b, &baseline, &BTreeSet::new());
        let resolution = resolve(&files, &mut folders, &a, &b, baseline.time);

        assert!(resolution.is_empty());
        assert_eq!(folders.delete_from_b, BTreeSet::from([p("gone")]));
    }

    #[test]
    fn resolving_twice_is_a_no_op() {
        let last = Utc::now() - Duration::hours(1);
        let new = Utc::now();

        let a = snapshot(&[], &[]);
        let b = snapshot(&[("f/g/x.txt", new)], &[("f", new), ("f/g", new)]);
        let baseline = Baseline {
            time: Some(last),
            files: BTreeSet::new(),
            folders: BTreeSet::from([p("f"), p("f/g")]),
        };

        let files = Delta::<Files>::classify(&a, &b, &baseline, &BTreeSet::new());
        let mut folders = Delta::<Folders>::classify(&a, &b, &baseline, &BTreeSet::new());
        resolve(&files, &mut folders, &a, &b, baseline.time);
        let after_first = folders.clone();

        let second = resolve(&files, &mut folders, &a, &b, baseline.time);
        assert!(second.is_empty());
        assert_eq!(folders, after_first);
    }
}
