//! Cheap change detection for watched paths.
//!
//! Each path is reduced to a [`Signal`]: a file's own mtime, or for a
//! directory the sum of its direct children's mtimes plus the child count.
//! Comparing signals between polls tells the watcher a cycle may be needed
//! without walking whole trees. Edits below the first directory level are
//! only seen once they bump a direct child's mtime.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Aggregate modification signal of one watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    /// Sum of mtimes in nanoseconds since the Unix epoch.
    pub mtime_sum: u128,
    /// Number of direct children; zero for a file.
    pub children: usize,
}

/// Tracks the last [`Signal`] of every watched path.
#[derive(Debug, Clone, Default)]
pub struct ChangeProbe {
    last: BTreeMap<PathBuf, Option<Signal>>,
}

impl ChangeProbe {
    /// Watch `paths`. Nothing is read yet, so the first [`poll`](Self::poll)
    /// reports a change for every path that exists.
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            last: paths.into_iter().map(|p| (p, None)).collect(),
        }
    }

    /// Re-read every signal. Returns true when any of them differs from the
    /// previous poll, including a path appearing or disappearing.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        for (path, last) in self.last.iter_mut() {
            let current = signal(path);
            if current != *last {
                tracing::debug!(path = %path.display(), "change suspected");
                changed = true;
            }
            *last = current;
        }
        changed
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.last.keys().map(PathBuf::as_path)
    }
}

/// Signal of `path`, or `None` when it does not exist.
pub fn signal(path: &Path) -> Option<Signal> {
    let metadata = fs::metadata(path).ok()?;
    if metadata.is_file() {
        return Some(Signal {
            mtime_sum: nanos(metadata.modified().ok()?),
            children: 0,
        });
    }

    let mut sum = 0u128;
    let mut children = 0usize;
    // An unreadable directory still yields a signal so that it reads as
    // present.
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            children += 1;
            if let Some(modified) = entry.metadata().ok().and_then(|m| m.modified().ok()) {
                sum = sum.wrapping_add(nanos(modified));
            }
        }
    }
    Some(Signal {
        mtime_sum: sum,
        children,
    })
}

fn nanos(time: SystemTime) -> u128 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    #[test]
    fn first_poll_sees_existing_paths() {
        let tmp = TempDir::new().unwrap();
        let mut probe = ChangeProbe::new([tmp.path().to_path_buf()]);
        assert!(probe.poll());
        assert!(!probe.poll());
    }

    #[test]
    fn absent_paths_are_quiet_until_created() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("styles.yml");
        let mut probe = ChangeProbe::new([file.clone()]);
        assert!(!probe.poll());

        fs::write(&file, "x").unwrap();
        assert!(probe.poll());

        fs::remove_file(&file).unwrap();
        assert!(probe.poll());
    }

    #[test]
    fn child_mtime_change_is_detected() {
        let tmp = TempDir::new().unwrap();
        let child = tmp.path().join("scene.txt");
        fs::write(&child, "v1").unwrap();
        set_file_mtime(&child, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

        let mut probe = ChangeProbe::new([tmp.path().to_path_buf()]);
        let _ = probe.poll();

        set_file_mtime(&child, FileTime::from_unix_time(1_600_000_100, 0)).unwrap();
        assert!(probe.poll());
    }

    #[test]
    fn new_child_changes_count() {
        let tmp = TempDir::new().unwrap();
        let before = signal(tmp.path()).unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        let after = signal(tmp.path()).unwrap();
        assert_eq!(before.children, 0);
        assert_eq!(after.children, 1);
    }
}
