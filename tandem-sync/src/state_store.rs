//! State store: the baseline each pair carries from one cycle to the next.
//!
//! Persists a [`StateFile`] JSON document at
//! `<home>/.tandem/state/<pair_name>.json`.
//! Writes use the same atomic `.tmp` + rename pattern as the registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tandem_core::{Baseline, EntryState, PairName};

use crate::error::{io_err, SyncError};

/// On-disk state payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StateFile {
    /// When the state was last written; `None` before the first sync.
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
    /// Baseline of a whole-root pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Baseline>,
    /// Per-entry state of a filtered pair.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub entries: BTreeMap<String, EntryState>,
}

impl StateFile {
    /// Baseline for a whole-root cycle; empty when the pair never synced.
    pub fn root_baseline(&self) -> Baseline {
        self.root.clone().unwrap_or_default()
    }
}

/// Path to the state JSON for a given pair, rooted at `home`.
///
/// `~/.tandem/state/<pair_name>.json`
pub fn store_path_at(home: &Path, pair: &PairName) -> PathBuf {
    home.join(".tandem")
        .join("state")
        .join(format!("{pair}.json"))
}

/// Load the state for `pair`.
///
/// Returns an empty state if the file does not yet exist.
pub fn load_at(home: &Path, pair: &PairName) -> Result<StateFile, SyncError> {
    let path = store_path_at(home, pair);
    if !path.exists() {
        return Ok(StateFile::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save the state for `pair` atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save_at(home: &Path, pair: &PairName, state: &StateFile) -> Result<(), SyncError> {
    let path = store_path_at(home, pair);
    let Some(dir) = path.parent() else {
        return Err(io_err(path, std::io::Error::other("invalid state store path")));
    };

    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// Delete the stored state for `pair`. A missing file is not an error.
pub fn remove_at(home: &Path, pair: &PairName) -> Result<(), SyncError> {
    let path = store_path_at(home, pair);
    match std::fs::remove_file(&path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(io_err(path, e)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn studio() -> PairName {
        PairName::from("studio")
    }

    #[test]
    fn empty_state_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let state = load_at(tmp.path(), &PairName::from("nonexistent")).unwrap();
        assert_eq!(state, StateFile::default());
        assert!(state.root_baseline().is_empty());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let baseline = Baseline {
            time: Some(Utc::now()),
            files: BTreeSet::from([PathBuf::from("drafts/a.txt")]),
            folders: BTreeSet::from([PathBuf::from("drafts")]),
        };
        let mut entries = BTreeMap::new();
        entries.insert("drafts".to_string(), EntryState::Tree(baseline.clone()));
        entries.insert("styles.yml".to_string(), EntryState::File { time: Utc::now() });
        let state = StateFile {
            synced_at: Some(Utc::now()),
            root: Some(baseline),
            entries,
        };

        save_at(tmp.path(), &studio(), &state).unwrap();
        let loaded = load_at(tmp.path(), &studio()).unwrap();
        assert_eq!(loaded, state);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &studio(), &StateFile::default()).unwrap();
        let tmp_path = store_path_at(tmp.path(), &studio()).with_extension("json.tmp");
        assert!(
            !tmp_path.exists(),
            "tmp file should be removed after atomic rename"
        );
    }

    #[test]
    fn malformed_state_is_a_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = store_path_at(tmp.path(), &studio());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();

        let err = load_at(tmp.path(), &studio()).unwrap_err();
        assert!(matches!(err, SyncError::Json(_)));
    }

    #[test]
    fn remove_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &studio(), &StateFile::default()).unwrap();
        remove_at(tmp.path(), &studio()).unwrap();
        remove_at(tmp.path(), &studio()).unwrap();
        assert!(!store_path_at(tmp.path(), &studio()).exists());
    }
}
