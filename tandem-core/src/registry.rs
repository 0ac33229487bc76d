//! Per-pair YAML registry.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tandem/
//!   pairs/
//!     <pair_name>.yaml   (one file per pair, mode 0600)
//! ```
//!
//! # API pattern
//!
//! Every function has two forms:
//! - `fn_at(home: &Path, …)`: explicit home, used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Tests must NEVER call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::RegistryError;
use crate::paths;
use crate::types::{Pair, PairName, SyncMode};

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.tandem/pairs/`
///
/// Creates the directory (mode `0700`) if it does not yet exist.
pub fn pairs_dir_at(home: &Path) -> Result<PathBuf, RegistryError> {
    let dir = home.join(".tandem").join("pairs");
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        set_dir_permissions(&dir)?;
    }
    Ok(dir)
}

/// `<home>/.tandem/pairs/<pair>.yaml`. Pure, no I/O.
pub fn pair_path_at(home: &Path, pair: &PairName) -> PathBuf {
    home.join(".tandem")
        .join("pairs")
        .join(format!("{}.yaml", pair.0))
}

// ---------------------------------------------------------------------------
// 2. Load
// ---------------------------------------------------------------------------

/// Load a single pair from `<home>/.tandem/pairs/<pair>.yaml`.
///
/// Returns `RegistryError::PairNotFound` if absent,
/// `RegistryError::Parse` (with path + line context) if malformed YAML.
pub fn load_pair_at(home: &Path, pair: &PairName) -> Result<Pair, RegistryError> {
    let path = pair_path_at(home, pair);
    if !path.exists() {
        return Err(RegistryError::PairNotFound { path });
    }
    let contents = std::fs::read_to_string(&path)?;
    serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse { path, source: e })
}

/// `load_pair_at` convenience wrapper.
pub fn load_pair(pair: &PairName) -> Result<Pair, RegistryError> {
    load_pair_at(&home()?, pair)
}

/// Read every `<home>/.tandem/pairs/*.yaml`, sorted by pair name.
pub fn list_pairs_at(home: &Path) -> Result<Vec<Pair>, RegistryError> {
    let dir = home.join(".tandem").join("pairs");
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut entries: Vec<_> = std::fs::read_dir(&dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .collect();
    entries.sort_by_key(|e| e.file_name());

    let mut pairs = Vec::new();
    for entry in entries {
        let fname = entry.file_name();
        if !fname.to_string_lossy().ends_with(".yaml") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path())?;
        let pair: Pair = serde_yaml::from_str(&contents).map_err(|e| RegistryError::Parse {
            path: entry.path(),
            source: e,
        })?;
        pairs.push(pair);
    }
    Ok(pairs)
}

/// `list_pairs_at` convenience wrapper.
pub fn list_pairs() -> Result<Vec<Pair>, RegistryError> {
    list_pairs_at(&home()?)
}

// ---------------------------------------------------------------------------
// 3. Save (atomic)
// ---------------------------------------------------------------------------

/// Atomically save a pair to `<home>/.tandem/pairs/<pair>.yaml`.
///
/// Write flow: serialize → `.yaml.tmp` sibling → `chmod 0600` → `rename`.
/// `.tmp` is always in the same directory as the target (same filesystem).
pub fn save_pair_at(home: &Path, pair: &Pair) -> Result<(), RegistryError> {
    pairs_dir_at(home)?;
    let path = pair_path_at(home, &pair.name);
    let tmp_path = path.with_file_name(format!("{}.yaml.tmp", pair.name.0));

    let yaml = serde_yaml::to_string(pair)?;
    std::fs::write(&tmp_path, yaml)?;
    set_file_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, &path)?;
    Ok(())
}

/// `save_pair_at` convenience wrapper.
pub fn save_pair(pair: &Pair) -> Result<(), RegistryError> {
    save_pair_at(&home()?, pair)
}

// ---------------------------------------------------------------------------
// 4. Init
// ---------------------------------------------------------------------------

/// Register a pair named `name` between `side_a` and `side_b`.
///
/// Idempotent: if the pair file already exists, loads and returns it
/// unchanged. The sides do not have to exist yet: a missing side is seeded
/// from the other on the first sync. The sides must not overlap and every
/// filter entry must be a single top-level name.
pub fn init_at(
    home: &Path,
    name: PairName,
    side_a: PathBuf,
    side_b: PathBuf,
    mode: SyncMode,
    entries: Option<Vec<String>>,
) -> Result<Pair, RegistryError> {
    if side_a == side_b {
        return Err(RegistryError::SameRoots { path: side_a });
    }
    if paths::roots_overlap(&side_a, &side_b) {
        return Err(RegistryError::OverlappingRoots {
            a: side_a,
            b: side_b,
        });
    }
    if let Some(bad) = entries.iter().flatten().find(|n| !paths::is_entry_name(n)) {
        return Err(RegistryError::InvalidEntryName { name: bad.clone() });
    }

    let yaml_path = pair_path_at(home, &name);
    if yaml_path.exists() {
        return load_pair_at(home, &name);
    }

    let now = Utc::now();
    let pair = Pair {
        name,
        side_a,
        side_b,
        mode,
        entries,
        created_at: now,
        updated_at: now,
    };
    save_pair_at(home, &pair)?;
    Ok(pair)
}

/// `init_at` convenience wrapper.
pub fn init(
    name: PairName,
    side_a: PathBuf,
    side_b: PathBuf,
    mode: SyncMode,
    entries: Option<Vec<String>>,
) -> Result<Pair, RegistryError> {
    init_at(&home()?, name, side_a, side_b, mode, entries)
}

// ---------------------------------------------------------------------------
// 5. Remove
// ---------------------------------------------------------------------------

/// Delete the pair file. Replica contents are never touched.
pub fn remove_pair_at(home: &Path, pair: &PairName) -> Result<(), RegistryError> {
    let path = pair_path_at(home, pair);
    if !path.exists() {
        return Err(RegistryError::PairNotFound { path });
    }
    std::fs::remove_file(&path)?;
    Ok(())
}

/// `remove_pair_at` convenience wrapper.
pub fn remove_pair(pair: &PairName) -> Result<(), RegistryError> {
    remove_pair_at(&home()?, pair)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, RegistryError> {
    dirs::home_dir().ok_or(RegistryError::HomeNotFound)
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
