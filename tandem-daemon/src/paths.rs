use std::path::PathBuf;
use std::time::Duration;

use tandem_core::{paths::is_entry_name, Pair};

/// Default time between two probes of a pair.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause after each watcher-triggered cycle.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Paths whose change signals a pair may need syncing.
///
/// A filtered pair is watched entry by entry on both sides; any other pair is
/// watched at its two roots. Entry names that are not a single top-level
/// component are never watched.
pub fn watch_paths(pair: &Pair) -> Vec<PathBuf> {
    match &pair.entries {
        Some(names) => names
            .iter()
            .filter(|name| is_entry_name(name))
            .flat_map(|name| [pair.side_a.join(name), pair.side_b.join(name)])
            .collect(),
        None => vec![pair.side_a.clone(), pair.side_b.clone()],
    }
}
