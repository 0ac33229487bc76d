//! Roundtrip serialisation tests for `tandem-core` types.
//!
//! Each `#[case]` is isolated, with no shared state.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use rstest::rstest;
use tandem_core::{Baseline, EntryState, Pair, PairName, SyncMode};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn populated_baseline() -> Baseline {
    Baseline {
        time: Some(Utc::now() - Duration::minutes(5)),
        files: BTreeSet::from([
            PathBuf::from("styles.yml"),
            PathBuf::from("drafts/scene-01.txt"),
        ]),
        folders: BTreeSet::from([PathBuf::from("drafts")]),
    }
}

fn unicode_baseline() -> Baseline {
    Baseline {
        time: Some(Utc::now()),
        files: BTreeSet::from([PathBuf::from("ドラフト/台本 01.txt")]),
        folders: BTreeSet::from([PathBuf::from("ドラフト")]),
    }
}

fn pair_with(mode: SyncMode, entries: Option<Vec<String>>) -> Pair {
    let now = Utc::now();
    Pair {
        name: PairName::from("studio"),
        side_a: PathBuf::from("/game/UserData"),
        side_b: PathBuf::from("/library/studio/UserData"),
        mode,
        entries,
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Baseline
// ---------------------------------------------------------------------------

#[rstest]
#[case::empty(Baseline::default())]
#[case::populated(populated_baseline())]
#[case::unicode(unicode_baseline())]
fn baseline_yaml_roundtrip(#[case] baseline: Baseline) {
    let yaml = serde_yaml::to_string(&baseline).expect("serialize");
    let back: Baseline = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, baseline);
}

// ---------------------------------------------------------------------------
// EntryState
// ---------------------------------------------------------------------------

#[rstest]
#[case::tree(EntryState::Tree(populated_baseline()))]
#[case::file(EntryState::File { time: Utc::now() })]
fn entry_state_yaml_roundtrip(#[case] state: EntryState) {
    let yaml = serde_yaml::to_string(&state).expect("serialize");
    let back: EntryState = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, state);
}

// ---------------------------------------------------------------------------
// Pair
// ---------------------------------------------------------------------------

#[rstest]
#[case::bidirectional(pair_with(SyncMode::Bidirectional, None))]
#[case::mirror(pair_with(SyncMode::Mirror, None))]
#[case::filtered(pair_with(
    SyncMode::Bidirectional,
    Some(vec!["drafts".to_string(), "output".to_string(), "styles.yml".to_string()])
))]
fn pair_yaml_roundtrip(#[case] pair: Pair) {
    let yaml = serde_yaml::to_string(&pair).expect("serialize");
    let back: Pair = serde_yaml::from_str(&yaml).expect("deserialize");
    assert_eq!(back, pair);
}

#[test]
fn pair_without_mode_defaults_to_bidirectional() {
    let yaml = "name: studio\nside_a: /a\nside_b: /b\ncreated_at: 2024-01-01T00:00:00Z\nupdated_at: 2024-01-01T00:00:00Z\n";
    let pair: Pair = serde_yaml::from_str(yaml).expect("deserialize");
    assert_eq!(pair.mode, SyncMode::Bidirectional);
    assert!(pair.entries.is_none());
}
