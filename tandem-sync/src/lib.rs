//! # tandem-sync
//!
//! Baseline-relative two-replica directory sync.
//!
//! A cycle snapshots both replicas, classifies every path against the
//! baseline left by the previous cycle ([`Delta`]), resolves directory
//! deletions that would race incoming files ([`conflict`]), then plans and
//! applies copies, creations and removals ([`executor`]). The new
//! [`Baseline`](tandem_core::Baseline) is what both replicas hold afterwards.
//!
//! Call [`sync_bidirectional`] for a pair of roots you manage yourself, or
//! [`pipeline::run`] to sync registered pairs with their stored state.

pub mod conflict;
pub mod cycle;
pub mod delta;
pub mod entries;
pub mod error;
pub mod executor;
pub mod mirror;
pub mod pipeline;
pub mod single;
pub mod snapshot;
pub mod state_store;

pub use cycle::{sync_bidirectional, CycleReport, Outcome};
pub use delta::{Delta, Files, Folders, Side};
pub use entries::sync_entries;
pub use error::{FailureKind, PathFailure, SyncError};
pub use executor::{Action, Execution, Reason};
pub use mirror::{mirror, MirrorReport};
pub use pipeline::{PairRun, PairSyncResult, SyncScope};
pub use single::{reconcile, SingleOutcome};
pub use snapshot::Snapshot;
