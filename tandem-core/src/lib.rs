//! Tandem core library: domain types and pair registry persistence.
//!
//! Public API surface:
//! - [`types`]: newtypes, [`Baseline`] and registry structs
//! - [`error`]: [`RegistryError`]
//! - [`registry`]: load / save / init / list / remove pairs
//! - [`paths`]: root overlap and entry-name checks

pub mod error;
pub mod paths;
pub mod registry;
pub mod types;

pub use error::RegistryError;
pub use types::{Baseline, EntryState, Pair, PairName, SyncMode};
