//! Watcher runtime: one polling task per registered pair.

mod error;
pub mod paths;
pub mod probe;
mod runtime;

pub use error::DaemonError;
pub use probe::{ChangeProbe, Signal};
pub use runtime::{init_tracing, run, start_blocking, CycleSummary, WatchOptions};
