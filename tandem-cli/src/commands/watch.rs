//! `tandem watch`: sync pairs as they change, until ctrl-c.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use tandem_daemon::WatchOptions;

use super::home;

/// Arguments for `tandem watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Milliseconds between change polls of each pair.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
    pub interval_ms: u64,

    /// Log what each triggered cycle would do without applying it.
    #[arg(long)]
    pub dry_run: bool,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let options = WatchOptions {
            poll_interval: Duration::from_millis(self.interval_ms),
            dry_run: self.dry_run,
        };
        println!(
            "Watching registered pairs every {}ms. Press ctrl-c to stop.",
            self.interval_ms
        );
        tandem_daemon::start_blocking(&home, options).context("watcher stopped with an error")
    }
}
