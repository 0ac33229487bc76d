//! Tandem: keep two directory trees in step.
//!
//! # Usage
//!
//! ```text
//! tandem init <name> <side_a> <side_b> [--only NAME]... [--mirror]
//! tandem pair list
//! tandem pair remove <name>
//! tandem sync <pair> [--dry-run]
//! tandem sync --all [--dry-run]
//! tandem status [--json]
//! tandem mirror <source> <destination> [--only NAME]... [--dry-run]
//! tandem watch [--interval-ms N]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    init::InitArgs, mirror::MirrorArgs, pair::PairCommand, status::StatusArgs, sync::SyncArgs,
    watch::WatchArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tandem",
    version,
    about = "Baseline-relative two-way sync between pairs of directories",
    long_about = None,
)]
struct Cli {
    /// Log debug detail to stderr (`RUST_LOG` overrides).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a pair of replicas.
    Init(InitArgs),

    /// Manage registered pairs.
    Pair {
        #[command(subcommand)]
        command: PairCommand,
    },

    /// Reconcile one or all registered pairs.
    Sync(SyncArgs),

    /// Show pending changes and last sync time of every pair.
    Status(StatusArgs),

    /// Make a destination identical to a source, one way.
    Mirror(MirrorArgs),

    /// Poll registered pairs and sync them when they change.
    Watch(WatchArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match (&cli.command, cli.verbose) {
        (_, true) => "debug",
        (Commands::Watch(_), false) => "info",
        _ => "warn",
    };
    tandem_daemon::init_tracing(level);

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Pair { command } => commands::pair::run(command),
        Commands::Sync(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Mirror(args) => args.run(),
        Commands::Watch(args) => args.run(),
    }
}
