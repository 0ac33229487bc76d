//! `tandem pair list` and `tandem pair remove <name>`

use anyhow::{Context, Result};
use clap::Subcommand;

use tandem_core::{registry, PairName, SyncMode};
use tandem_sync::state_store;

use super::home;

/// Manage registered pairs.
#[derive(Subcommand, Debug)]
pub enum PairCommand {
    /// List all registered pairs.
    List,

    /// Forget a pair and its sync state. Replica contents are not touched.
    Remove {
        /// Pair name.
        name: String,
    },
}

pub fn run(cmd: PairCommand) -> Result<()> {
    let home = home()?;
    match cmd {
        PairCommand::List => list(&home),
        PairCommand::Remove { name } => remove(&home, &name),
    }
}

fn list(home: &std::path::Path) -> Result<()> {
    let pairs =
        registry::list_pairs_at(home).context("failed to load registry; run `tandem init` first")?;

    if pairs.is_empty() {
        println!("No pairs registered.");
        println!("Run: tandem init <name> <side_a> <side_b>");
        return Ok(());
    }

    for pair in &pairs {
        let arrow = match pair.mode {
            SyncMode::Bidirectional => "<->",
            SyncMode::Mirror => "->",
        };
        println!(
            "{} ({}): {} {arrow} {}",
            pair.name,
            pair.mode,
            pair.side_a.display(),
            pair.side_b.display()
        );
        if let Some(entries) = &pair.entries {
            println!("    only: {}", entries.join(", "));
        }
    }
    Ok(())
}

fn remove(home: &std::path::Path, name: &str) -> Result<()> {
    let pair = PairName::from(name);
    registry::remove_pair_at(home, &pair).with_context(|| format!("failed to remove '{name}'"))?;
    state_store::remove_at(home, &pair)
        .with_context(|| format!("failed to remove sync state of '{name}'"))?;
    println!("✓ Removed '{name}'");
    Ok(())
}
