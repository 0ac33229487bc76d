//! `tandem init <name> <side_a> <side_b> [--only NAME]... [--mirror]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use tandem_core::{registry, PairName, SyncMode};

use super::{absolute, home};

/// Register a pair of replicas.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Pair name. Creates ~/.tandem/pairs/<name>.yaml
    pub name: String,

    /// Replica A (the source when `--mirror` is set).
    pub side_a: PathBuf,

    /// Replica B.
    pub side_b: PathBuf,

    /// Only sync this top-level entry. Repeat for several.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Mirror A onto B one way instead of syncing both directions.
    #[arg(long)]
    pub mirror: bool,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let side_a = absolute(&self.side_a)?;
        let side_b = absolute(&self.side_b)?;
        let mode = if self.mirror {
            SyncMode::Mirror
        } else {
            SyncMode::Bidirectional
        };
        let entries = (!self.only.is_empty()).then_some(self.only);

        let pair = registry::init_at(
            &home,
            PairName::from(self.name.as_str()),
            side_a,
            side_b,
            mode,
            entries,
        )
        .with_context(|| format!("failed to init pair '{}'", self.name))?;

        println!("✓ Registered '{}' ({})", pair.name, pair.mode);
        println!("  A: {}", pair.side_a.display());
        println!("  B: {}", pair.side_b.display());
        if let Some(entries) = &pair.entries {
            println!("  only: {}", entries.join(", "));
        }
        println!("  Saved to: ~/.tandem/pairs/{}.yaml", pair.name);
        Ok(())
    }
}
