//! `tandem mirror <source> <destination>`: one-way mirror without a
//! registered pair.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use super::absolute;

/// Arguments for `tandem mirror`.
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Directory to copy from. Never modified.
    pub source: PathBuf,

    /// Directory made identical to the source.
    pub destination: PathBuf,

    /// Only mirror this top-level entry. Repeat for several.
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Show what would change without touching the destination.
    #[arg(long)]
    pub dry_run: bool,
}

impl MirrorArgs {
    pub fn run(self) -> Result<()> {
        let source = absolute(&self.source)?;
        let destination = absolute(&self.destination)?;
        if !source.is_dir() {
            bail!("source '{}' is not a directory", source.display());
        }
        let filter = (!self.only.is_empty()).then_some(self.only.as_slice());

        let report = tandem_sync::mirror(&source, &destination, filter, self.dry_run)
            .with_context(|| {
                format!(
                    "mirror failed: {} -> {}",
                    source.display(),
                    destination.display()
                )
            })?;

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        if report.is_noop() {
            println!("{prefix}✓ '{}' already mirrored", destination.display());
            return Ok(());
        }

        println!(
            "{prefix}✓ mirrored '{}' ({} copied, {} created, {} removed)",
            destination.display(),
            report.copied.len(),
            report.created.len(),
            report.removed.len()
        );
        let marker = if self.dry_run { "~" } else { "✎" };
        for path in &report.created {
            println!("  {marker}  mkdir {}", path.display());
        }
        for path in &report.copied {
            println!("  {marker}  copy {}", path.display());
        }
        for path in &report.removed {
            println!("  {marker}  rm {}", path.display());
        }
        for failure in &report.failures {
            println!("  {}  {failure}", "✗".red());
        }

        if !report.failures.is_empty() {
            bail!("{} path(s) could not be mirrored", report.failures.len());
        }
        Ok(())
    }
}
