//! `tandem sync`: reconcile registered pairs.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use tandem_core::PairName;
use tandem_sync::{
    entries::EntryOutcome,
    pipeline::{self, PairRun, PairSyncResult, SyncScope},
    Action, CycleReport, MirrorReport, PathFailure, SingleOutcome,
};

use super::home;

/// Arguments for `tandem sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Name of the pair to sync (omit when using `--all`).
    pub pair: Option<String>,

    /// Sync every registered pair.
    #[arg(long, conflicts_with = "pair")]
    pub all: bool,

    /// Show what would change without touching either side.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;

        let results = if self.all {
            let results =
                pipeline::run(&home, SyncScope::All, self.dry_run).context("sync --all failed")?;
            if results.is_empty() {
                println!("No pairs registered. Run `tandem init` first.");
            }
            results
        } else {
            let name = self
                .pair
                .clone()
                .context("provide a pair name or use --all")?;
            pipeline::run(&home, SyncScope::Pair(PairName::from(name.as_str())), self.dry_run)
                .with_context(|| format!("sync failed for '{name}'"))?
        };

        for result in &results {
            print_result(result);
        }

        let skipped: usize = results
            .iter()
            .map(|r| r.failures().len() + r.failed_entries().len())
            .sum();
        if skipped > 0 {
            bail!("{skipped} path(s) could not be synced");
        }
        Ok(())
    }
}

fn print_result(result: &PairSyncResult) {
    let prefix = if result.dry_run { "[dry-run] " } else { "" };
    let changes = result.change_count();
    let failures = result.failures();

    if changes == 0 && result.is_clean() {
        println!("{prefix}✓ '{}': nothing to do", result.pair);
        return;
    }

    let verb = if result.dry_run { "planned" } else { "applied" };
    if result.is_clean() {
        println!("{prefix}✓ '{}' synced ({changes} {verb})", result.pair);
    } else {
        println!(
            "{prefix}{} '{}' partially synced ({changes} {verb}, {} skipped)",
            "!".yellow(),
            result.pair,
            failures.len() + result.failed_entries().len()
        );
    }

    match &result.run {
        PairRun::Cycle(report) => print_cycle(report, ""),
        PairRun::Single(SingleOutcome::Transferred { from, report }) => {
            println!("  from {from}");
            print_mirror(report, result.dry_run);
        }
        PairRun::Single(SingleOutcome::TypeMismatch(failure)) => print_failure(failure),
        PairRun::Single(_) => {}
        PairRun::Entries(report) => {
            for (name, outcome) in &report.outcomes {
                match outcome {
                    EntryOutcome::Cycle(cycle) => print_cycle(cycle, name),
                    EntryOutcome::Single(SingleOutcome::Transferred { from, report }) => {
                        println!("  {name}: from {from}");
                        print_mirror(report, result.dry_run);
                    }
                    EntryOutcome::Single(SingleOutcome::TypeMismatch(failure)) => {
                        print_failure(failure)
                    }
                    EntryOutcome::Single(_) => {}
                    EntryOutcome::Failed(detail) => {
                        println!("  {}  {name}: {detail}", "✗".red())
                    }
                }
            }
        }
        PairRun::Mirror(report) => print_mirror(report, result.dry_run),
    }
}

fn print_cycle(report: &CycleReport, entry: &str) {
    if !entry.is_empty() && !report.planned.is_empty() {
        println!("  {entry}:");
    }
    if report.dry_run {
        for action in &report.planned {
            print_action("~", action);
        }
    } else {
        for action in &report.execution.applied {
            print_action("✎", action);
        }
    }
    for failure in report.failures() {
        print_failure(failure);
    }
}

fn print_action(marker: &str, action: &Action) {
    println!("  {marker}  {action}");
}

fn print_mirror(report: &MirrorReport, dry_run: bool) {
    let marker = if dry_run { "~" } else { "✎" };
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
        print_failure(failure);
    }
}

fn print_failure(failure: &PathFailure) {
    println!("  {}  {failure}", "✗".red());
}
