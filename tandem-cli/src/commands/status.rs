//! `tandem status`: pending changes and last sync of every pair.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tandem_core::{registry, Pair, SyncMode};
use tandem_sync::{pipeline, state_store};

use super::home;

/// Arguments for `tandem status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let pairs = registry::list_pairs_at(&home)
            .context("failed to load registry; run `tandem init` first")?;

        let rows = pairs
            .iter()
            .map(|pair| pair_status(&home, pair))
            .collect::<Result<Vec<_>>>()?;

        if self.json {
            print_json(rows)
        } else {
            print_table(rows);
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PairState {
    InSync,
    NeverSynced,
    Pending,
    Skipping,
    Unavailable,
}

impl PairState {
    fn key(&self) -> &'static str {
        match self {
            PairState::InSync => "in_sync",
            PairState::NeverSynced => "never_synced",
            PairState::Pending => "pending",
            PairState::Skipping => "skipping",
            PairState::Unavailable => "unavailable",
        }
    }

    fn label(&self) -> String {
        match self {
            PairState::InSync => "IN SYNC".green().bold().to_string(),
            PairState::NeverSynced => "NEVER SYNCED".bright_black().bold().to_string(),
            PairState::Pending => "PENDING".yellow().bold().to_string(),
            PairState::Skipping => "SKIPPING".red().bold().to_string(),
            PairState::Unavailable => "UNAVAILABLE".magenta().bold().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct PairStatus {
    pair: String,
    mode: SyncMode,
    state: PairState,
    pending: usize,
    skipped: usize,
    detail: String,
    last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct StatusReportJson {
    pairs: Vec<PairStatusJson>,
}

#[derive(Serialize)]
struct PairStatusJson {
    pair: String,
    mode: SyncMode,
    status: &'static str,
    pending: usize,
    skipped: usize,
    detail: String,
    last_sync_age: String,
    last_sync_at: Option<String>,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "pair")]
    pair: String,
    #[tabled(rename = "mode")]
    mode: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "pending")]
    pending: usize,
    #[tabled(rename = "detail")]
    detail: String,
    #[tabled(rename = "last sync")]
    last_sync: String,
}

/// Plan a dry-run sync of `pair` and summarise it.
///
/// A pair whose sides cannot be read is reported as unavailable rather than
/// failing the whole command.
fn pair_status(home: &Path, pair: &Pair) -> Result<PairStatus> {
    let state = state_store::load_at(home, &pair.name)
        .with_context(|| format!("failed to load sync state for '{}'", pair.name))?;

    let mut status = PairStatus {
        pair: pair.name.to_string(),
        mode: pair.mode,
        state: PairState::InSync,
        pending: 0,
        skipped: 0,
        detail: String::new(),
        last_sync_at: state.synced_at,
    };

    let planned = match pipeline::sync_pair(home, &pair.name, true) {
        Ok(planned) => planned,
        Err(err) => {
            status.state = PairState::Unavailable;
            status.detail = err.to_string();
            return Ok(status);
        }
    };

    status.pending = planned.change_count();
    status.skipped = planned.failures().len() + planned.failed_entries().len();
    status.state = if status.skipped > 0 {
        PairState::Skipping
    } else if status.pending > 0 {
        PairState::Pending
    } else if pair.mode == SyncMode::Bidirectional && state.synced_at.is_none() {
        PairState::NeverSynced
    } else {
        PairState::InSync
    };
    status.detail = match status.state {
        PairState::Skipping => planned
            .failures()
            .first()
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("entries: {}", planned.failed_entries().join(", "))),
        PairState::Pending => format!("{} change(s) to apply", status.pending),
        PairState::NeverSynced => "no baseline yet".to_string(),
        _ => "up to date".to_string(),
    };
    Ok(status)
}

fn print_json(rows: Vec<PairStatus>) -> Result<()> {
    let payload = StatusReportJson {
        pairs: rows
            .into_iter()
            .map(|row| PairStatusJson {
                last_sync_age: last_sync_age(row.last_sync_at),
                last_sync_at: row.last_sync_at.map(|t| t.to_rfc3339()),
                pair: row.pair,
                mode: row.mode,
                status: row.state.key(),
                pending: row.pending,
                skipped: row.skipped,
                detail: row.detail,
            })
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(rows: Vec<PairStatus>) {
    let pending = rows.iter().filter(|r| r.state == PairState::Pending).count();
    println!(
        "Tandem v{} | {} pairs | {} pending",
        env!("CARGO_PKG_VERSION"),
        rows.len(),
        pending,
    );

    if rows.is_empty() {
        println!("No pairs registered.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            pair: row.pair,
            mode: row.mode.to_string(),
            status: row.state.label(),
            pending: row.pending,
            detail: row.detail,
            last_sync: last_sync_age(row.last_sync_at),
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if pending > 0 {
        println!("Run 'tandem sync --all' to apply pending changes.");
    }
}

fn last_sync_age(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => {
            let seconds = Utc::now().signed_duration_since(at).num_seconds().max(0) as u64;
            format!("{} ago", format_seconds(seconds))
        }
        None => "never".to_string(),
    }
}

fn format_seconds(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    if seconds < 60 * 60 {
        return format!("{}m", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h", seconds / (60 * 60));
    }
    format!("{}d", seconds / (60 * 60 * 24))
}
