use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use tandem_core::{registry, Pair, PairName};
use tandem_sync::pipeline::{self, SyncScope};

use crate::error::{io_err, DaemonError};
use crate::paths::{watch_paths, POLL_INTERVAL, SETTLE_DELAY};
use crate::probe::ChangeProbe;

/// Knobs for [`run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub poll_interval: Duration,
    pub dry_run: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            dry_run: false,
        }
    }
}

/// What one watcher-triggered cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub pair: String,
    pub changes: usize,
    pub failures: usize,
    pub duration_ms: u128,
}

/// Start the watcher and block the current thread until it exits.
pub fn start_blocking(home: &Path, options: WatchOptions) -> Result<(), DaemonError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), options))
}

/// Watch every registered pair until ctrl-c.
///
/// Each pair gets its own task, so pairs sync independently while a single
/// pair never runs two cycles at once.
pub async fn run(home: PathBuf, options: WatchOptions) -> Result<(), DaemonError> {
    let pairs = {
        let home = home.clone();
        tokio::task::spawn_blocking(move || registry::list_pairs_at(&home))
            .await
            .map_err(|err| join_error("registry", err))??
    };
    if pairs.is_empty() {
        tracing::warn!("no pairs registered; nothing to watch");
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let mut handles = Vec::new();
    for pair in pairs {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let label = pair.name.to_string();
        let handle = tokio::spawn(async move {
            let result = watch_pair(home, pair, options, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        });
        handles.push((label, handle));
    }

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    signal.map_err(|e| io_err("ctrl-c handler", e))?;
                    tracing::info!("received ctrl-c, stopping watcher");
                    let _ = shutdown.send(());
                    Ok(())
                }
            }
        })
    };

    for (label, handle) in handles {
        handle_join(&label, handle.await)?;
    }
    handle_join("signal_handler", signal_handle.await)?;
    Ok(())
}

/// Poll one pair and sync it whenever its probe reports a change.
///
/// The first tick always syncs. Signals are read before each cycle, so an
/// edit made while a cycle runs shows up on the next poll. The cycle's own
/// writes trigger one more cycle, which finds nothing to do. After a cycle
/// the task pauses for [`SETTLE_DELAY`].
pub(crate) async fn watch_pair(
    home: PathBuf,
    pair: Pair,
    options: WatchOptions,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut probe = ChangeProbe::new(watch_paths(&pair));
    let mut interval = tokio::time::interval(options.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut first = true;

    tracing::info!(pair = %pair.name, paths = probe.paths().count(), "watching");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let changed = probe.poll();
                if !changed && !first {
                    continue;
                }
                first = false;

                match run_cycle(home.clone(), pair.name.clone(), options.dry_run).await {
                    Ok(summary) => {
                        tracing::info!(
                            pair = %summary.pair,
                            changes = summary.changes,
                            failures = summary.failures,
                            duration_ms = summary.duration_ms,
                            "watcher-triggered sync completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(pair = %pair.name, error = %err, "watcher-triggered sync failed");
                    }
                }

                tokio::time::sleep(SETTLE_DELAY).await;
            }
        }
    }

    Ok(())
}

async fn run_cycle(
    home: PathBuf,
    pair: PairName,
    dry_run: bool,
) -> Result<CycleSummary, DaemonError> {
    let started = Instant::now();
    let label = pair.to_string();
    let results = tokio::task::spawn_blocking(move || {
        pipeline::run(&home, SyncScope::Pair(pair), dry_run)
    })
    .await
    .map_err(|err| join_error("sync", err))??;

    Ok(CycleSummary {
        pair: label,
        changes: results.iter().map(|r| r.change_count()).sum(),
        failures: results.iter().map(|r| r.failures().len()).sum(),
        duration_ms: started.elapsed().as_millis(),
    })
}

fn join_error(task: &str, err: tokio::task::JoinError) -> DaemonError {
    DaemonError::Join {
        task: task.to_string(),
        detail: err.to_string(),
    }
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(join_error(task, err)),
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Output goes to
/// stderr. Records from the `log` facade used by the library crates are
/// forwarded as well.
pub fn init_tracing(default_level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::SystemTime;

    use filetime::{set_file_mtime, FileTime};
    use tandem_core::SyncMode;
    use tempfile::TempDir;

    async fn wait_for(path: &Path) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if path.exists() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    fn register(home: &TempDir, a: &Path, b: &Path) -> Pair {
        registry::init_at(
            home.path(),
            PairName::from("studio"),
            a.to_path_buf(),
            b.to_path_buf(),
            SyncMode::Bidirectional,
            None,
        )
        .expect("init")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn first_tick_syncs_and_later_changes_follow() {
        let home = TempDir::new().expect("home");
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        fs::write(a.path().join("initial.txt"), "i").expect("write");
        let pair = register(&home, a.path(), b.path());

        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let options = WatchOptions {
            poll_interval: Duration::from_millis(20),
            dry_run: false,
        };
        let task = tokio::spawn(watch_pair(
            home.path().to_path_buf(),
            pair,
            options,
            shutdown_tx.subscribe(),
        ));

        assert!(wait_for(&b.path().join("initial.txt")).await);

        fs::write(b.path().join("later.txt"), "l").expect("write");
        assert!(wait_for(&a.path().join("later.txt")).await);

        let _ = shutdown_tx.send(());
        task.await.expect("join").expect("watch");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn edit_right_after_a_cycle_is_not_lost() {
        let home = TempDir::new().expect("home");
        let a = TempDir::new().expect("a");
        let b = TempDir::new().expect("b");
        let source = a.path().join("initial.txt");
        fs::write(&source, "v1").expect("write");
        let pair = register(&home, a.path(), b.path());

        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let options = WatchOptions {
            // Longer than the settle pause, so the edit lands before the next poll.
            poll_interval: Duration::from_millis(150),
            dry_run: false,
        };
        let task = tokio::spawn(watch_pair(
            home.path().to_path_buf(),
            pair,
            options,
            shutdown_tx.subscribe(),
        ));

        let replica = b.path().join("initial.txt");
        assert!(wait_for(&replica).await);
        fs::write(&source, "v2").expect("rewrite");
        let later = SystemTime::now() + Duration::from_secs(60);
        set_file_mtime(&source, FileTime::from_system_time(later)).expect("mtime");

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline
            && fs::read_to_string(&replica).expect("read") != "v2"
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(fs::read_to_string(&replica).expect("read"), "v2");

        let _ = shutdown_tx.send(());
        task.await.expect("join").expect("watch");
    }

    #[tokio::test]
    async fn failing_cycle_keeps_the_loop_alive() {
        let home = TempDir::new().expect("home");
        let drive = TempDir::new().expect("drive");
        let pair = register(
            &home,
            &drive.path().join("not-yet"),
            &drive.path().join("nor-this"),
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(4);
        let options = WatchOptions {
            poll_interval: Duration::from_millis(10),
            dry_run: false,
        };
        let task = tokio::spawn(watch_pair(
            home.path().to_path_buf(),
            pair,
            options,
            shutdown_tx.subscribe(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!task.is_finished());
        let _ = shutdown_tx.send(());
        task.await.expect("join").expect("watch");
    }

    #[tokio::test]
    async fn run_without_pairs_returns_immediately() {
        let home = TempDir::new().expect("home");
        run(home.path().to_path_buf(), WatchOptions::default())
            .await
            .expect("run");
    }

    #[tokio::test]
    async fn run_cycle_reports_unknown_pair() {
        let home = TempDir::new().expect("home");
        let err = run_cycle(home.path().to_path_buf(), PairName::from("ghost"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, DaemonError::Sync(_)));
    }
}
