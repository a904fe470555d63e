//! Watch loop lifecycle
//!
//! ```text
//! Scanning ──> Watching ──> Stopping   (stop marker seen)
//!                  │
//!                  └──────> Failed     (watcher backend or ledger failure)
//! ```
//!
//! Filesystem events and the initial scan feed the debouncer; settled paths
//! go to a single worker thread; the stop signal is polled on a fixed
//! interval. Stopping does not drain pending timers or queued paths.

use crate::config::WatchConfig;
use crate::worker::{Worker, WorkerError, WorkerStats};
use journal::{LedgerError, MtimeLedger};
use settle_core::{Processor, StopSignal};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use watcher::{
    classify, scan_tree, ChangeKind, Debouncer, Event, ExtensionFilter, FsWatcher, WatcherError,
    SETTLE_QUEUE_CAPACITY,
};

/// Lifecycle phase of a watch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Scanning,
    Watching,
    Stopping,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Scanning => "scanning",
            Phase::Watching => "watching",
            Phase::Stopping => "stopping",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Fatal watch-run failure
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to prepare directory {path}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error("outputs directory {outputs} is inside inputs directory {inputs}")]
    OutputsInsideInputs { outputs: PathBuf, inputs: PathBuf },

    #[error("failed to start worker thread")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("worker thread exited unexpectedly")]
    WorkerLost,
}

/// What a completed (stopped) run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Eligible files touched by the initial scan
    pub scanned_files: usize,
    /// Directories registered for notifications at exit
    pub watched_dirs: usize,
    pub worker: WorkerStats,
}

/// Run the watch loop until the stop signal is raised
///
/// Returns `Ok` on a requested stop. Setup, ledger-load, watcher-backend
/// and ledger-save failures end the run with an error.
pub async fn run<P, S>(config: &WatchConfig, processor: P, stop: S) -> Result<RunSummary, DaemonError>
where
    P: Processor + 'static,
    S: StopSignal,
{
    // 1. Directories and durable state
    let inputs = prepare_dirs(config)?;
    let ledger = MtimeLedger::load(&config.ledger_path)?;
    info!(
        inputs = %inputs.display(),
        outputs = %config.outputs_dir.display(),
        work_root = %config.work_root.display(),
        ledger = %ledger.path().display(),
        tracked = ledger.len(),
        dry_run = config.dry_run,
        "starting watch"
    );

    // 2. Worker thread fed by the debouncer
    let (settled_tx, settled_rx) = mpsc::channel(SETTLE_QUEUE_CAPACITY);
    let debouncer = Debouncer::new(config.debounce, settled_tx);
    let abandon = Arc::new(AtomicBool::new(false));
    let mut worker_done = spawn_worker(
        Worker::new(ledger, processor, config.outputs_dir.clone(), config.dry_run),
        settled_rx,
        Arc::clone(&abandon),
    )?;

    let filter = ExtensionFilter::new(&config.extensions);
    let mut loop_state = WatchLoop {
        watcher: FsWatcher::new()?,
        debouncer,
        filter,
        recursive: config.recursive,
        scanned_files: 0,
    };

    // 3. Scanning, then Watching until stop or failure
    let mut worker_finished = false;
    let outcome = match loop_state.scan(&inputs) {
        Ok(()) => {
            loop_state
                .watch(config, &stop, &mut worker_done, &mut worker_finished)
                .await
        }
        Err(e) => Err(e),
    };

    // 4. Tear down: no more events, no more settles, worker abandons queue
    let WatchLoop {
        watcher,
        debouncer,
        scanned_files,
        ..
    } = loop_state;
    let watched_dirs = watcher.watched_dirs();
    drop(watcher);
    abandon.store(true, Ordering::SeqCst);
    debouncer.cancel_all();
    drop(debouncer);

    let worker_result = if worker_finished {
        None
    } else {
        Some(worker_done.await)
    };

    if let Err(e) = outcome {
        transition(Phase::Failed);
        error!("watch failed: {}", e);
        return Err(e);
    }

    let worker = match worker_result {
        Some(Ok(Ok(stats))) => stats,
        Some(Ok(Err(e))) => {
            transition(Phase::Failed);
            return Err(e.into());
        }
        Some(Err(_)) | None => {
            transition(Phase::Failed);
            return Err(DaemonError::WorkerLost);
        }
    };

    let summary = RunSummary {
        scanned_files,
        watched_dirs,
        worker,
    };
    info!(
        processed = summary.worker.processed,
        skipped = summary.worker.skipped,
        failed = summary.worker.failed,
        "watch stopped"
    );
    Ok(summary)
}

/// State owned by the loop while Scanning/Watching
struct WatchLoop {
    watcher: FsWatcher,
    debouncer: Debouncer,
    filter: ExtensionFilter,
    recursive: bool,
    scanned_files: usize,
}

impl WatchLoop {
    /// Register directories, then touch every eligible file
    ///
    /// Registration comes first so a file created mid-scan is caught by
    /// either the walk or a notification.
    fn scan(&mut self, inputs: &Path) -> Result<(), DaemonError> {
        transition(Phase::Scanning);

        let scan = scan_tree(inputs, self.recursive, &self.filter);

        // The inputs root itself must be watchable
        self.watcher.register_dir(inputs)?;
        for dir in scan.dirs.iter().filter(|d| d.as_path() != inputs) {
            if let Err(e) = self.watcher.register_dir(dir) {
                warn!(dir = %dir.display(), "{}", e);
            }
        }

        for file in scan.files {
            self.debouncer.touch(file);
            self.scanned_files += 1;
        }

        info!(
            files = self.scanned_files,
            dirs = self.watcher.watched_dirs(),
            "initial scan queued"
        );
        Ok(())
    }

    async fn watch<S: StopSignal>(
        &mut self,
        config: &WatchConfig,
        stop: &S,
        worker_done: &mut oneshot::Receiver<Result<WorkerStats, WorkerError>>,
        worker_finished: &mut bool,
    ) -> Result<(), DaemonError> {
        transition(Phase::Watching);

        let mut stop_poll = interval_at(Instant::now() + config.poll_interval, config.poll_interval);
        stop_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = self.watcher.next_event() => {
                    let event = event?;
                    self.on_event(&event);
                }
                _ = stop_poll.tick() => {
                    if stop.is_stop_requested() {
                        transition(Phase::Stopping);
                        return Ok(());
                    }
                }
                finished = &mut *worker_done => {
                    *worker_finished = true;
                    return Err(match finished {
                        Ok(Err(e)) => e.into(),
                        Ok(Ok(_)) | Err(_) => DaemonError::WorkerLost,
                    });
                }
            }
        }
    }

    /// React to one notification
    fn on_event(&mut self, event: &Event) {
        if classify(&event.kind) != ChangeKind::ContentChanged {
            return;
        }

        for path in &event.paths {
            if self.recursive && path.is_dir() {
                self.follow_new_dir(path);
                continue;
            }

            if self.filter.matches(path) {
                self.debouncer.touch(path.clone());
            }
        }
    }

    /// Register a directory created while watching, plus any directories
    /// already nested inside it; its files are not touched
    fn follow_new_dir(&mut self, dir: &Path) {
        let nested = scan_tree(dir, true, &self.filter);
        for sub in &nested.dirs {
            match self.watcher.register_dir(sub) {
                Ok(true) => debug!(dir = %sub.display(), "following new directory"),
                Ok(false) => {}
                Err(e) => warn!(dir = %sub.display(), "{}", e),
            }
        }
    }
}

fn transition(phase: Phase) {
    info!(%phase, "watch phase");
}

/// Create inputs/outputs/work directories; returns the absolute inputs path
///
/// Reports written under the inputs tree would be picked up as inputs
/// themselves, so an outputs directory at or below inputs is rejected.
fn prepare_dirs(config: &WatchConfig) -> Result<PathBuf, DaemonError> {
    for dir in [&config.inputs_dir, &config.outputs_dir, &config.work_root] {
        std::fs::create_dir_all(dir).map_err(|source| DaemonError::Setup {
            path: dir.clone(),
            source,
        })?;
    }

    let inputs = canonical(&config.inputs_dir)?;
    let outputs = canonical(&config.outputs_dir)?;
    if outputs.starts_with(&inputs) {
        return Err(DaemonError::OutputsInsideInputs { outputs, inputs });
    }

    Ok(inputs)
}

fn canonical(dir: &Path) -> Result<PathBuf, DaemonError> {
    std::fs::canonicalize(dir).map_err(|source| DaemonError::Setup {
        path: dir.to_path_buf(),
        source,
    })
}

fn spawn_worker<P: Processor + 'static>(
    worker: Worker<P>,
    settled: mpsc::Receiver<PathBuf>,
    abandon: Arc<AtomicBool>,
) -> Result<oneshot::Receiver<Result<WorkerStats, WorkerError>>, DaemonError> {
    let (done_tx, done_rx) = oneshot::channel();

    std::thread::Builder::new()
        .name("settle-worker".to_string())
        .spawn(move || {
            let result = worker.run(settled, &abandon);
            // Loop may already be gone on a failed run
            let _ = done_tx.send(result);
        })
        .map_err(DaemonError::WorkerSpawn)?;

    Ok(done_rx)
}
