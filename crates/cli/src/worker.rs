//! Serial worker draining the settle queue
//!
//! For each settled path: stat, compare against the ledger watermark, read,
//! process, write the artifact, then commit the new watermark. Per-file
//! problems (vanished files, unreadable content, processor or artifact
//! failures) are logged and leave the watermark where it was. Only a ledger
//! save failure stops the worker.

use journal::{mtime_ns, LedgerError, MtimeLedger};
use settle_core::{artifact_path, atomic_write, ProcessError, Processor};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Why a settled path was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Gone between touch and settle
    Missing,
    /// Directory or other non-regular entry
    NotAFile,
    /// Watermark already at or past the current mtime
    Unchanged,
    /// Stat or read failed for a reason other than absence
    Unreadable,
}

/// Result of handling one settled path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed { artifact: PathBuf, bytes: usize },
    /// Eligible, but dry-run is on
    DryRun,
    Skipped(SkipReason),
}

/// Failure while handling one settled path
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("failed to write artifact {path}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl WorkerError {
    /// Ledger save failures end the run; everything else is per-file
    pub fn is_fatal(&self) -> bool {
        matches!(self, WorkerError::Ledger(_))
    }
}

/// Counters reported when the worker exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub skipped: usize,
    pub dry_run: usize,
    pub failed: usize,
}

/// Owns the ledger and the processor; single consumer of settled paths
pub struct Worker<P> {
    ledger: MtimeLedger,
    processor: P,
    outputs_dir: PathBuf,
    dry_run: bool,
    stats: WorkerStats,
}

impl<P: Processor> Worker<P> {
    pub fn new(ledger: MtimeLedger, processor: P, outputs_dir: PathBuf, dry_run: bool) -> Self {
        Self {
            ledger,
            processor,
            outputs_dir,
            dry_run,
            stats: WorkerStats::default(),
        }
    }

    /// Handle one settled path and update the counters
    pub fn handle(&mut self, path: &Path) -> Result<Outcome, WorkerError> {
        let result = self.process_path(path);

        match &result {
            Ok(Outcome::Processed { artifact, bytes }) => {
                self.stats.processed += 1;
                info!(path = %path.display(), artifact = %artifact.display(), bytes, "processed");
            }
            Ok(Outcome::DryRun) => {
                self.stats.dry_run += 1;
                info!(path = %path.display(), "dry run: would process");
            }
            Ok(Outcome::Skipped(reason)) => {
                self.stats.skipped += 1;
                debug!(path = %path.display(), ?reason, "skipped");
            }
            Err(e) => {
                self.stats.failed += 1;
                if e.is_fatal() {
                    error!(path = %path.display(), "{}", ErrorChain(e));
                } else {
                    warn!(path = %path.display(), "{}", ErrorChain(e));
                }
            }
        }

        result
    }

    fn process_path(&mut self, path: &Path) -> Result<Outcome, WorkerError> {
        // 1. Stat; a vanished file is not an error
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Outcome::Skipped(SkipReason::Missing))
            }
            Err(e) => {
                debug!(path = %path.display(), "stat failed: {}", e);
                return Ok(Outcome::Skipped(SkipReason::Unreadable));
            }
        };
        if !metadata.is_file() {
            return Ok(Outcome::Skipped(SkipReason::NotAFile));
        }

        // 2. Watermark check
        let mtime = match mtime_ns(&metadata) {
            Ok(mtime) => mtime,
            Err(e) => {
                debug!(path = %path.display(), "no modification time: {}", e);
                return Ok(Outcome::Skipped(SkipReason::Unreadable));
            }
        };
        if mtime <= self.ledger.last_watermark(path) {
            return Ok(Outcome::Skipped(SkipReason::Unchanged));
        }

        if self.dry_run {
            return Ok(Outcome::DryRun);
        }

        // 3. Read; retried on the next modification if this fails
        let content = match std::fs::read(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), "read failed: {}", e);
                return Ok(Outcome::Skipped(SkipReason::Unreadable));
            }
        };

        // 4. Process
        let artifact = self.processor.process(path, &content)?;

        // 5. Persist artifact, then watermark
        let target = artifact_path(&self.outputs_dir, path);
        atomic_write(&target, &artifact.contents).map_err(|source| WorkerError::Artifact {
            path: target.clone(),
            source,
        })?;
        self.ledger.commit(path, mtime)?;

        Ok(Outcome::Processed {
            artifact: target,
            bytes: content.len(),
        })
    }

    /// Drain `settled` until it closes, `abandon` is raised, or a fatal
    /// error occurs
    ///
    /// Blocks the calling thread; run it off the async runtime. The item in
    /// flight when `abandon` is raised is finished, queued items are not.
    pub fn run(
        mut self,
        mut settled: mpsc::Receiver<PathBuf>,
        abandon: &AtomicBool,
    ) -> Result<WorkerStats, WorkerError> {
        while let Some(path) = settled.blocking_recv() {
            if abandon.load(Ordering::SeqCst) {
                debug!("worker abandoning queued paths");
                break;
            }

            match self.handle(&path) {
                Err(e) if e.is_fatal() => return Err(e),
                _ => {}
            }
        }

        debug!(stats = ?self.stats, "worker exiting");
        Ok(self.stats)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn ledger(&self) -> &MtimeLedger {
        &self.ledger
    }
}

/// Renders an error with its source chain on one line
struct ErrorChain<'a>(&'a (dyn std::error::Error + 'static));

impl std::fmt::Display for ErrorChain<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(cause) = source {
            write!(f, ": {}", cause)?;
            source = cause.source();
        }
        Ok(())
    }
}
