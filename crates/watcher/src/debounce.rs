//! Per-path debouncing logic
//!
//! Trailing-edge debounce: every `touch` of a path cancels that path's
//! pending timer and starts a fresh one with the full delay. When a timer
//! survives its delay, the path is pushed onto the settle queue exactly once.
//!
//! Timers are tokio tasks. The table of live timers is the only structure
//! shared between the touching side and the firing side; it is guarded by a
//! single mutex that is never held across the delay or across the send.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Default capacity for the settle queue feeding the worker
pub const SETTLE_QUEUE_CAPACITY: usize = 256;

/// One outstanding timer
struct PendingTimer {
    /// Distinguishes this timer from a newer one for the same path
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TimerTable {
    next_generation: u64,
    timers: HashMap<PathBuf, PendingTimer>,
}

/// Coalesces bursts of touches into one settle event per path
pub struct Debouncer {
    delay: Duration,
    table: Arc<Mutex<TimerTable>>,
    settled_tx: mpsc::Sender<PathBuf>,
    runtime: Handle,
}

impl Debouncer {
    /// Create a debouncer on the current tokio runtime
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(delay: Duration, settled_tx: mpsc::Sender<PathBuf>) -> Self {
        Self::with_handle(delay, settled_tx, Handle::current())
    }

    /// Create a debouncer whose timers run on `runtime`
    ///
    /// `touch` may then be called from any thread, including the notify
    /// backend's own threads.
    pub fn with_handle(delay: Duration, settled_tx: mpsc::Sender<PathBuf>, runtime: Handle) -> Self {
        Self {
            delay,
            table: Arc::new(Mutex::new(TimerTable::default())),
            settled_tx,
            runtime,
        }
    }

    /// Register interest in `path`, restarting its quiet period
    pub fn touch(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut table = self.table.lock();

        if let Some(previous) = table.timers.remove(&path) {
            previous.handle.abort();
            trace!(path = %path.display(), "debounce timer restarted");
        }

        let generation = table.next_generation;
        table.next_generation += 1;

        let delay = self.delay;
        let shared = Arc::clone(&self.table);
        let settled_tx = self.settled_tx.clone();
        let key = path.clone();

        // The lock is held until the new entry is inserted, so even a
        // zero-delay timer cannot look itself up before it exists.
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut table = shared.lock();
                match table.timers.get(&key) {
                    Some(timer) if timer.generation == generation => {
                        table.timers.remove(&key);
                    }
                    // Superseded by a newer touch between wake-up and lock
                    _ => return,
                }
            }

            trace!(path = %key.display(), "path settled");
            if settled_tx.send(key).await.is_err() {
                trace!("settle queue closed, dropping settle event");
            }
        });

        table.timers.insert(path, PendingTimer { generation, handle });
    }

    /// Number of paths currently waiting out their quiet period
    pub fn pending(&self) -> usize {
        self.table.lock().timers.len()
    }

    /// Abort every pending timer without emitting settle events
    pub fn cancel_all(&self) {
        let mut table = self.table.lock();
        for (_, timer) in table.timers.drain() {
            timer.handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
