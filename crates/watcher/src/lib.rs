//! File system watching for settle
//!
//! This crate provides:
//! - Per-path trailing-edge debouncing
//! - A notify backend bridged onto a tokio channel
//! - Event classification (content written vs. everything else)
//! - The eligible-extension predicate
//! - The initial scan of the input tree

pub mod debounce;
pub mod filter;
pub mod scan;

pub use debounce::{Debouncer, SETTLE_QUEUE_CAPACITY};
pub use filter::ExtensionFilter;
pub use scan::{scan_tree, ScanResult};

pub use notify::{Event, EventKind};

use notify::event::{AccessKind, AccessMode, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Notification backend failure
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to create filesystem watcher")]
    Init(#[source] notify::Error),

    #[error("failed to watch directory {path}")]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("filesystem watcher failed")]
    Backend(#[source] notify::Error),

    #[error("filesystem watcher stopped delivering events")]
    Closed,
}

/// What a raw notification means for the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Content was created or written
    ContentChanged,
    /// Rename, removal, metadata or access; not acted upon
    Ignored,
}

/// Classify a notify event
///
/// Only creation and data writes count. Renames, removals and attribute
/// changes are ignored.
pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::ContentChanged,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ChangeKind::ContentChanged
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => ChangeKind::ContentChanged,
        _ => ChangeKind::Ignored,
    }
}

/// File system watcher
///
/// Directories are registered one at a time (non-recursively) so the loop
/// decides which new subdirectories to follow. Events arrive on a tokio
/// channel fed from notify's callback thread.
pub struct FsWatcher {
    /// Must stay alive; dropping it stops event delivery
    inner: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    registered: HashSet<PathBuf>,
}

impl FsWatcher {
    /// Create a watcher with nothing registered yet
    pub fn new() -> Result<Self, WatcherError> {
        let (tx, events) = mpsc::unbounded_channel();

        let inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // Receiver gone means the loop is shutting down
            let _ = tx.send(res);
        })
        .map_err(WatcherError::Init)?;

        Ok(Self {
            inner,
            events,
            registered: HashSet::new(),
        })
    }

    /// Start receiving notifications for entries directly inside `dir`
    ///
    /// Returns false if the directory was already registered.
    pub fn register_dir(&mut self, dir: &Path) -> Result<bool, WatcherError> {
        if self.registered.contains(dir) {
            return Ok(false);
        }

        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatcherError::Register {
                path: dir.to_path_buf(),
                source,
            })?;

        debug!(dir = %dir.display(), "watching directory");
        self.registered.insert(dir.to_path_buf());
        Ok(true)
    }

    /// Next raw event from the backend
    ///
    /// Backend errors come back as `Err`; `Closed` means the backend went
    /// away entirely.
    pub async fn next_event(&mut self) -> Result<Event, WatcherError> {
        match self.events.recv().await {
            Some(Ok(event)) => {
                trace!(kind = ?event.kind, paths = ?event.paths, "fs event");
                Ok(event)
            }
            Some(Err(e)) => Err(WatcherError::Backend(e)),
            None => Err(WatcherError::Closed),
        }
    }

    /// Number of registered directories
    pub fn watched_dirs(&self) -> usize {
        self.registered.len()
    }
}
