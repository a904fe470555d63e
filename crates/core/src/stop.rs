//! Cooperative stop signal
//!
//! The watch loop never owns its own shutdown flag. It polls a
//! `StopSignal` at a fixed interval, and anything that can flip that
//! signal (another `settle` invocation, a supervisor script, a test)
//! requests a graceful stop.

use crate::paths::ControlPaths;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Read-only view of an external stop request
pub trait StopSignal: Send + Sync {
    /// True once a stop has been requested
    fn is_stop_requested(&self) -> bool;
}

impl<T: StopSignal + ?Sized> StopSignal for Arc<T> {
    fn is_stop_requested(&self) -> bool {
        (**self).is_stop_requested()
    }
}

impl<T: StopSignal + ?Sized> StopSignal for &T {
    fn is_stop_requested(&self) -> bool {
        (**self).is_stop_requested()
    }
}

/// Status reported by `settle status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Running,
    StopRequested,
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopStatus::Running => f.write_str("RUNNING"),
            StopStatus::StopRequested => f.write_str("STOP_REQUESTED"),
        }
    }
}

/// Stop marker materialized as a file under the control directory
///
/// Presence of the file means "stop", absence means "run". The watcher
/// only ever reads it; `request` and `clear` are for external callers.
#[derive(Debug, Clone)]
pub struct StopFile {
    path: PathBuf,
}

impl StopFile {
    /// Stop marker at `<root>/.settle/STOP`
    pub fn for_root(root: &Path) -> Self {
        Self {
            path: ControlPaths::new(root).stop_file(),
        }
    }

    /// Location of the marker
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the marker, returning its path
    ///
    /// Requesting an already-requested stop rewrites the marker in place.
    pub fn request(&self) -> io::Result<PathBuf> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, b"stop")?;
        tracing::info!(path = %self.path.display(), "stop requested");
        Ok(self.path.clone())
    }

    /// Remove the marker; a missing marker is not an error
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "stop cleared");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Current status of the marker
    pub fn status(&self) -> StopStatus {
        if self.is_stop_requested() {
            StopStatus::StopRequested
        } else {
            StopStatus::Running
        }
    }
}

impl StopSignal for StopFile {
    fn is_stop_requested(&self) -> bool {
        std::fs::metadata(&self.path).is_ok()
    }
}

/// In-memory stop signal, for embedding and tests
#[derive(Debug, Default)]
pub struct ManualStop {
    requested: AtomicBool,
}

impl ManualStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

impl StopSignal for ManualStop {
    fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
