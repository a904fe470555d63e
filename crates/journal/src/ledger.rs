//! Whole-file JSON mtime ledger
//!
//! Layout on disk is a single pretty-printed object:
//! ```json
//! {
//!   "/abs/inputs/a.md": 1717171717123456789
//! }
//! ```
//! The ledger is loaded once at startup and rewritten in full after every
//! successful processing step. Only the worker mutates it, so there is no
//! internal locking.

use crate::Result;
use std::collections::BTreeMap;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use thiserror::Error;
use tracing::debug;

/// Ledger load/save failure
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ledger {path} is malformed")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize ledger")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to write ledger {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Per-path processing watermarks backed by a JSON document
#[derive(Debug)]
pub struct MtimeLedger {
    /// Backing file
    path: PathBuf,
    /// path -> mtime_ns of last processed version
    entries: BTreeMap<String, i64>,
}

impl MtimeLedger {
    /// Empty ledger that will be saved to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the ledger at `path`
    ///
    /// A missing or empty file yields an empty ledger. Malformed content is
    /// an error; progress history is never silently reset.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet, starting empty");
                return Ok(Self::empty(path));
            }
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty(path));
        }

        let entries = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(source) => return Err(LedgerError::Malformed { path, source }),
        };

        let ledger = Self { path, entries };
        debug!(path = %ledger.path.display(), entries = ledger.len(), "ledger loaded");
        Ok(ledger)
    }

    /// Write the full mapping to the backing file
    ///
    /// The document is written next to the target and renamed into place,
    /// so a concurrent reader never observes a half-written ledger.
    pub fn save(&self) -> Result<()> {
        let mut serialized =
            serde_json::to_vec_pretty(&self.entries).map_err(LedgerError::Serialize)?;
        serialized.push(b'\n');

        settle_core::atomic_write(&self.path, &serialized).map_err(|source| LedgerError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Watermark for `path`, 0 when it has never been processed
    pub fn last_watermark(&self, path: &Path) -> i64 {
        self.entries.get(&key(path)).copied().unwrap_or(0)
    }

    /// In-memory update; a watermark never moves backwards
    ///
    /// Returns true when the stored value changed.
    pub fn set_watermark(&mut self, path: &Path, mtime_ns: i64) -> bool {
        if mtime_ns <= self.last_watermark(path) {
            return false;
        }
        self.entries.insert(key(path), mtime_ns);
        true
    }

    /// Set the watermark and persist it
    ///
    /// If the save fails the in-memory entry is restored, so the ledger
    /// never claims progress that is not on disk.
    pub fn commit(&mut self, path: &Path, mtime_ns: i64) -> Result<()> {
        let key = key(path);
        let previous = self.entries.get(&key).copied();

        if !self.set_watermark(path, mtime_ns) {
            return Ok(());
        }

        if let Err(e) = self.save() {
            match previous {
                Some(value) => self.entries.insert(key, value),
                None => self.entries.remove(&key),
            };
            return Err(e);
        }

        Ok(())
    }

    /// Backing file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of tracked paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Modification time of `metadata` in nanoseconds since the epoch
///
/// Times before the epoch come back negative.
pub fn mtime_ns(metadata: &Metadata) -> io::Result<i64> {
    let modified = metadata.modified()?;
    let ns = match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    };
    Ok(ns)
}
