//! Processing progress journal
//!
//! This crate provides the mtime ledger: a durable mapping from absolute
//! input path to the modification time (nanoseconds since the epoch) of the
//! last version that was processed successfully.

pub mod ledger;

// Re-exports
pub use ledger::{mtime_ns, LedgerError, MtimeLedger};

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, LedgerError>;
