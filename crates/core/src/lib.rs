//! Settle Core - shared primitives for the settle watcher
//!
//! This crate provides the pieces every other crate leans on:
//! - Control directory layout (`.settle/`)
//! - Cooperative stop signal (file marker or in-memory)
//! - The `Processor` capability the worker drives
//! - Atomic file replacement

pub mod paths;
pub mod stop;
pub mod process;
pub mod store;

// Re-export main types for convenience
pub use paths::ControlPaths;
pub use process::{artifact_path, Artifact, ProcessError, ProcessSettings, Processor, ReportProcessor};
pub use stop::{ManualStop, StopFile, StopSignal, StopStatus};
pub use store::atomic_write;
