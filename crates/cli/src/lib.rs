//! settle library
//!
//! The `settle` binary is a thin clap front end over these modules; tests
//! drive the watch loop through them directly.

pub mod config;
pub mod daemon;
pub mod logging;
pub mod worker;

pub use config::{ConfigError, WatchConfig, WatchOverrides};
pub use daemon::{run, DaemonError, Phase, RunSummary};
pub use worker::{Outcome, SkipReason, Worker, WorkerError, WorkerStats};
