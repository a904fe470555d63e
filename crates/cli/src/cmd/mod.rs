//! CLI command implementations

pub mod config;
pub mod start;
pub mod status;
pub mod stop;
pub mod watch;
