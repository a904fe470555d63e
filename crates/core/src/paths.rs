//! Control directory layout
//!
//! Every file the watcher owns outside of the inputs/outputs trees lives
//! under a single control directory at the watch root:
//! ```text
//! <root>/
//!   .settle/
//!     STOP          stop marker (presence = stop requested)
//!     state.json    mtime ledger
//!     config.toml   optional configuration overrides
//! ```

use std::path::PathBuf;

/// Name of the control directory under the watch root
pub const CONTROL_DIR: &str = ".settle";

/// Resolved paths inside the control directory of a watch root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPaths {
    root: PathBuf,
}

impl ControlPaths {
    /// Control paths for the given watch root
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<root>/.settle`
    pub fn control_dir(&self) -> PathBuf {
        self.root.join(CONTROL_DIR)
    }

    /// `<root>/.settle/STOP`
    pub fn stop_file(&self) -> PathBuf {
        self.control_dir().join("STOP")
    }

    /// `<root>/.settle/state.json`
    pub fn state_file(&self) -> PathBuf {
        self.control_dir().join("state.json")
    }

    /// `<root>/.settle/config.toml`
    pub fn config_file(&self) -> PathBuf {
        self.control_dir().join("config.toml")
    }
}
