//! Initial scan of the input tree
//!
//! Enumerates the inputs directory once at startup. Eligible files become
//! debounce candidates (anything written while the watcher was down gets
//! reconsidered), and directories become notification registrations.

use crate::filter::ExtensionFilter;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Result of walking the input tree
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanResult {
    /// Regular files matching the extension filter
    pub files: Vec<PathBuf>,
    /// Directories to register for notifications (root first)
    pub dirs: Vec<PathBuf>,
}

/// Walk `root`, collecting eligible files and watchable directories
///
/// Files are always collected from the whole tree. Directories below the
/// root are only collected in recursive mode. Entries that cannot be read
/// are logged and skipped.
pub fn scan_tree(root: &Path, recursive: bool, filter: &ExtensionFilter) -> ScanResult {
    let mut result = ScanResult::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry during scan: {}", e);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            if recursive || entry.depth() == 0 {
                result.dirs.push(entry.into_path());
            }
        } else if file_type.is_file() && filter.matches(entry.path()) {
            result.files.push(entry.into_path());
        }
    }

    debug!(
        root = %root.display(),
        files = result.files.len(),
        dirs = result.dirs.len(),
        "initial scan complete"
    );
    result
}
