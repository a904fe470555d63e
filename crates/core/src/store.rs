//! On-disk write helpers

use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomic write helper
///
/// Writes data to a temporary file next to `target`, fsyncs it, then renames
/// it over the target path. Readers see either the old content or the new
/// content, never a partial file. Parent directories are created as needed.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    // Temp file must live on the same filesystem for rename to be atomic
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;

    sync_dir(parent);
    Ok(())
}

/// Best-effort fsync of a directory so the rename itself is durable
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = std::fs::File::open(dir) {
        if let Err(e) = handle.sync_all() {
            tracing::debug!(dir = %dir.display(), "directory fsync failed: {}", e);
        }
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}
