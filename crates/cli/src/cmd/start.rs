//! Clear a pending stop request

use anyhow::{Context, Result};
use settle_core::StopFile;
use std::path::Path;

pub fn run(root: &Path) -> Result<()> {
    let marker = StopFile::for_root(root);
    marker
        .clear()
        .with_context(|| format!("Failed to remove stop marker {}", marker.path().display()))?;
    Ok(())
}
