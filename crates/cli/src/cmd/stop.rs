//! Request that a running watch stop

use anyhow::{Context, Result};
use settle_core::StopFile;
use std::path::Path;

pub fn run(root: &Path) -> Result<()> {
    let marker = StopFile::for_root(root);
    let path = marker
        .request()
        .with_context(|| format!("Failed to write stop marker {}", marker.path().display()))?;

    println!("{}", path.display());
    Ok(())
}
