//! Report whether a stop has been requested

use anyhow::Result;
use settle_core::StopFile;
use std::path::Path;

pub fn run(root: &Path) -> Result<()> {
    // Exact tokens; scripts compare against them
    println!("{}", StopFile::for_root(root).status());
    Ok(())
}
