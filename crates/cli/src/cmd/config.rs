//! Configuration command
//!
//! Shows the configuration a `settle watch` in this root would run with.

use anyhow::{Context, Result};
use cli_lib::config::{example_config, WatchConfig, WatchOverrides};
use owo_colors::OwoColorize;
use settle_core::ControlPaths;
use std::path::Path;

pub fn run(root: &Path, example: bool) -> Result<()> {
    if example {
        print!("{}", example_config());
        return Ok(());
    }

    let config_path = ControlPaths::new(root).config_file();
    let config = WatchConfig::load(root, &WatchOverrides::default())
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    println!("{}", "Effective Configuration".bold());
    let source = if config_path.exists() {
        config_path.display().to_string()
    } else {
        format!("{} (not present, using defaults)", config_path.display())
    };
    println!("{}: {}\n", "Location".dimmed(), source.dimmed());

    println!("{}", "[watch]".yellow());
    println!("  {} = {}", "inputs_dir".cyan(), config.inputs_dir.display());
    println!("  {} = {}", "outputs_dir".cyan(), config.outputs_dir.display());
    println!("  {} = {}", "work_root".cyan(), config.work_root.display());
    println!("  {} = {}", "state".cyan(), config.ledger_path.display());
    println!(
        "  {} = {} {}",
        "debounce_ms".cyan(),
        config.debounce.as_millis(),
        "(1-60000)".dimmed()
    );
    println!(
        "  {} = {} {}",
        "poll_interval_ms".cyan(),
        config.poll_interval.as_millis(),
        "(10-60000)".dimmed()
    );
    println!("  {} = {}", "recursive".cyan(), config.recursive);
    println!("  {} = {:?}", "extensions".cyan(), config.extensions);
    println!("  {} = {}", "dry_run".cyan(), config.dry_run);

    println!("\n{}", "[process]".yellow());
    println!("  {} = {}", "offline".cyan(), config.process.offline);
    println!("  {} = {:?}", "model".cyan(), config.process.model);

    Ok(())
}
