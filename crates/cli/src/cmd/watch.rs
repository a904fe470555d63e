//! Run the watch loop in the foreground

use crate::WatchArgs;
use anyhow::{Context, Result};
use cli_lib::config::{WatchConfig, WatchOverrides};
use cli_lib::daemon;
use owo_colors::OwoColorize;
use settle_core::{ReportProcessor, StopFile, StopSignal};

pub async fn run(args: WatchArgs) -> Result<()> {
    let overrides = WatchOverrides {
        inputs_dir: args.inputs,
        outputs_dir: args.outputs,
        work_root: args.work_root,
        ledger_path: args.state,
        debounce_ms: args.debounce_ms,
        poll_interval_ms: args.poll_ms,
        no_recursive: args.no_recursive,
        extensions: args.extensions,
        offline: args.offline,
        model: args.model,
        dry_run: args.dry_run,
    };

    let config = WatchConfig::load(&args.root, &overrides)
        .with_context(|| format!("Failed to load configuration for {}", args.root.display()))?;

    let stop = StopFile::for_root(&config.root);
    if stop.is_stop_requested() {
        eprintln!(
            "{} stop marker present at {}; run 'settle start' to clear it",
            "note:".yellow(),
            stop.path().display()
        );
    }

    let processor = ReportProcessor::new(config.process.clone());
    let summary = daemon::run(&config, processor, stop)
        .await
        .context("Watch failed")?;

    eprintln!(
        "{} processed {}, skipped {}, failed {}{}",
        "stopped:".green(),
        summary.worker.processed,
        summary.worker.skipped,
        summary.worker.failed,
        if config.dry_run {
            format!(", dry-run {}", summary.worker.dry_run)
        } else {
            String::new()
        }
    );
    Ok(())
}
