//! End-to-end tests of the watch loop against a real filesystem

mod common;

use cli_lib::config::WatchConfig;
use cli_lib::daemon::{self, DaemonError, RunSummary};
use cli_lib::worker::WorkerError;
use common::fixtures::wait_for;
use common::{RecordingProcessor, WatchRoot};
use journal::MtimeLedger;
use settle_core::{ManualStop, Processor, ProcessSettings, ReportProcessor};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Allowed shutdown latency beyond one poll interval
const STOP_MARGIN: Duration = Duration::from_millis(250);

/// Give the loop time to finish its scan and register directories
const STARTUP: Duration = Duration::from_millis(200);

fn start<P: Processor + 'static>(
    config: WatchConfig,
    processor: P,
    stop: &Arc<ManualStop>,
) -> JoinHandle<Result<RunSummary, DaemonError>> {
    let stop = Arc::clone(stop);
    tokio::spawn(async move { daemon::run(&config, processor, stop).await })
}

async fn stop_and_join(
    stop: &Arc<ManualStop>,
    handle: JoinHandle<Result<RunSummary, DaemonError>>,
) -> Result<RunSummary, DaemonError> {
    stop.request();
    tokio::time::timeout(STOP_TIMEOUT, handle)
        .await
        .expect("watch loop did not stop in time")
        .expect("watch task panicked")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_inputs_stop_promptly() {
    let root = WatchRoot::new();
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();

    let config = root.config();
    let poll_interval = config.poll_interval;

    let handle = start(config, processor.clone(), &stop);
    tokio::time::sleep(STARTUP).await;
    let requested = std::time::Instant::now();
    let summary = stop_and_join(&stop, handle).await.unwrap();
    let elapsed = requested.elapsed();

    // One poll interval plus teardown
    assert!(
        elapsed <= poll_interval + STOP_MARGIN,
        "stop took {:?} with a {:?} poll interval",
        elapsed,
        poll_interval
    );
    assert_eq!(summary.scanned_files, 0);
    assert_eq!(summary.watched_dirs, 1);
    assert_eq!(processor.call_count(), 0);
    assert!(root.output_names().is_empty());
    assert!(root.path().join("work").is_dir());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_existing_file_is_reported_once() {
    let root = WatchRoot::new();
    let input = root.write_input("a.md", b"hello");
    root.write_input("notes.txt", b"ignored");
    let stop = Arc::new(ManualStop::new());
    let config = root.config();

    let handle = start(
        config.clone(),
        ReportProcessor::new(ProcessSettings::default()),
        &stop,
    );
    let report = root.outputs().join("a.report.md");
    assert!(wait_for(SETTLE_TIMEOUT, || report.exists()).await);
    let summary = stop_and_join(&stop, handle).await.unwrap();

    assert_eq!(summary.scanned_files, 1);
    assert_eq!(summary.worker.processed, 1);
    assert_eq!(root.output_names(), vec!["a.report.md".to_string()]);

    let contents = std::fs::read_to_string(&report).unwrap();
    assert!(contents.contains("- bytes: 5"));
    assert!(contents.contains("- offline: true"));
    assert!(contents.contains("- model: default"));

    let ledger = MtimeLedger::load(&config.ledger_path).unwrap();
    let canonical = input.canonicalize().unwrap();
    assert!(ledger.last_watermark(&canonical) > 0);
    assert_eq!(ledger.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_restart_skips_unchanged_files() {
    let root = WatchRoot::new();
    root.write_input("a.md", b"hello");
    let stop = Arc::new(ManualStop::new());

    let first = RecordingProcessor::new();
    let handle = start(root.config(), first.clone(), &stop);
    assert!(wait_for(SETTLE_TIMEOUT, || first.call_count() == 1).await);
    stop_and_join(&stop, handle).await.unwrap();

    stop.clear();
    let second = RecordingProcessor::new();
    let handle = start(root.config(), second.clone(), &stop);
    tokio::time::sleep(STARTUP * 2).await;
    let summary = stop_and_join(&stop, handle).await.unwrap();

    assert_eq!(second.call_count(), 0);
    assert_eq!(summary.scanned_files, 1);
    assert_eq!(summary.worker.skipped, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_burst_of_writes_processed_once_with_final_content() {
    let root = WatchRoot::new();
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();
    let mut config = root.config();
    config.debounce = Duration::from_millis(300);

    let handle = start(config, processor.clone(), &stop);
    tokio::time::sleep(STARTUP).await;

    for content in ["one", "two", "final"] {
        root.write_input("burst.md", content.as_bytes());
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    assert!(wait_for(SETTLE_TIMEOUT, || processor.call_count() >= 1).await);
    // Nothing else should settle afterwards
    tokio::time::sleep(Duration::from_millis(600)).await;
    stop_and_join(&stop, handle).await.unwrap();

    let calls = processor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].file_name, "burst.md");
    assert_eq!(calls[0].content, b"final");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_subdirectory_is_followed() {
    let root = WatchRoot::new();
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();

    let handle = start(root.config(), processor.clone(), &stop);
    tokio::time::sleep(STARTUP).await;

    std::fs::create_dir(root.inputs().join("sub")).unwrap();
    tokio::time::sleep(STARTUP).await;
    root.write_input("sub/b.md", b"nested");

    let report = root.outputs().join("b.report.md");
    assert!(wait_for(SETTLE_TIMEOUT, || report.exists()).await);
    let summary = stop_and_join(&stop, handle).await.unwrap();

    assert_eq!(summary.watched_dirs, 2);
    assert_eq!(std::fs::read(&report).unwrap(), b"nested");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dry_run_writes_nothing() {
    let root = WatchRoot::new();
    root.write_input("a.md", b"hello");
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();
    let mut config = root.config();
    config.dry_run = true;
    let ledger_path = config.ledger_path.clone();

    let handle = start(config, processor.clone(), &stop);
    tokio::time::sleep(STARTUP * 2).await;
    let summary = stop_and_join(&stop, handle).await.unwrap();

    assert_eq!(summary.worker.dry_run, 1);
    assert_eq!(processor.call_count(), 0);
    assert!(root.output_names().is_empty());
    assert!(!ledger_path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ledger_save_failure_ends_run() {
    let root = WatchRoot::new();
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();
    let mut config = root.config();
    let state_dir = root.path().join("state");
    std::fs::create_dir(&state_dir).unwrap();
    config.ledger_path = state_dir.join("state.json");

    let handle = start(config, processor.clone(), &stop);
    tokio::time::sleep(STARTUP).await;

    // Ledger loaded empty; now make its parent unusable
    std::fs::remove_dir(&state_dir).unwrap();
    std::fs::write(&state_dir, b"not a directory").unwrap();
    root.write_input("a.md", b"hello");

    let result = tokio::time::timeout(STOP_TIMEOUT, handle)
        .await
        .expect("watch loop did not fail in time")
        .expect("watch task panicked");

    assert!(matches!(
        result,
        Err(DaemonError::Worker(WorkerError::Ledger(_)))
    ));
    assert_eq!(processor.call_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_ledger_fails_before_watching() {
    let root = WatchRoot::new();
    let config = root.config();
    std::fs::create_dir_all(config.ledger_path.parent().unwrap()).unwrap();
    std::fs::write(&config.ledger_path, b"{ not json").unwrap();
    let stop = Arc::new(ManualStop::new());

    let result = start(config, RecordingProcessor::new(), &stop)
        .await
        .expect("watch task panicked");

    assert!(matches!(result, Err(DaemonError::Ledger(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_outputs_inside_inputs_is_rejected() {
    let root = WatchRoot::new();
    root.write_input("a.md", b"hello");
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();

    let mut nested = root.config();
    nested.outputs_dir = root.inputs().join("out");
    let result = tokio::time::timeout(STOP_TIMEOUT, start(nested, processor.clone(), &stop))
        .await
        .expect("setup did not fail in time")
        .expect("watch task panicked");
    assert!(matches!(result, Err(DaemonError::OutputsInsideInputs { .. })));

    let mut same = root.config();
    same.outputs_dir = root.inputs();
    let result = tokio::time::timeout(STOP_TIMEOUT, start(same, processor.clone(), &stop))
        .await
        .expect("setup did not fail in time")
        .expect("watch task panicked");
    assert!(matches!(result, Err(DaemonError::OutputsInsideInputs { .. })));

    assert_eq!(processor.call_count(), 0);
    assert!(!root.inputs().join("out/a.report.md").exists());
    assert!(!root.inputs().join("a.report.md").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_outputs_beside_inputs_with_shared_prefix_is_allowed() {
    let root = WatchRoot::new();
    root.write_input("a.md", b"hello");
    let stop = Arc::new(ManualStop::new());
    let processor = RecordingProcessor::new();
    let mut config = root.config();
    config.outputs_dir = root.path().join("inputs-reports");

    let handle = start(config, processor.clone(), &stop);
    let report = root.path().join("inputs-reports/a.report.md");
    assert!(wait_for(SETTLE_TIMEOUT, || report.exists()).await);
    stop_and_join(&stop, handle).await.unwrap();

    assert_eq!(processor.call_count(), 1);
}
