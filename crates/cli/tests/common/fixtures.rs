//! Watch-root fixtures and a recording processor

use cli_lib::config::WatchConfig;
use parking_lot::Mutex;
use settle_core::{Artifact, ProcessError, Processor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A temporary watch root with `inputs/` created
pub struct WatchRoot {
    temp_dir: TempDir,
}

impl WatchRoot {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(temp_dir.path().join("inputs")).expect("Failed to create inputs");
        Self { temp_dir }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn inputs(&self) -> PathBuf {
        self.path().join("inputs")
    }

    pub fn outputs(&self) -> PathBuf {
        self.path().join("outputs")
    }

    /// Defaults for this root with fast timings
    pub fn config(&self) -> WatchConfig {
        let mut config = WatchConfig::for_root(self.path());
        config.debounce = Duration::from_millis(50);
        config.poll_interval = Duration::from_millis(20);
        config
    }

    /// Write a file under `inputs/`, creating parent directories
    pub fn write_input(&self, relative: &str, contents: &[u8]) -> PathBuf {
        let path = self.inputs().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create input parent");
        }
        std::fs::write(&path, contents).expect("Failed to write input");
        path
    }

    /// Names of the files currently in `outputs/`
    pub fn output_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match std::fs::read_dir(self.outputs()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

/// One call to `RecordingProcessor::process`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Processor that records every call and echoes the content back
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessor {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Processor for RecordingProcessor {
    fn process(&mut self, path: &Path, content: &[u8]) -> Result<Artifact, ProcessError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.calls.lock().push(Call {
            file_name,
            content: content.to_vec(),
        });
        Ok(Artifact::new(content.to_vec()))
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
