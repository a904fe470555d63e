//! The processing capability driven by the worker
//!
//! The watcher core knows nothing about what "processing" a file means. It
//! hands the path and its bytes to a `Processor` and persists whatever
//! artifact comes back. `ReportProcessor` is the production implementation.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Suffix replacing the input's extension in the artifact file name
pub const REPORT_SUFFIX: &str = ".report.md";

/// Output of a successful processing step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub contents: Vec<u8>,
}

impl Artifact {
    pub fn new(contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: contents.into(),
        }
    }
}

/// Processing failure; the watermark is left untouched
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("processor rejected {path}: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// Turns the content of one settled file into an artifact
pub trait Processor: Send {
    fn process(&mut self, path: &Path, content: &[u8]) -> Result<Artifact, ProcessError>;
}

/// Values passed through opaquely from configuration to the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub offline: bool,
    pub model: String,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            offline: true,
            model: "default".to_string(),
        }
    }
}

/// Production processor: renders a short Markdown report per input
#[derive(Debug, Clone, Default)]
pub struct ReportProcessor {
    settings: ProcessSettings,
}

impl ReportProcessor {
    pub fn new(settings: ProcessSettings) -> Self {
        Self { settings }
    }
}

impl Processor for ReportProcessor {
    fn process(&mut self, path: &Path, content: &[u8]) -> Result<Artifact, ProcessError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ProcessError::Rejected {
                path: path.to_path_buf(),
                reason: "path has no file name".to_string(),
            })?;

        let report = format!(
            "# settle report\n\n- input: {}\n- bytes: {}\n- offline: {}\n- model: {}\n",
            name,
            content.len(),
            self.settings.offline,
            self.settings.model,
        );

        Ok(Artifact::new(report))
    }
}

/// Deterministic artifact location for an input file
///
/// `<outputs>/<stem>.report.md`, where `<stem>` is the input's base name
/// with its last extension stripped.
pub fn artifact_path(outputs_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outputs_dir.join(format!("{}{}", stem, REPORT_SUFFIX))
}
