//! Watch configuration
//!
//! Three layers, later wins:
//! 1. Built-in defaults derived from the watch root
//! 2. `<root>/.settle/config.toml` (optional)
//! 3. Command-line overrides

use serde::{Deserialize, Serialize};
use settle_core::{ControlPaths, ProcessSettings};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use watcher::filter::normalize_extension;

/// Default quiet period before a touched path settles
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;

/// Default stop-marker poll interval
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

const DEBOUNCE_RANGE: std::ops::RangeInclusive<u64> = 1..=60_000;
const POLL_RANGE: std::ops::RangeInclusive<u64> = 10..=60_000;

/// Configuration failure
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Fully resolved configuration for one watch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Watch root; holds the `.settle/` control directory
    pub root: PathBuf,
    pub inputs_dir: PathBuf,
    pub outputs_dir: PathBuf,
    /// Scratch directory; only created at startup
    pub work_root: PathBuf,
    pub ledger_path: PathBuf,
    pub debounce: Duration,
    pub poll_interval: Duration,
    /// Follow newly created subdirectories
    pub recursive: bool,
    /// Eligible extensions, normalized (no dot, lower-case)
    pub extensions: Vec<String>,
    /// Passed through to the processor untouched
    pub process: ProcessSettings,
    /// Report what would be processed without writing anything
    pub dry_run: bool,
}

impl WatchConfig {
    /// Built-in defaults for a watch root
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let control = ControlPaths::new(&root);

        Self {
            inputs_dir: root.join("inputs"),
            outputs_dir: root.join("outputs"),
            work_root: root.join("work"),
            ledger_path: control.state_file(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            recursive: true,
            extensions: vec!["md".to_string()],
            process: ProcessSettings::default(),
            dry_run: false,
            root,
        }
    }

    /// Resolve defaults, the config file under `root`, then `overrides`
    pub fn load(root: &Path, overrides: &WatchOverrides) -> Result<Self, ConfigError> {
        let file = FileConfig::load(&ControlPaths::new(root).config_file())?;

        let mut config = Self::for_root(root);
        config.apply_file(&file);
        config.apply_overrides(overrides);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: &FileConfig) {
        let watch = &file.watch;
        if let Some(dir) = &watch.inputs_dir {
            self.inputs_dir = self.root.join(dir);
        }
        if let Some(dir) = &watch.outputs_dir {
            self.outputs_dir = self.root.join(dir);
        }
        if let Some(dir) = &watch.work_root {
            self.work_root = self.root.join(dir);
        }
        if let Some(path) = &watch.state {
            self.ledger_path = self.root.join(path);
        }
        if let Some(ms) = watch.debounce_ms {
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = watch.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(recursive) = watch.recursive {
            self.recursive = recursive;
        }
        if let Some(extensions) = &watch.extensions {
            self.extensions = extensions.clone();
        }
        if let Some(dry_run) = watch.dry_run {
            self.dry_run = dry_run;
        }

        if let Some(offline) = file.process.offline {
            self.process.offline = offline;
        }
        if let Some(model) = &file.process.model {
            self.process.model = model.clone();
        }
    }

    fn apply_overrides(&mut self, overrides: &WatchOverrides) {
        if let Some(dir) = &overrides.inputs_dir {
            self.inputs_dir = dir.clone();
        }
        if let Some(dir) = &overrides.outputs_dir {
            self.outputs_dir = dir.clone();
        }
        if let Some(dir) = &overrides.work_root {
            self.work_root = dir.clone();
        }
        if let Some(path) = &overrides.ledger_path {
            self.ledger_path = path.clone();
        }
        if let Some(ms) = overrides.debounce_ms {
            self.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if overrides.no_recursive {
            self.recursive = false;
        }
        if !overrides.extensions.is_empty() {
            self.extensions = overrides.extensions.clone();
        }
        if let Some(offline) = overrides.offline {
            self.process.offline = offline;
        }
        if let Some(model) = &overrides.model {
            self.process.model = model.clone();
        }
        if overrides.dry_run {
            self.dry_run = true;
        }
    }

    fn normalize(&mut self) {
        let mut extensions: Vec<String> = self
            .extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();
        extensions.sort();
        extensions.dedup();
        self.extensions = extensions;
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let debounce_ms = self.debounce.as_millis() as u64;
        if !DEBOUNCE_RANGE.contains(&debounce_ms) {
            return Err(ConfigError::Invalid(format!(
                "debounce_ms must be between {} and {} (got {})",
                DEBOUNCE_RANGE.start(),
                DEBOUNCE_RANGE.end(),
                debounce_ms
            )));
        }

        let poll_ms = self.poll_interval.as_millis() as u64;
        if !POLL_RANGE.contains(&poll_ms) {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be between {} and {} (got {})",
                POLL_RANGE.start(),
                POLL_RANGE.end(),
                poll_ms
            )));
        }

        if self.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one eligible extension is required".to_string(),
            ));
        }

        if self.process.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model label must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Command-line overrides; `None`/`false`/empty means "not given"
#[derive(Debug, Clone, Default)]
pub struct WatchOverrides {
    pub inputs_dir: Option<PathBuf>,
    pub outputs_dir: Option<PathBuf>,
    pub work_root: Option<PathBuf>,
    pub ledger_path: Option<PathBuf>,
    pub debounce_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub no_recursive: bool,
    pub extensions: Vec<String>,
    pub offline: Option<bool>,
    pub model: Option<String>,
    pub dry_run: bool,
}

/// On-disk configuration file (`.settle/config.toml`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub watch: WatchSection,
    pub process: ProcessSection,
}

/// `[watch]` section; paths are relative to the watch root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    pub inputs_dir: Option<PathBuf>,
    pub outputs_dir: Option<PathBuf>,
    pub work_root: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub debounce_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub recursive: Option<bool>,
    pub extensions: Option<Vec<String>>,
    pub dry_run: Option<bool>,
}

/// `[process]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSection {
    pub offline: Option<bool>,
    pub model: Option<String>,
}

impl FileConfig {
    /// Load the config file; a missing file yields all-default values
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Example configuration file with every key at its default
pub fn example_config() -> String {
    format!(
        r#"# settle configuration (.settle/config.toml)
# Every key is optional; command-line flags take precedence.

[watch]
# Paths are relative to the watch root
inputs_dir = "inputs"
outputs_dir = "outputs"
work_root = "work"
state = ".settle/state.json"

# Quiet period before a changed file is processed (1-60000)
debounce_ms = {debounce}

# How often the stop marker is checked (10-60000)
poll_interval_ms = {poll}

# Follow subdirectories created while watching
recursive = true

# Eligible file extensions (case-insensitive)
extensions = ["md"]

# Log what would be processed without writing reports or state
dry_run = false

[process]
offline = true
model = "default"
"#,
        debounce = DEFAULT_DEBOUNCE_MS,
        poll = DEFAULT_POLL_INTERVAL_MS,
    )
}
