use crate::error::{Error, Result};
use crate::gc::AdvisorThresholds;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub advisor: AdvisorThresholds,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            history: HistoryConfig::default(),
            advisor: AdvisorThresholds::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "default_cpu_interval_ms")]
    pub cpu_interval_ms: u64,

    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,

    /// Upper bound on each jcmd/jstat invocation.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default)]
    pub only_runnable: bool,

    #[serde(default)]
    pub filter_system_frames: bool,

    /// Keep a sample only when one of its frames is in these packages.
    #[serde(default)]
    pub include_packages: Vec<String>,

    /// Drop a sample whose leaf frame is in these packages.
    #[serde(default)]
    pub exclude_packages: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cpu_interval_ms: default_cpu_interval_ms(),
            metrics_interval_ms: default_metrics_interval_ms(),
            max_stack_depth: default_max_stack_depth(),
            probe_timeout_ms: default_probe_timeout_ms(),
            only_runnable: false,
            filter_system_frames: false,
            include_packages: Vec::new(),
            exclude_packages: Vec::new(),
        }
    }
}

impl SamplingConfig {
    pub fn cpu_interval(&self) -> Duration {
        Duration::from_millis(self.cpu_interval_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_stack_capacity")]
    pub stack_capacity: usize,

    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,

    #[serde(default = "default_pause_capacity")]
    pub pause_capacity: usize,

    /// Heap histograms kept after the baseline.
    #[serde(default = "default_heap_snapshot_capacity")]
    pub heap_snapshot_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            stack_capacity: default_stack_capacity(),
            metrics_capacity: default_metrics_capacity(),
            pause_capacity: default_pause_capacity(),
            heap_snapshot_capacity: default_heap_snapshot_capacity(),
        }
    }
}

fn default_cpu_interval_ms() -> u64 {
    50
}

fn default_metrics_interval_ms() -> u64 {
    1000
}

fn default_max_stack_depth() -> usize {
    64
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_stack_capacity() -> usize {
    10_000
}

fn default_metrics_capacity() -> usize {
    300
}

fn default_pause_capacity() -> usize {
    500
}

fn default_heap_snapshot_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Loads `path`, or the platform default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(&expand_path(path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        let zeroes = [
            ("sampling.cpu_interval_ms", self.sampling.cpu_interval_ms == 0),
            ("sampling.metrics_interval_ms", self.sampling.metrics_interval_ms == 0),
            ("sampling.max_stack_depth", self.sampling.max_stack_depth == 0),
            ("sampling.probe_timeout_ms", self.sampling.probe_timeout_ms == 0),
            ("history.stack_capacity", self.history.stack_capacity == 0),
            ("history.metrics_capacity", self.history.metrics_capacity == 0),
            ("history.pause_capacity", self.history.pause_capacity == 0),
            ("history.heap_snapshot_capacity", self.history.heap_snapshot_capacity == 0),
            ("advisor.sustain_samples", self.advisor.sustain_samples == 0),
        ];
        match zeroes.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(Error::Config(format!("{} must be greater than zero", name))),
            None => Ok(()),
        }
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "jvm-sampler", "jvm-sampler")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}
