use crate::analysis::leak::HeapSnapshot;
use crate::error::{Error, Result};
use crate::jvm::types::{GcCollector, GcPauseEvent, MetricSnapshot, StackSample};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SESSION_FORMAT_VERSION: u32 = 1;

/// Everything recorded during one sampling run, in capture order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub version: u32,
    #[serde(default)]
    pub pid: Option<u32>,
    pub started_at: i64,
    pub ended_at: i64,
    #[serde(default)]
    pub stacks: Vec<StackSample>,
    #[serde(default)]
    pub metrics: Vec<MetricSnapshot>,
    #[serde(default)]
    pub pauses: Vec<GcPauseEvent>,
    /// Baseline histogram first.
    #[serde(default)]
    pub heap_snapshots: Vec<HeapSnapshot>,
    #[serde(default)]
    pub collector: Option<GcCollector>,
}

impl Session {
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).max(0)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let session: Session = serde_json::from_str(json)?;
        if session.version > SESSION_FORMAT_VERSION {
            return Err(Error::Parse(format!(
                "session format version {} is newer than supported version {}",
                session.version, SESSION_FORMAT_VERSION
            )));
        }
        Ok(session)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Writes the session to `path`, or to a timestamped file in the
    /// platform data directory when `None`. Returns the written path.
    pub fn save(&self, path: Option<&str>) -> Result<PathBuf> {
        let filepath = match path {
            Some(path) => crate::config::expand_path(path),
            None => {
                let dir = directories::ProjectDirs::from("com", "jvm-sampler", "jvm-sampler")
                    .map(|dirs| dirs.data_dir().to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                let timestamp = Local::now().format("%Y%m%d_%H%M%S");
                dir.join(format!("session_{}.json", timestamp))
            }
        };

        if let Some(parent) = filepath.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&filepath, self.to_json()?)?;
        Ok(filepath)
    }
}
