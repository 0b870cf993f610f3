//! Settings for the engine and its host application.

use crate::types::ProcError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Limits for one termination session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on rounds per session.
    pub max_rounds: u32,

    /// Pause between rounds so restarted programs show up in the next snapshot.
    pub settle_interval_ms: u64,

    /// Termination attempts running at once within a round.
    pub concurrency: usize,

    /// Names shown in the confirmation prompt before "...and N more".
    pub preview_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_rounds: 3,
            settle_interval_ms: 2000,
            concurrency: 4,
            preview_limit: 10,
        }
    }
}

impl SessionConfig {
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ProcError> {
        if self.max_rounds == 0 {
            return Err(ProcError::Config("max_rounds must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ProcError::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Keep-list file.
    pub baseline_path: PathBuf,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    pub session: SessionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            baseline_path: PathBuf::from("config.yaml"),
            log_level: "info".to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ProcError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Settings = serde_yaml::from_str(&contents)
            .map_err(|e| ProcError::Config(format!("{}: {}", path.display(), e)))?;
        settings.session.validate()?;
        Ok(settings)
    }
}
