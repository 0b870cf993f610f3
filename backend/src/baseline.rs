//! Persistence of the keep-list.
//!
//! The file format matches the one the tray tool has always written:
//!
//! ```yaml
//! saved_processes:
//! - chrome.exe
//! - explorer.exe
//! ```

use crate::types::{NoBaselineReason, ProcError, ProcessSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the keep-list lives.
pub trait BaselineStore: Send + Sync {
    /// `Ok(None)` when no keep-list was ever saved. A keep-list that exists
    /// but cannot be read is an error, never an empty set.
    fn load(&self) -> Result<Option<ProcessSet>, ProcError>;

    /// Replace any previous keep-list.
    fn save(&self, set: &ProcessSet) -> Result<(), ProcError>;

    /// The keep-list, read now. Missing, empty and unreadable lists are all
    /// `NoBaseline`; none of them may turn into an empty keep-list.
    fn load_required(&self) -> Result<ProcessSet, ProcError> {
        match self.load()? {
            None => Err(ProcError::NoBaseline(NoBaselineReason::Missing)),
            Some(set) if set.is_empty() => Err(ProcError::NoBaseline(NoBaselineReason::Empty)),
            Some(set) => Ok(set),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BaselineFile {
    #[serde(default)]
    saved_processes: Option<Vec<String>>,
}

/// Keep-list stored as YAML on disk.
#[derive(Debug, Clone)]
pub struct YamlBaselineStore {
    path: PathBuf,
}

impl YamlBaselineStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, message: impl ToString) -> ProcError {
        ProcError::BaselineWrite {
            path: self.path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl BaselineStore for YamlBaselineStore {
    fn load(&self) -> Result<Option<ProcessSet>, ProcError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No keep-list at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(ProcError::NoBaseline(NoBaselineReason::Unreadable(
                    e.to_string(),
                )))
            }
        };

        if contents.trim().is_empty() {
            return Ok(Some(ProcessSet::new()));
        }

        let file: BaselineFile = serde_yaml::from_str(&contents).map_err(|e| {
            ProcError::NoBaseline(NoBaselineReason::Unreadable(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;

        let set: ProcessSet = file
            .saved_processes
            .unwrap_or_default()
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();

        info!("Loaded {} kept processes from {}", set.len(), self.path.display());
        Ok(Some(set))
    }

    fn save(&self, set: &ProcessSet) -> Result<(), ProcError> {
        let file = BaselineFile {
            saved_processes: Some(set.clone().into_vec()),
        };
        let yaml = serde_yaml::to_string(&file).map_err(|e| self.write_error(e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        // Write beside the target and rename so a crash never leaves half a list.
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).map_err(|e| self.write_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.write_error(e))?;

        info!("Saved {} processes to {}", set.len(), self.path.display());
        Ok(())
    }
}

/// Keep-list held in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    set: Mutex<Option<ProcessSet>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(set: ProcessSet) -> Self {
        Self {
            set: Mutex::new(Some(set)),
        }
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn load(&self) -> Result<Option<ProcessSet>, ProcError> {
        Ok(self.set.lock().clone())
    }

    fn save(&self, set: &ProcessSet) -> Result<(), ProcError> {
        *self.set.lock() = Some(set.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> YamlBaselineStore {
        YamlBaselineStore::new(dir.path().join("config.yaml"))
    }

    #[test]
    fn missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store(&dir).load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let set: ProcessSet = ["chrome.exe", "Code.exe"].into_iter().collect();

        store.save(&set).unwrap();
        assert_eq!(store.load().unwrap(), Some(set));
    }

    #[test]
    fn save_overwrites_previous_list() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.save(&["a.exe"].into_iter().collect()).unwrap();
        store.save(&["b.exe"].into_iter().collect()).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert!(loaded.contains("b.exe"));
        assert!(!loaded.contains("a.exe"));
    }

    #[test]
    fn reads_file_written_by_hand() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(
            store.path(),
            "saved_processes:\n- explorer.exe\n- \"my app.exe\"\n- explorer.exe\n",
        )
        .unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("my app.exe"));
    }

    #[test]
    fn empty_and_null_lists_load_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        fs::write(store.path(), "").unwrap();
        assert_eq!(store.load().unwrap(), Some(ProcessSet::new()));

        fs::write(store.path(), "saved_processes:\n").unwrap();
        assert_eq!(store.load().unwrap(), Some(ProcessSet::new()));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        fs::write(store.path(), "saved_processes: [unterminated\n").unwrap();

        match store.load() {
            Err(ProcError::NoBaseline(NoBaselineReason::Unreadable(_))) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn load_required_rejects_missing_and_empty_lists() {
        let store = MemoryBaselineStore::new();
        assert!(matches!(
            store.load_required(),
            Err(ProcError::NoBaseline(NoBaselineReason::Missing))
        ));

        store.save(&ProcessSet::new()).unwrap();
        assert!(matches!(
            store.load_required(),
            Err(ProcError::NoBaseline(NoBaselineReason::Empty))
        ));

        store.save(&["a.exe"].into_iter().collect()).unwrap();
        assert_eq!(store.load_required().unwrap().len(), 1);
    }
}
