//! Key-value flags recording finished crawls.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{IndexingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    DefaultIndexFinished,
    DocumentIndexFinished,
}

impl SettingsKey {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DefaultIndexFinished => "defaultIndexFinished",
            Self::DocumentIndexFinished => "documentIndexFinished",
        }
    }
}

/// Boolean settings consumed by the crawler.
pub trait SettingsStore: Send + Sync {
    fn get_flag(&self, key: SettingsKey) -> bool;
    fn set_flag(&self, key: SettingsKey, value: bool) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    flags: Mutex<HashMap<SettingsKey, bool>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get_flag(&self, key: SettingsKey) -> bool {
        self.flags.lock().get(&key).copied().unwrap_or(false)
    }

    fn set_flag(&self, key: SettingsKey, value: bool) -> Result<()> {
        self.flags.lock().insert(key, value);
        Ok(())
    }
}

/// Flags kept in a JSON object on disk. Unknown keys are preserved, and a
/// file that does not parse is never overwritten.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(error) => {
                return Err(IndexingError::Internal(format!(
                    "failed to read settings file {}: {error}",
                    self.path.display()
                )))
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(IndexingError::Serialization(format!(
                "settings file {} is not a JSON object",
                self.path.display()
            ))),
            Err(error) => Err(IndexingError::Serialization(format!(
                "settings parse error: {error}"
            ))),
        }
    }

    fn write_object(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                IndexingError::Internal(format!(
                    "failed to create settings directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let serialized = serde_json::to_vec_pretty(&Value::Object(map)).map_err(|error| {
            IndexingError::Serialization(format!("settings serialize error: {error}"))
        })?;
        std::fs::write(&self.path, serialized).map_err(|error| {
            IndexingError::Internal(format!(
                "failed to write settings file {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl SettingsStore for JsonFileSettings {
    fn get_flag(&self, key: SettingsKey) -> bool {
        let _guard = self.lock.lock();
        match self.read_object() {
            Ok(map) => map
                .get(key.as_str())
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Err(error) => {
                log::warn!("settings unreadable, treating {} as unset: {error}", key.as_str());
                false
            }
        }
    }

    fn set_flag(&self, key: SettingsKey, value: bool) -> Result<()> {
        let _guard = self.lock.lock();
        let mut map = self.read_object()?;
        map.insert(key.as_str().to_string(), Value::Bool(value));
        self.write_object(map)
    }
}
