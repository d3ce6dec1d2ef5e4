use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{canonicalize_existing_path, IndexingError, Result};
use crate::mode;

pub const INDEXING_CONFIG_FILENAME: &str = "indexing.json";

/// Crawler configuration. Every field has a default, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    /// Roots crawled by the default mode.
    pub default_targets: Vec<PathBuf>,
    /// Roots shared by the name and content modes.
    pub document_targets: Vec<PathBuf>,
    /// Extra subtrees never descended into.
    pub ignored_paths: Vec<PathBuf>,
    pub journal_path: PathBuf,
    /// Plist dictionary of aliases; no aliases when unset.
    pub alias_path: Option<PathBuf>,
    pub settings_path: PathBuf,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            default_targets: mode::default_targets(),
            document_targets: mode::document_targets(),
            ignored_paths: Vec::new(),
            journal_path: PathBuf::from("indexing-journal.sqlite"),
            alias_path: None,
            settings_path: PathBuf::from("settings.json"),
        }
    }
}

impl IndexingConfig {
    /// Reads the config at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(error) => {
                return Err(IndexingError::Config(format!(
                    "failed to read indexing config {}: {error}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&data).map_err(|error| {
            IndexingError::Config(format!(
                "failed to parse indexing config {}: {error}",
                path.display()
            ))
        })
    }

    /// Loads `indexing.json` from `dir`, writing the defaults there first if
    /// it does not exist. Relative paths are resolved against `dir`.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|error| {
            IndexingError::Config(format!(
                "failed to create config directory {}: {error}",
                dir.display()
            ))
        })?;

        let path = dir.join(INDEXING_CONFIG_FILENAME);
        let config = if path.exists() {
            Self::load(&path)?
        } else {
            let config = Self::default();
            config.write(&path)?;
            config
        };
        Ok(config.resolved_against(dir))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self).map_err(|error| {
            IndexingError::Serialization(format!("failed to serialize indexing config: {error}"))
        })?;
        std::fs::write(path, data).map_err(|error| {
            IndexingError::Config(format!(
                "failed to write indexing config {}: {error}",
                path.display()
            ))
        })
    }

    fn resolved_against(mut self, dir: &Path) -> Self {
        let resolve = |path: PathBuf| {
            if path.is_relative() {
                dir.join(path)
            } else {
                path
            }
        };
        self.journal_path = resolve(self.journal_path);
        self.settings_path = resolve(self.settings_path);
        self.alias_path = self.alias_path.map(resolve);
        self.ignored_paths = self
            .ignored_paths
            .into_iter()
            .map(canonicalize_existing_path)
            .collect();
        self
    }
}
