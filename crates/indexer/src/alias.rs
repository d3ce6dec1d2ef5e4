//! Alias lookup for indexed file names.
//!
//! The alias table ships with the launcher as a plist dictionary mapping a
//! file or application name to an alternate search term. Multi-word aliases
//! additionally get their initials appended ("Activity Monitor" becomes
//! "Activity Monitor AM") so abbreviations match too.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::error::{IndexingError, Result};

/// Read-only name to alias table with a memo of derived aliases.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
    derived: RwLock<HashMap<String, String>>,
}

impl AliasTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            derived: RwLock::new(HashMap::new()),
        }
    }

    /// Loads a plist dictionary of string values. Non-string values are skipped.
    pub fn from_plist_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IndexingError::PathNotFound(path.to_path_buf()));
        }
        let value = plist::Value::from_file(path).map_err(|error| {
            IndexingError::AliasTable(format!(
                "failed to read alias table {}: {error}",
                path.display()
            ))
        })?;
        let Some(dict) = value.into_dictionary() else {
            return Err(IndexingError::AliasTable(format!(
                "alias table {} is not a dictionary",
                path.display()
            )));
        };

        let entries = dict
            .into_iter()
            .filter_map(|(name, value)| value.into_string().map(|alias| (name, alias)))
            .collect();
        Ok(Self::from_map(entries))
    }

    /// Loads the table at `path`, falling back to an empty table.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::empty();
        };
        match Self::from_plist_file(path) {
            Ok(table) => {
                log::debug!("loaded {} aliases from {}", table.len(), path.display());
                table
            }
            Err(error) => {
                log::warn!("alias table unavailable, continuing without aliases: {error}");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the alias for `name`, or an empty string if there is none.
    pub fn alias(&self, name: &str) -> String {
        let Some(stored) = self.entries.get(name) else {
            return String::new();
        };
        if !stored.contains(' ') {
            return stored.clone();
        }

        if let Some(derived) = self.derived.read().get(name) {
            return derived.clone();
        }
        let derived = with_initials(stored);
        self.derived
            .write()
            .entry(name.to_string())
            .or_insert(derived)
            .clone()
    }
}

/// Appends the first character of every word: "Activity Monitor" -> "Activity Monitor AM".
fn with_initials(phrase: &str) -> String {
    let initials: String = phrase
        .split(' ')
        .filter_map(|word| word.chars().next())
        .collect();
    format!("{phrase} {initials}")
}
