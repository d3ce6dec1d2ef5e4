//! Journal rows and the persistence seam behind the journal writer.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::mode::ModeKind;

/// A subtree not yet fully enumerated for one mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingPath {
    pub path: PathBuf,
    pub mode: ModeKind,
}

impl PendingPath {
    pub fn new(path: impl Into<PathBuf>, mode: ModeKind) -> Self {
        Self {
            path: path.into(),
            mode,
        }
    }
}

/// A directory whose enumeration failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPath {
    pub path: PathBuf,
    pub reason: String,
    /// Unix seconds.
    pub recorded_at: u64,
}

/// Relational persistence for journal rows.
///
/// Predicates are exact field equality. Stores do not deduplicate; the
/// journal checks existence before every pending insert.
pub trait JournalStore: Send {
    fn count_pending(&self, entry: &PendingPath) -> Result<usize>;
    fn insert_pending(&mut self, entry: &PendingPath) -> Result<()>;
    /// Deletes every row equal to `entry`, returning how many were removed.
    fn delete_pending(&mut self, entry: &PendingPath) -> Result<usize>;
    fn list_pending(&self, mode: Option<ModeKind>) -> Result<Vec<PendingPath>>;

    fn insert_failure(&mut self, failure: &FailedPath) -> Result<()>;
    fn list_failures(&self) -> Result<Vec<FailedPath>>;
    fn count_failures(&self, path: &Path) -> Result<usize>;

    /// Opens a transaction spanning the next batch of commands.
    fn begin_batch(&mut self) -> Result<()> {
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Row vectors in memory. Matches the relational store's semantics exactly,
/// including the absence of uniqueness constraints.
#[derive(Debug, Default)]
pub struct MemoryJournalStore {
    pending: Vec<PendingPath>,
    failures: Vec<FailedPath>,
}

impl MemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JournalStore for MemoryJournalStore {
    fn count_pending(&self, entry: &PendingPath) -> Result<usize> {
        Ok(self.pending.iter().filter(|row| *row == entry).count())
    }

    fn insert_pending(&mut self, entry: &PendingPath) -> Result<()> {
        self.pending.push(entry.clone());
        Ok(())
    }

    fn delete_pending(&mut self, entry: &PendingPath) -> Result<usize> {
        let before = self.pending.len();
        self.pending.retain(|row| row != entry);
        Ok(before - self.pending.len())
    }

    fn list_pending(&self, mode: Option<ModeKind>) -> Result<Vec<PendingPath>> {
        Ok(self
            .pending
            .iter()
            .filter(|row| mode.map_or(true, |mode| row.mode == mode))
            .cloned()
            .collect())
    }

    fn insert_failure(&mut self, failure: &FailedPath) -> Result<()> {
        self.failures.push(failure.clone());
        Ok(())
    }

    fn list_failures(&self) -> Result<Vec<FailedPath>> {
        Ok(self.failures.clone())
    }

    fn count_failures(&self, path: &Path) -> Result<usize> {
        Ok(self.failures.iter().filter(|row| row.path == path).count())
    }
}
