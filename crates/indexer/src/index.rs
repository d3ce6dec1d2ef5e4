//! The document index capability the crawler writes into.
//!
//! The full-text store itself lives outside this crate; hosts hand the
//! crawler one [`Index`] per mode. [`MemoryIndex`] backs tests and the
//! diagnostic binary.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Identifier assigned to an added document.
pub type DocId = u64;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document rejected: {0}")]
    Rejected(String),
}

/// An append-mostly document store.
///
/// Implementations must accept concurrent single-document appends; the
/// crawler adds no locking of its own.
pub trait Index: Send + Sync {
    fn add_document(&self, path: &Path, note: Option<&str>) -> Result<DocId, IndexError>;

    /// Number of documents currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A document recorded by [`MemoryIndex`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub id: DocId,
    pub path: PathBuf,
    pub note: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    documents: Mutex<Vec<IndexedDocument>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> Vec<IndexedDocument> {
        self.documents.lock().clone()
    }

    /// Number of times `path` was added.
    pub fn count_path(&self, path: &Path) -> usize {
        self.documents
            .lock()
            .iter()
            .filter(|document| document.path == path)
            .count()
    }

    pub fn note_for(&self, path: &Path) -> Option<String> {
        self.documents
            .lock()
            .iter()
            .find(|document| document.path == path)
            .and_then(|document| document.note.clone())
    }
}

impl Index for MemoryIndex {
    fn add_document(&self, path: &Path, note: Option<&str>) -> Result<DocId, IndexError> {
        let mut documents = self.documents.lock();
        let id = documents.len() as DocId;
        documents.push(IndexedDocument {
            id,
            path: path.to_path_buf(),
            note: note.filter(|note| !note.is_empty()).map(str::to_string),
        });
        Ok(id)
    }

    fn len(&self) -> usize {
        self.documents.lock().len()
    }
}
