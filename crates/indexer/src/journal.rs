//! Durable record of unfinished indexing work.
//!
//! The journal keeps two tables: pending paths (subtrees whose children have
//! not all been dispatched yet, per mode) and failed paths (directories that
//! could not be enumerated). A single writer thread owns the store and applies
//! commands one at a time in arrival order, so an existence check and the
//! insert that follows it can never interleave with another mutation.
//! Whatever is queued when the writer wakes up is applied in one store
//! transaction, and replies go out only after that transaction commits.
//!
//! Persistence errors never reach callers. They are logged and the crawl
//! carries on, which means a degraded store can under-report pending work.

mod sqlite;
mod store;

use std::path::{Path, PathBuf};
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};

use crate::error::{IndexingError, Result};
use crate::mode::ModeKind;

pub use sqlite::SqliteJournalStore;
pub use store::{FailedPath, JournalStore, MemoryJournalStore, PendingPath};

enum JournalCommand {
    MarkPending {
        entry: PendingPath,
        reply: Option<oneshot::Sender<bool>>,
    },
    ClearPending {
        entry: PendingPath,
        reply: Option<oneshot::Sender<()>>,
    },
    RecordFailure {
        failure: FailedPath,
        reply: Option<oneshot::Sender<()>>,
    },
    ListPending {
        mode: Option<ModeKind>,
        reply: oneshot::Sender<Vec<PendingPath>>,
    },
    CountPending {
        entry: PendingPath,
        reply: oneshot::Sender<usize>,
    },
    ListFailures {
        reply: oneshot::Sender<Vec<FailedPath>>,
    },
    CountFailures {
        path: PathBuf,
        reply: oneshot::Sender<usize>,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the journal writer. Cloning is cheap; the writer stops once
/// every handle is dropped.
#[derive(Debug, Clone)]
pub struct Journal {
    tx: mpsc::UnboundedSender<JournalCommand>,
}

impl Journal {
    /// Starts the writer thread over `store`.
    pub fn spawn<S>(store: S) -> Result<Self>
    where
        S: JournalStore + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = JournalWriter { store };
        thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || writer.run(rx))
            .map_err(|error| {
                IndexingError::Journal(format!("failed to start journal writer: {error}"))
            })?;
        Ok(Self { tx })
    }

    /// A journal over an in-memory store.
    pub fn in_memory() -> Result<Self> {
        Self::spawn(MemoryJournalStore::new())
    }

    /// Opens the SQLite journal at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        Self::spawn(SqliteJournalStore::open(path)?)
    }

    /// Inserts a pending row unless an identical one exists.
    ///
    /// Returns true if a row was inserted.
    pub async fn mark_pending(&self, path: impl Into<PathBuf>, mode: ModeKind) -> bool {
        let (reply, rx) = oneshot::channel();
        let entry = PendingPath::new(path, mode);
        if !self.send(JournalCommand::MarkPending {
            entry,
            reply: Some(reply),
        }) {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Deletes every pending row for `(path, mode)`.
    pub async fn clear_pending(&self, path: impl Into<PathBuf>, mode: ModeKind) {
        let (reply, rx) = oneshot::channel();
        let entry = PendingPath::new(path, mode);
        if self.send(JournalCommand::ClearPending {
            entry,
            reply: Some(reply),
        }) {
            let _ = rx.await;
        }
    }

    /// Appends a failure row. Best effort.
    pub async fn record_failure(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        let (reply, rx) = oneshot::channel();
        let failure = failed_path(path.into(), reason.into());
        if self.send(JournalCommand::RecordFailure {
            failure,
            reply: Some(reply),
        }) {
            let _ = rx.await;
        }
    }

    pub fn submit_mark_pending(&self, path: impl Into<PathBuf>, mode: ModeKind) {
        self.send(JournalCommand::MarkPending {
            entry: PendingPath::new(path, mode),
            reply: None,
        });
    }

    pub fn submit_clear_pending(&self, path: impl Into<PathBuf>, mode: ModeKind) {
        self.send(JournalCommand::ClearPending {
            entry: PendingPath::new(path, mode),
            reply: None,
        });
    }

    pub fn submit_failure(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.send(JournalCommand::RecordFailure {
            failure: failed_path(path.into(), reason.into()),
            reply: None,
        });
    }

    /// Pending rows, optionally restricted to one mode, in insertion order.
    pub async fn pending(&self, mode: Option<ModeKind>) -> Vec<PendingPath> {
        let (reply, rx) = oneshot::channel();
        if !self.send(JournalCommand::ListPending { mode, reply }) {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn pending_count(&self, path: impl Into<PathBuf>, mode: ModeKind) -> usize {
        let (reply, rx) = oneshot::channel();
        let entry = PendingPath::new(path, mode);
        if !self.send(JournalCommand::CountPending { entry, reply }) {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub async fn failures(&self) -> Vec<FailedPath> {
        let (reply, rx) = oneshot::channel();
        if !self.send(JournalCommand::ListFailures { reply }) {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn failure_count(&self, path: impl Into<PathBuf>) -> usize {
        let (reply, rx) = oneshot::channel();
        if !self.send(JournalCommand::CountFailures {
            path: path.into(),
            reply,
        }) {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Resolves once every command submitted before it has been applied.
    pub async fn flush(&self) {
        let (reply, rx) = oneshot::channel();
        if self.send(JournalCommand::Flush { reply }) {
            let _ = rx.await;
        }
    }

    fn send(&self, command: JournalCommand) -> bool {
        if self.tx.send(command).is_err() {
            log::warn!("journal writer is gone, dropping journal command");
            return false;
        }
        true
    }
}

fn failed_path(path: PathBuf, reason: String) -> FailedPath {
    FailedPath {
        path,
        reason,
        recorded_at: unix_now_secs(),
    }
}

/// Returns the current Unix timestamp in seconds.
pub fn unix_now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_secs())
        .unwrap_or(0)
}

struct JournalWriter<S> {
    store: S,
}

/// Upper bound on commands applied in one store transaction.
const MAX_BATCH: usize = 1024;

/// A reply held back until the batch that produced it is committed.
enum Reply {
    Inserted(oneshot::Sender<bool>, bool),
    Done(oneshot::Sender<()>),
    Pending(oneshot::Sender<Vec<PendingPath>>, Vec<PendingPath>),
    Failures(oneshot::Sender<Vec<FailedPath>>, Vec<FailedPath>),
    Count(oneshot::Sender<usize>, usize),
}

impl Reply {
    fn send(self) {
        // A caller that stopped waiting is not an error.
        match self {
            Self::Inserted(tx, value) => {
                let _ = tx.send(value);
            }
            Self::Done(tx) => {
                let _ = tx.send(());
            }
            Self::Pending(tx, rows) => {
                let _ = tx.send(rows);
            }
            Self::Failures(tx, rows) => {
                let _ = tx.send(rows);
            }
            Self::Count(tx, count) => {
                let _ = tx.send(count);
            }
        }
    }
}

impl<S: JournalStore> JournalWriter<S> {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<JournalCommand>) {
        while let Some(first) = rx.blocking_recv() {
            let mut batch = vec![first];
            while batch.len() < MAX_BATCH {
                match rx.try_recv() {
                    Ok(command) => batch.push(command),
                    Err(_) => break,
                }
            }
            self.apply_batch(batch);
        }
        log::debug!("journal writer stopped");
    }

    /// Applies every queued command in one transaction, then replies.
    fn apply_batch(&mut self, batch: Vec<JournalCommand>) {
        let in_transaction = match self.store.begin_batch() {
            Ok(()) => true,
            Err(error) => {
                log::warn!("journal batch not started, writing unbatched: {error}");
                false
            }
        };

        let replies: Vec<Reply> = batch
            .into_iter()
            .filter_map(|command| self.handle(command))
            .collect();

        if in_transaction {
            if let Err(error) = self.store.commit_batch() {
                log::warn!("journal batch commit failed: {error}");
            }
        }
        for reply in replies {
            reply.send();
        }
    }

    fn handle(&mut self, command: JournalCommand) -> Option<Reply> {
        match command {
            JournalCommand::MarkPending { entry, reply } => {
                let inserted = self.mark_pending(&entry);
                reply.map(|reply| Reply::Inserted(reply, inserted))
            }
            JournalCommand::ClearPending { entry, reply } => {
                if let Err(error) = self.store.delete_pending(&entry) {
                    log::warn!(
                        "journal clear failed for {} ({}): {error}",
                        entry.path.display(),
                        entry.mode
                    );
                }
                reply.map(Reply::Done)
            }
            JournalCommand::RecordFailure { failure, reply } => {
                if let Err(error) = self.store.insert_failure(&failure) {
                    log::warn!(
                        "journal failure record dropped for {}: {error}",
                        failure.path.display()
                    );
                }
                reply.map(Reply::Done)
            }
            JournalCommand::ListPending { mode, reply } => {
                let rows = self.store.list_pending(mode).unwrap_or_else(|error| {
                    log::warn!("journal pending query failed: {error}");
                    Vec::new()
                });
                Some(Reply::Pending(reply, rows))
            }
            JournalCommand::CountPending { entry, reply } => {
                let count = self.store.count_pending(&entry).unwrap_or_else(|error| {
                    log::warn!("journal pending count failed: {error}");
                    0
                });
                Some(Reply::Count(reply, count))
            }
            JournalCommand::ListFailures { reply } => {
                let rows = self.store.list_failures().unwrap_or_else(|error| {
                    log::warn!("journal failure query failed: {error}");
                    Vec::new()
                });
                Some(Reply::Failures(reply, rows))
            }
            JournalCommand::CountFailures { path, reply } => {
                let count = self.store.count_failures(&path).unwrap_or_else(|error| {
                    log::warn!("journal failure count failed: {error}");
                    0
                });
                Some(Reply::Count(reply, count))
            }
            JournalCommand::Flush { reply } => Some(Reply::Done(reply)),
        }
    }

    /// Count-then-insert. Only runs on the writer thread, so no other
    /// mutation can land between the check and the insert.
    fn mark_pending(&mut self, entry: &PendingPath) -> bool {
        match self.store.count_pending(entry) {
            Ok(0) => {}
            Ok(_) => return false,
            // Unknown count: insert anyway.
            Err(error) => log::warn!(
                "journal existence check failed for {}: {error}",
                entry.path.display()
            ),
        }
        match self.store.insert_pending(entry) {
            Ok(()) => true,
            Err(error) => {
                log::warn!(
                    "journal insert failed for {} ({}): {error}",
                    entry.path.display(),
                    entry.mode
                );
                false
            }
        }
    }
}
