//! SQLite-backed journal store.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use super::store::{FailedPath, JournalStore, PendingPath};
use crate::error::{IndexingError, Result};
use crate::mode::ModeKind;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS indexing_dir (
    path     BLOB    NOT NULL,
    category INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS indexing_dir_key ON indexing_dir (path, category);
CREATE TABLE IF NOT EXISTS failed_path (
    path        BLOB    NOT NULL,
    reason      TEXT    NOT NULL,
    recorded_at INTEGER NOT NULL
);
";

pub struct SqliteJournalStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteJournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteJournalStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteJournalStore {
    /// Opens (or creates) the journal database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                IndexingError::Journal(format!(
                    "failed to create journal directory {}: {error}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        log::debug!("journal {} opened in {mode} mode", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

/// Paths are stored as their raw bytes so distinct non-UTF-8 names stay
/// distinct keys.
#[cfg(unix)]
fn path_key(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_key(bytes: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(bytes))
}

#[cfg(not(unix))]
fn path_from_key(bytes: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&bytes).into_owned())
}

impl JournalStore for SqliteJournalStore {
    fn count_pending(&self, entry: &PendingPath) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM indexing_dir WHERE path = ?1 AND category = ?2",
            params![path_key(&entry.path), entry.mode.category()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn insert_pending(&mut self, entry: &PendingPath) -> Result<()> {
        self.conn.execute(
            "INSERT INTO indexing_dir (path, category) VALUES (?1, ?2)",
            params![path_key(&entry.path), entry.mode.category()],
        )?;
        Ok(())
    }

    fn delete_pending(&mut self, entry: &PendingPath) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM indexing_dir WHERE path = ?1 AND category = ?2",
            params![path_key(&entry.path), entry.mode.category()],
        )?;
        Ok(removed)
    }

    fn list_pending(&self, mode: Option<ModeKind>) -> Result<Vec<PendingPath>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, category FROM indexing_dir
             WHERE ?1 IS NULL OR category = ?1
             ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![mode.map(ModeKind::category)], |row| {
            Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (key, category) = row?;
            let path = path_from_key(key);
            match ModeKind::from_category(category) {
                Some(mode) => pending.push(PendingPath::new(path, mode)),
                None => log::warn!(
                    "skipping journal row {} with unknown category {category}",
                    path.display()
                ),
            }
        }
        Ok(pending)
    }

    fn insert_failure(&mut self, failure: &FailedPath) -> Result<()> {
        self.conn.execute(
            "INSERT INTO failed_path (path, reason, recorded_at) VALUES (?1, ?2, ?3)",
            params![
                path_key(&failure.path),
                failure.reason,
                failure.recorded_at as i64
            ],
        )?;
        Ok(())
    }

    fn list_failures(&self) -> Result<Vec<FailedPath>> {
        let mut stmt = self
            .conn
            .prepare("SELECT path, reason, recorded_at FROM failed_path ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok(FailedPath {
                path: path_from_key(row.get(0)?),
                reason: row.get(1)?,
                recorded_at: row.get::<_, i64>(2)? as u64,
            })
        })?;
        let failures = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(failures)
    }

    fn count_failures(&self, path: &Path) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM failed_path WHERE path = ?1",
            params![path_key(path)],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn begin_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }
}
