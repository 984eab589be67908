//! Connection management and schema bootstrap (spec §6).
//!
//! Grounded on `oldnordic-odincode/databases/src/sqlite.rs`'s
//! `SQLiteManager`: a single `rusqlite::Connection` behind a blocking
//! `Mutex`, `PRAGMA foreign_keys = ON`, and a generous `busy_timeout` so
//! concurrent readers/writers from the same process don't spuriously
//! fail. WAL mode and the `SchemaVersion` row are this crate's addition
//! (SPEC_FULL §B) since the teacher's store never needed either.

use cortex_core::error::StorageError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema version this build expects. Bumped whenever `SCHEMA_SQL` changes.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS project (
    id TEXT PRIMARY KEY,
    root_path TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS session (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES project(id),
    mode TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    turn_count INTEGER NOT NULL DEFAULT 0,
    tokens_used INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_session_project ON session(project_id);

CREATE TABLE IF NOT EXISTS session_snapshot (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES session(id),
    seq INTEGER NOT NULL,
    ephemeral_state BLOB NOT NULL,
    retrieval_ids BLOB NOT NULL,
    mode TEXT NOT NULL,
    token_budget BLOB NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (session_id, seq)
);
CREATE INDEX IF NOT EXISTS idx_snapshot_session ON session_snapshot(session_id);

CREATE TABLE IF NOT EXISTS chunk (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES project(id),
    path TEXT NOT NULL,
    content TEXT NOT NULL,
    chunk_type TEXT NOT NULL,
    byte_start INTEGER NOT NULL,
    byte_end INTEGER NOT NULL,
    embedding BLOB NOT NULL,
    embedding_degraded INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chunk_project ON chunk(project_id);
CREATE INDEX IF NOT EXISTS idx_chunk_path ON chunk(project_id, path);

CREATE TABLE IF NOT EXISTS knowledge (
    project_id TEXT NOT NULL REFERENCES project(id),
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    category TEXT NOT NULL,
    importance INTEGER NOT NULL,
    UNIQUE (project_id, key)
);
CREATE INDEX IF NOT EXISTS idx_knowledge_project ON knowledge(project_id);

CREATE TABLE IF NOT EXISTS git_commit (
    project_id TEXT NOT NULL REFERENCES project(id),
    hash TEXT NOT NULL,
    author TEXT NOT NULL,
    date TEXT NOT NULL,
    message TEXT NOT NULL,
    files_changed TEXT NOT NULL,
    diff_chunks TEXT NOT NULL,
    embedding BLOB NOT NULL,
    embedding_degraded INTEGER NOT NULL DEFAULT 0,
    UNIQUE (project_id, hash)
);
CREATE INDEX IF NOT EXISTS idx_git_commit_project ON git_commit(project_id);

CREATE TABLE IF NOT EXISTS execution_log (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES project(id),
    session_id TEXT NOT NULL REFERENCES session(id),
    tool TEXT NOT NULL,
    input TEXT NOT NULL,
    output TEXT,
    error_message TEXT,
    duration_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_execlog_session ON execution_log(session_id);

CREATE TABLE IF NOT EXISTS cache (
    cache_key TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    value BLOB NOT NULL,
    expires_at TEXT
);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);
"#;

/// A handle to the project's embedded relational store
/// (`<project-root>/.cortex/store.db`, spec §6).
///
/// Cheap to clone: internally an `Arc<Mutex<Connection>>`, matching the
/// teacher's `SQLiteManager` connection-sharing pattern.
#[derive(Clone)]
pub struct Store {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (creating if absent) the store at `path`, run schema
    /// bootstrap, and return a ready handle.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| StorageError::Unavailable(format!("failed to open store.db: {e}")))?;

        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(|e| StorageError::Unavailable(format!("failed to enable foreign keys: {e}")))?;
        conn.busy_timeout(std::time::Duration::from_secs(10))
            .map_err(|e| StorageError::Unavailable(format!("failed to set busy_timeout: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| StorageError::Unavailable(format!("failed to enable WAL mode: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (tests only).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Unavailable(format!("failed to open in-memory db: {e}")))?;
        conn.execute("PRAGMA foreign_keys = ON;", [])
            .map_err(|e| StorageError::Unavailable(format!("failed to enable foreign keys: {e}")))?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| StorageError::Unavailable(format!("failed to apply schema: {e}")))?;

        let current: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM schema_version;", [], |row| row.get(0))
            .map_err(|e| StorageError::Unavailable(format!("failed to read schema_version: {e}")))?;

        if current.unwrap_or(0) < SCHEMA_VERSION {
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2);",
                rusqlite::params![SCHEMA_VERSION, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| StorageError::Unavailable(format!("failed to record schema_version: {e}")))?;
        }

        Ok(())
    }

    pub(crate) fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StorageError> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("store connection lock poisoned".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_and_bootstraps_schema() {
        let store = Store::open_in_memory().unwrap();
        let conn = store.lock().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn reopening_schema_is_idempotent() {
        let store = Store::open_in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();
    }
}
