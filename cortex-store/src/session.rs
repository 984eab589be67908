//! Session and SessionSnapshot tables (spec §6, §4.9).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use cortex_core::{ProjectId, SessionId};
use rusqlite::{params, OptionalExtension};

use crate::connection::Store;

/// One orchestrator session against a project.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Operating mode name (`direct`/`concise`/`deep`).
    pub mode: String,
    /// When the session began.
    pub started_at: DateTime<Utc>,
    /// When the session ended, if it has.
    pub ended_at: Option<DateTime<Utc>>,
    /// Number of completed turns.
    pub turn_count: i64,
    /// Cumulative tokens consumed across the session.
    pub tokens_used: i64,
}

/// A periodic checkpoint of in-memory session state, used to resume
/// after a crash (spec §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Snapshot row id.
    pub id: String,
    /// Owning session.
    pub session_id: SessionId,
    /// Monotonically increasing sequence number within the session.
    pub seq: i64,
    /// Serialized ephemeral (recent-turn) state.
    pub ephemeral_state: Vec<u8>,
    /// Serialized set of retrieval chunk ids considered "in context".
    pub retrieval_ids: Vec<u8>,
    /// Operating mode at the time of the snapshot.
    pub mode: String,
    /// Serialized token budget state.
    pub token_budget: Vec<u8>,
    /// Wall-clock time the snapshot was taken.
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Start a new session row.
    pub fn create_session(&self, session: &Session) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session (id, project_id, mode, started_at, ended_at, turn_count, tokens_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                session.id.as_str(),
                session.project_id.as_str(),
                session.mode,
                session.started_at.to_rfc3339(),
                session.ended_at.map(|t| t.to_rfc3339()),
                session.turn_count,
                session.tokens_used,
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("insert session: {e}")))?;
        Ok(())
    }

    /// Fetch a session by id.
    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, project_id, mode, started_at, ended_at, turn_count, tokens_used
             FROM session WHERE id = ?1;",
            params![id.as_str()],
            row_to_session,
        )
        .optional()
        .map_err(|e| StorageError::Other(Box::new(e)))
    }

    /// List sessions for a project, most recently started first —
    /// backs the `cortex sessions list` subcommand (SPEC_FULL §B).
    pub fn list_sessions(&self, project_id: &ProjectId) -> Result<Vec<Session>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, mode, started_at, ended_at, turn_count, tokens_used
                 FROM session WHERE project_id = ?1 ORDER BY started_at DESC;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], row_to_session)
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }

    /// Mark a session ended and record its final turn/token counters.
    pub fn end_session(
        &self,
        id: &SessionId,
        ended_at: DateTime<Utc>,
        turn_count: i64,
        tokens_used: i64,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE session SET ended_at = ?2, turn_count = ?3, tokens_used = ?4 WHERE id = ?1;",
                params![id.as_str(), ended_at.to_rfc3339(), turn_count, tokens_used],
            )
            .map_err(|e| StorageError::WriteFailed(format!("end session: {e}")))?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    /// Persist the running turn/token counters without ending the
    /// session (called alongside every snapshot so a crash leaves the
    /// store's row, not just the in-memory one, up to date).
    pub fn update_session_counters(
        &self,
        id: &SessionId,
        turn_count: i64,
        tokens_used: i64,
    ) -> Result<(), StorageError> {
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE session SET turn_count = ?2, tokens_used = ?3 WHERE id = ?1;",
                params![id.as_str(), turn_count, tokens_used],
            )
            .map_err(|e| StorageError::WriteFailed(format!("update session counters: {e}")))?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("session {id}")));
        }
        Ok(())
    }

    /// Record a new snapshot. `(session_id, seq)` is unique.
    pub fn create_snapshot(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO session_snapshot
             (id, session_id, seq, ephemeral_state, retrieval_ids, mode, token_budget, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                snapshot.id,
                snapshot.session_id.as_str(),
                snapshot.seq,
                snapshot.ephemeral_state,
                snapshot.retrieval_ids,
                snapshot.mode,
                snapshot.token_budget,
                snapshot.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("insert snapshot: {e}")))?;
        Ok(())
    }

    /// The most recent snapshot for a session, if any (used to resume).
    pub fn latest_snapshot(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionSnapshot>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, session_id, seq, ephemeral_state, retrieval_ids, mode, token_budget, created_at
             FROM session_snapshot WHERE session_id = ?1 ORDER BY seq DESC LIMIT 1;",
            params![session_id.as_str()],
            row_to_snapshot,
        )
        .optional()
        .map_err(|e| StorageError::Other(Box::new(e)))
    }

    /// Delete all but the most recent `keep` snapshots for a session
    /// (spec §9 decision: retain the last M=20 snapshots).
    pub fn prune_snapshots(&self, session_id: &SessionId, keep: i64) -> Result<usize, StorageError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute(
                "DELETE FROM session_snapshot
                 WHERE session_id = ?1
                 AND seq NOT IN (
                     SELECT seq FROM session_snapshot
                     WHERE session_id = ?1
                     ORDER BY seq DESC LIMIT ?2
                 );",
                params![session_id.as_str(), keep],
            )
            .map_err(|e| StorageError::WriteFailed(format!("prune snapshots: {e}")))?;
        Ok(deleted)
    }
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    let project_id: String = row.get(1)?;
    let started_at: String = row.get(3)?;
    let ended_at: Option<String> = row.get(4)?;
    Ok(Session {
        id: SessionId::from(id),
        project_id: ProjectId::from(project_id),
        mode: row.get(2)?,
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
        ended_at: ended_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
        turn_count: row.get(5)?,
        tokens_used: row.get(6)?,
    })
}

fn row_to_snapshot(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionSnapshot> {
    let session_id: String = row.get(1)?;
    let created_at: String = row.get(7)?;
    Ok(SessionSnapshot {
        id: row.get(0)?,
        session_id: SessionId::from(session_id),
        seq: row.get(2)?,
        ephemeral_state: row.get(3)?,
        retrieval_ids: row.get(4)?,
        mode: row.get(5)?,
        token_budget: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}
