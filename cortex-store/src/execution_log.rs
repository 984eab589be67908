//! ExecutionLog table — the append-only audit trail of tool calls
//! (spec §6). Retained indefinitely in `store.db` (SPEC_FULL §B: no
//! auto-pruning — the daily JSON-lines log under `logs/` is what
//! rotates and expires, this table is the queryable record).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use cortex_core::{ProjectId, SessionId};
use rusqlite::params;
use uuid::Uuid;

use crate::connection::Store;

/// One recorded tool execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionLogEntry {
    /// Log row id.
    pub id: String,
    /// Owning project.
    pub project_id: ProjectId,
    /// Owning session.
    pub session_id: SessionId,
    /// Tool name.
    pub tool: String,
    /// Arguments passed to the tool.
    pub input: serde_json::Value,
    /// Tool output, if it succeeded.
    pub output: Option<serde_json::Value>,
    /// Error message, if it failed.
    pub error_message: Option<String>,
    /// Wall-clock execution time.
    pub duration_ms: i64,
    /// Whether the tool reported success.
    pub success: bool,
    /// When the execution was recorded.
    pub created_at: DateTime<Utc>,
}

impl ExecutionLogEntry {
    /// Build a new entry with a fresh id and the current timestamp.
    pub fn new(
        project_id: ProjectId,
        session_id: SessionId,
        tool: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id,
            session_id,
            tool: tool.into(),
            input,
            output: None,
            error_message: None,
            duration_ms: 0,
            success: false,
            created_at: Utc::now(),
        }
    }
}

impl Store {
    /// Append a log entry. Never updated afterward — this table is
    /// write-once, append-only.
    pub fn append_execution_log(&self, entry: &ExecutionLogEntry) -> Result<(), StorageError> {
        let output = entry
            .output
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let input = serde_json::to_string(&entry.input)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO execution_log
             (id, project_id, session_id, tool, input, output, error_message, duration_ms, success, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                entry.id,
                entry.project_id.as_str(),
                entry.session_id.as_str(),
                entry.tool,
                input,
                output,
                entry.error_message,
                entry.duration_ms,
                entry.success as i64,
                entry.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("append execution log: {e}")))?;
        Ok(())
    }

    /// All log entries for a session, in insertion order.
    pub fn list_execution_log(&self, session_id: &SessionId) -> Result<Vec<ExecutionLogEntry>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, session_id, tool, input, output, error_message, duration_ms, success, created_at
                 FROM execution_log WHERE session_id = ?1 ORDER BY created_at ASC;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![session_id.as_str()], row_to_entry)
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionLogEntry> {
    let project_id: String = row.get(1)?;
    let session_id: String = row.get(2)?;
    let input: String = row.get(4)?;
    let output: Option<String> = row.get(5)?;
    let success: i64 = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(ExecutionLogEntry {
        id: row.get(0)?,
        project_id: ProjectId::from(project_id),
        session_id: SessionId::from(session_id),
        tool: row.get(3)?,
        input: serde_json::from_str(&input).unwrap_or(serde_json::Value::Null),
        output: output.and_then(|s| serde_json::from_str(&s).ok()),
        error_message: row.get(6)?,
        duration_ms: row.get(7)?,
        success: success != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use crate::session::Session;

    fn setup() -> (Store, ProjectId, SessionId) {
        let store = Store::open_in_memory().unwrap();
        let project = Project {
            id: ProjectId::from_root_path("/tmp/execlog"),
            root_path: "/tmp/execlog".into(),
            name: "execlog".into(),
            created_at: Utc::now(),
        };
        store.create_project(&project).unwrap();
        let session = Session {
            id: SessionId::new("sess-log"),
            project_id: project.id.clone(),
            mode: "concise".into(),
            started_at: Utc::now(),
            ended_at: None,
            turn_count: 0,
            tokens_used: 0,
        };
        store.create_session(&session).unwrap();
        (store, project.id, session.id)
    }

    #[test]
    fn append_and_list_in_order() {
        let (store, project_id, session_id) = setup();
        let mut first = ExecutionLogEntry::new(
            project_id.clone(),
            session_id.clone(),
            "bash",
            serde_json::json!({"command": "ls"}),
        );
        first.success = true;
        first.output = Some(serde_json::json!({"stdout": "a.txt"}));
        store.append_execution_log(&first).unwrap();

        let mut second = ExecutionLogEntry::new(project_id, session_id.clone(), "grep", serde_json::json!({}));
        second.success = false;
        second.error_message = Some("no match".into());
        store.append_execution_log(&second).unwrap();

        let logs = store.list_execution_log(&session_id).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].tool, "bash");
        assert!(logs[0].success);
        assert_eq!(logs[1].tool, "grep");
        assert!(!logs[1].success);
    }
}
