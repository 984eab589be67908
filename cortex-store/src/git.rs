//! GitCommit table — cached commit parses for the git context layer
//! (spec §4.4, §3).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use cortex_core::ProjectId;
use rusqlite::params;

use crate::connection::Store;

/// A cached parse of one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct GitCommitRecord {
    /// Owning project.
    pub project_id: ProjectId,
    /// Full 40-character commit hash.
    pub hash: String,
    /// Commit author name/email as reported by git.
    pub author: String,
    /// Commit timestamp.
    pub date: DateTime<Utc>,
    /// Commit message (first line, or full message).
    pub message: String,
    /// Paths changed by this commit.
    pub files_changed: Vec<String>,
    /// Summarized diff fragments, one per changed hunk.
    pub diff_chunks: Vec<String>,
    /// Embedding of `(message + file list)`, length-prefixed LE float32.
    pub embedding: Vec<u8>,
    /// Set when `embedding` is a pseudo-embedding fallback.
    pub embedding_degraded: bool,
}

impl Store {
    /// Insert or replace a commit record, keyed by `(project_id, hash)`.
    pub fn upsert_git_commit(&self, commit: &GitCommitRecord) -> Result<(), StorageError> {
        let files_changed = serde_json::to_string(&commit.files_changed)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let diff_chunks = serde_json::to_string(&commit.diff_chunks)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO git_commit
             (project_id, hash, author, date, message, files_changed, diff_chunks, embedding, embedding_degraded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(project_id, hash) DO UPDATE SET
                author = excluded.author,
                date = excluded.date,
                message = excluded.message,
                files_changed = excluded.files_changed,
                diff_chunks = excluded.diff_chunks,
                embedding = excluded.embedding,
                embedding_degraded = excluded.embedding_degraded;",
            params![
                commit.project_id.as_str(),
                commit.hash,
                commit.author,
                commit.date.to_rfc3339(),
                commit.message,
                files_changed,
                diff_chunks,
                commit.embedding,
                commit.embedding_degraded as i64,
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("upsert git commit: {e}")))?;
        Ok(())
    }

    /// All cached commits for a project, most recent first.
    pub fn list_git_commits(&self, project_id: &ProjectId) -> Result<Vec<GitCommitRecord>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT project_id, hash, author, date, message, files_changed, diff_chunks, embedding, embedding_degraded
                 FROM git_commit WHERE project_id = ?1 ORDER BY date DESC;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], row_to_commit)
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }
}

fn row_to_commit(row: &rusqlite::Row<'_>) -> rusqlite::Result<GitCommitRecord> {
    let project_id: String = row.get(0)?;
    let date: String = row.get(3)?;
    let files_changed: String = row.get(5)?;
    let diff_chunks: String = row.get(6)?;
    let degraded: i64 = row.get(8)?;
    Ok(GitCommitRecord {
        project_id: ProjectId::from(project_id),
        hash: row.get(1)?,
        author: row.get(2)?,
        date: DateTime::parse_from_rfc3339(&date)
            .unwrap_or_default()
            .with_timezone(&Utc),
        message: row.get(4)?,
        files_changed: serde_json::from_str(&files_changed).unwrap_or_default(),
        diff_chunks: serde_json::from_str(&diff_chunks).unwrap_or_default(),
        embedding: row.get(7)?,
        embedding_degraded: degraded != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn setup() -> (Store, ProjectId) {
        let store = Store::open_in_memory().unwrap();
        let project = Project {
            id: ProjectId::from_root_path("/tmp/git"),
            root_path: "/tmp/git".into(),
            name: "git".into(),
            created_at: Utc::now(),
        };
        store.create_project(&project).unwrap();
        (store, project.id)
    }

    #[test]
    fn upsert_then_list() {
        let (store, project_id) = setup();
        let commit = GitCommitRecord {
            project_id: project_id.clone(),
            hash: "a".repeat(40),
            author: "dev".into(),
            date: Utc::now(),
            message: "fix bug".into(),
            files_changed: vec!["src/lib.rs".into()],
            diff_chunks: vec!["-old\n+new".into()],
            embedding: vec![0; 4],
            embedding_degraded: false,
        };
        store.upsert_git_commit(&commit).unwrap();
        let commits = store.list_git_commits(&project_id).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].files_changed, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn upsert_same_hash_replaces() {
        let (store, project_id) = setup();
        let mut commit = GitCommitRecord {
            project_id: project_id.clone(),
            hash: "b".repeat(40),
            author: "dev".into(),
            date: Utc::now(),
            message: "wip".into(),
            files_changed: vec![],
            diff_chunks: vec![],
            embedding: vec![0; 4],
            embedding_degraded: true,
        };
        store.upsert_git_commit(&commit).unwrap();
        commit.message = "final".into();
        commit.embedding_degraded = false;
        store.upsert_git_commit(&commit).unwrap();

        let commits = store.list_git_commits(&project_id).unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].message, "final");
        assert!(!commits[0].embedding_degraded);
    }
}
