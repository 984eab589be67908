//! Chunk table — retrievable fragments of source text (spec §3, §6).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use cortex_core::{ChunkId, ProjectId};
use rusqlite::{params, OptionalExtension};

use crate::connection::Store;

/// A retrievable fragment of source text: code, docs, or a git diff.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Chunk identifier.
    pub id: ChunkId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Path the chunk was extracted from.
    pub path: String,
    /// Raw chunk content.
    pub content: String,
    /// Kind of chunk (`"code"`, `"doc"`, `"diff"`, ...).
    pub chunk_type: String,
    /// Byte offset range within `path`.
    pub byte_start: i64,
    /// Byte offset range within `path`.
    pub byte_end: i64,
    /// Length-prefixed little-endian float32 embedding bytes.
    pub embedding: Vec<u8>,
    /// Set when `embedding` is a hash-based pseudo-embedding fallback
    /// (spec §4.2) rather than a real model output.
    pub embedding_degraded: bool,
    /// Last time this chunk was surfaced to a prompt.
    pub last_used_at: DateTime<Utc>,
}

impl Store {
    /// Insert or replace a chunk by id.
    pub fn upsert_chunk(&self, chunk: &Chunk) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO chunk
             (id, project_id, path, content, chunk_type, byte_start, byte_end, embedding, embedding_degraded, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                path = excluded.path,
                content = excluded.content,
                chunk_type = excluded.chunk_type,
                byte_start = excluded.byte_start,
                byte_end = excluded.byte_end,
                embedding = excluded.embedding,
                embedding_degraded = excluded.embedding_degraded,
                last_used_at = excluded.last_used_at;",
            params![
                chunk.id.as_str(),
                chunk.project_id.as_str(),
                chunk.path,
                chunk.content,
                chunk.chunk_type,
                chunk.byte_start,
                chunk.byte_end,
                chunk.embedding,
                chunk.embedding_degraded as i64,
                chunk.last_used_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("upsert chunk: {e}")))?;
        Ok(())
    }

    /// All chunks indexed for a project. Retrieval ranking happens above
    /// this layer, in `cortex-memory`, by cosine similarity over the
    /// decoded embeddings.
    pub fn list_chunks(&self, project_id: &ProjectId) -> Result<Vec<Chunk>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, path, content, chunk_type, byte_start, byte_end, embedding, embedding_degraded, last_used_at
                 FROM chunk WHERE project_id = ?1;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], row_to_chunk)
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }

    /// Fetch a single chunk.
    pub fn get_chunk(&self, id: &ChunkId) -> Result<Option<Chunk>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, project_id, path, content, chunk_type, byte_start, byte_end, embedding, embedding_degraded, last_used_at
             FROM chunk WHERE id = ?1;",
            params![id.as_str()],
            row_to_chunk,
        )
        .optional()
        .map_err(|e| StorageError::Other(Box::new(e)))
    }

    /// Touch `last_used_at` for a chunk that was just surfaced to a prompt.
    pub fn touch_chunk(&self, id: &ChunkId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE chunk SET last_used_at = ?2 WHERE id = ?1;",
            params![id.as_str(), at.to_rfc3339()],
        )
        .map_err(|e| StorageError::WriteFailed(format!("touch chunk: {e}")))?;
        Ok(())
    }

    /// Chunks still flagged as degraded, for background recomputation
    /// once the embedding provider recovers (spec §4.2).
    pub fn list_degraded_chunks(&self, project_id: &ProjectId) -> Result<Vec<Chunk>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, project_id, path, content, chunk_type, byte_start, byte_end, embedding, embedding_degraded, last_used_at
                 FROM chunk WHERE project_id = ?1 AND embedding_degraded = 1;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], row_to_chunk)
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let id: String = row.get(0)?;
    let project_id: String = row.get(1)?;
    let degraded: i64 = row.get(8)?;
    let last_used_at: String = row.get(9)?;
    Ok(Chunk {
        id: ChunkId::from(id),
        project_id: ProjectId::from(project_id),
        path: row.get(2)?,
        content: row.get(3)?,
        chunk_type: row.get(4)?,
        byte_start: row.get(5)?,
        byte_end: row.get(6)?,
        embedding: row.get(7)?,
        embedding_degraded: degraded != 0,
        last_used_at: DateTime::parse_from_rfc3339(&last_used_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;

    fn setup() -> (Store, ProjectId) {
        let store = Store::open_in_memory().unwrap();
        let project = Project {
            id: ProjectId::from_root_path("/tmp/chunks"),
            root_path: "/tmp/chunks".into(),
            name: "chunks".into(),
            created_at: Utc::now(),
        };
        store.create_project(&project).unwrap();
        (store, project.id)
    }

    fn sample_chunk(project_id: &ProjectId, id: &str, degraded: bool) -> Chunk {
        Chunk {
            id: ChunkId::new(id),
            project_id: project_id.clone(),
            path: "src/lib.rs".into(),
            content: "fn main() {}".into(),
            chunk_type: "code".into(),
            byte_start: 0,
            byte_end: 12,
            embedding: vec![0, 0, 0, 0],
            embedding_degraded: degraded,
            last_used_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_then_fetch() {
        let (store, project_id) = setup();
        let chunk = sample_chunk(&project_id, "c1", false);
        store.upsert_chunk(&chunk).unwrap();
        let fetched = store.get_chunk(&chunk.id).unwrap().unwrap();
        assert_eq!(fetched.content, chunk.content);
    }

    #[test]
    fn upsert_replaces_existing() {
        let (store, project_id) = setup();
        let mut chunk = sample_chunk(&project_id, "c2", false);
        store.upsert_chunk(&chunk).unwrap();
        chunk.content = "fn main() { println!(\"hi\"); }".into();
        store.upsert_chunk(&chunk).unwrap();
        let fetched = store.get_chunk(&chunk.id).unwrap().unwrap();
        assert_eq!(fetched.content, chunk.content);
    }

    #[test]
    fn list_degraded_only_returns_flagged() {
        let (store, project_id) = setup();
        store.upsert_chunk(&sample_chunk(&project_id, "ok", false)).unwrap();
        store.upsert_chunk(&sample_chunk(&project_id, "bad", true)).unwrap();
        let degraded = store.list_degraded_chunks(&project_id).unwrap();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].id, ChunkId::new("bad"));
    }
}
