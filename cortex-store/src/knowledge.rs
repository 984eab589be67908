//! Knowledge table — durable project facts (spec §4.4 knowledge layer).

use cortex_core::error::StorageError;
use cortex_core::ProjectId;
use rusqlite::params;

use crate::connection::Store;

/// A single durable fact about a project: a naming convention, a
/// decision, a constraint the assistant should remember across sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    /// Owning project.
    pub project_id: ProjectId,
    /// Unique (per project) key.
    pub key: String,
    /// Free-text value.
    pub value: String,
    /// Grouping label (e.g. `"convention"`, `"architecture"`, `"constraint"`).
    pub category: String,
    /// Higher values are preferred when the knowledge section is trimmed
    /// to fit its token budget.
    pub importance: i64,
}

impl Store {
    /// Insert or replace a knowledge entry, keyed by `(project_id, key)`.
    pub fn upsert_knowledge(&self, entry: &KnowledgeEntry) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO knowledge (project_id, key, value, category, importance)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(project_id, key) DO UPDATE SET
                value = excluded.value,
                category = excluded.category,
                importance = excluded.importance;",
            params![
                entry.project_id.as_str(),
                entry.key,
                entry.value,
                entry.category,
                entry.importance,
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("upsert knowledge: {e}")))?;
        Ok(())
    }

    /// All knowledge for a project, most important first.
    pub fn list_knowledge(&self, project_id: &ProjectId) -> Result<Vec<KnowledgeEntry>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT project_id, key, value, category, importance
                 FROM knowledge WHERE project_id = ?1 ORDER BY importance DESC;",
            )
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        let rows = stmt
            .query_map(params![project_id.as_str()], |row| {
                let project_id: String = row.get(0)?;
                Ok(KnowledgeEntry {
                    project_id: ProjectId::from(project_id),
                    key: row.get(1)?,
                    value: row.get(2)?,
                    category: row.get(3)?,
                    importance: row.get(4)?,
                })
            })
            .map_err(|e| StorageError::Other(Box::new(e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Other(Box::new(e)))?;
        Ok(rows)
    }

    /// Remove a single knowledge entry.
    pub fn delete_knowledge(&self, project_id: &ProjectId, key: &str) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM knowledge WHERE project_id = ?1 AND key = ?2;",
            params![project_id.as_str(), key],
        )
        .map_err(|e| StorageError::WriteFailed(format!("delete knowledge: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use chrono::Utc;

    fn setup() -> (Store, ProjectId) {
        let store = Store::open_in_memory().unwrap();
        let project = Project {
            id: ProjectId::from_root_path("/tmp/knowledge"),
            root_path: "/tmp/knowledge".into(),
            name: "knowledge".into(),
            created_at: Utc::now(),
        };
        store.create_project(&project).unwrap();
        (store, project.id)
    }

    #[test]
    fn upsert_is_idempotent_on_key() {
        let (store, project_id) = setup();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: project_id.clone(),
                key: "lang".into(),
                value: "rust".into(),
                category: "convention".into(),
                importance: 5,
            })
            .unwrap();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: project_id.clone(),
                key: "lang".into(),
                value: "rust 2021".into(),
                category: "convention".into(),
                importance: 9,
            })
            .unwrap();

        let entries = store.list_knowledge(&project_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].value, "rust 2021");
        assert_eq!(entries[0].importance, 9);
    }

    #[test]
    fn list_orders_by_importance_desc() {
        let (store, project_id) = setup();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: project_id.clone(),
                key: "a".into(),
                value: "low".into(),
                category: "misc".into(),
                importance: 1,
            })
            .unwrap();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: project_id.clone(),
                key: "b".into(),
                value: "high".into(),
                category: "misc".into(),
                importance: 10,
            })
            .unwrap();

        let entries = store.list_knowledge(&project_id).unwrap();
        assert_eq!(entries[0].key, "b");
        assert_eq!(entries[1].key, "a");
    }

    #[test]
    fn delete_removes_entry() {
        let (store, project_id) = setup();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: project_id.clone(),
                key: "temp".into(),
                value: "x".into(),
                category: "misc".into(),
                importance: 1,
            })
            .unwrap();
        store.delete_knowledge(&project_id, "temp").unwrap();
        assert!(store.list_knowledge(&project_id).unwrap().is_empty());
    }
}
