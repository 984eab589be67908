//! Project table — one row per indexed project root (spec §6).

use chrono::{DateTime, Utc};
use cortex_core::error::StorageError;
use cortex_core::ProjectId;
use rusqlite::{params, OptionalExtension};

use crate::connection::Store;

/// One project root this tool has indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Deterministic id derived from the root path (see [`ProjectId::from_root_path`]).
    pub id: ProjectId,
    /// Absolute filesystem root. Unique.
    pub root_path: String,
    /// Human-readable name (directory basename by default).
    pub name: String,
    /// When this project was first indexed.
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// Insert a new project row. Fails if `root_path` is already present.
    pub fn create_project(&self, project: &Project) -> Result<(), StorageError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO project (id, root_path, name, created_at) VALUES (?1, ?2, ?3, ?4);",
            params![
                project.id.as_str(),
                project.root_path,
                project.name,
                project.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| StorageError::WriteFailed(format!("insert project: {e}")))?;
        tracing::debug!(project_id = %project.id, "project created");
        Ok(())
    }

    /// Look up a project by its deterministic id.
    pub fn get_project(&self, id: &ProjectId) -> Result<Option<Project>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, root_path, name, created_at FROM project WHERE id = ?1;",
            params![id.as_str()],
            row_to_project,
        )
        .optional()
        .map_err(|e| StorageError::Other(Box::new(e)))
    }

    /// Look up a project by its root path.
    pub fn get_project_by_root(&self, root_path: &str) -> Result<Option<Project>, StorageError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, root_path, name, created_at FROM project WHERE root_path = ?1;",
            params![root_path],
            row_to_project,
        )
        .optional()
        .map_err(|e| StorageError::Other(Box::new(e)))
    }
}

fn row_to_project(row: &rusqlite::Row<'_>) -> rusqlite::Result<Project> {
    let id: String = row.get(0)?;
    let created_at: String = row.get(3)?;
    Ok(Project {
        id: ProjectId::from(id),
        root_path: row.get(1)?,
        name: row.get(2)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(root: &str) -> Project {
        Project {
            id: ProjectId::from_root_path(root),
            root_path: root.to_string(),
            name: "demo".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let project = sample("/tmp/demo");
        store.create_project(&project).unwrap();

        let fetched = store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(fetched.root_path, project.root_path);

        let by_root = store.get_project_by_root("/tmp/demo").unwrap().unwrap();
        assert_eq!(by_root.id, project.id);
    }

    #[test]
    fn missing_project_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store
            .get_project(&ProjectId::from_root_path("/nowhere"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_root_path_fails() {
        let store = Store::open_in_memory().unwrap();
        let project = sample("/tmp/dup");
        store.create_project(&project).unwrap();
        let err = store.create_project(&project);
        assert!(err.is_err());
    }
}
