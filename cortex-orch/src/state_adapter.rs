//! Adapts the Knowledge table (`cortex-store`) to the [`StateStore`]
//! trait the `memory` tool reads and writes through (spec §4.3).

use std::sync::Arc;

use async_trait::async_trait;
use cortex_core::state::{Scope, StateError, StateStore};
use cortex_core::ProjectId;
use cortex_store::{KnowledgeEntry, Store};

const CATEGORY: &str = "memory-tool";

/// Backs the `memory` tool with the project's durable Knowledge table.
///
/// The spec's Knowledge Entry is project-scoped only — there is no
/// separate session-scoped table. `Scope::Session` keys are accepted
/// but namespaced under a synthetic project id derived from the session
/// id, so two sessions never collide and a session's scratch values
/// don't leak into the project's permanent knowledge (see DESIGN.md).
pub struct KnowledgeStateStore {
    store: Arc<Store>,
}

impl KnowledgeStateStore {
    /// Adapt `store`'s knowledge table to the `StateStore` contract.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

fn project_id_for(scope: &Scope) -> ProjectId {
    match scope {
        Scope::Project(id) => ProjectId::new(id.clone()),
        Scope::Session(id) => ProjectId::new(format!("session:{id}")),
    }
}

#[async_trait]
impl StateStore for KnowledgeStateStore {
    async fn read(&self, scope: &Scope, key: &str) -> Result<Option<serde_json::Value>, StateError> {
        let project_id = project_id_for(scope);
        let entries = self
            .store
            .list_knowledge(&project_id)
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;
        Ok(entries
            .into_iter()
            .find(|e| e.key == key)
            .map(|e| serde_json::from_str(&e.value).unwrap_or(serde_json::Value::String(e.value))))
    }

    async fn write(&self, scope: &Scope, key: &str, value: serde_json::Value) -> Result<(), StateError> {
        let project_id = project_id_for(scope);
        let value = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        self.store
            .upsert_knowledge(&KnowledgeEntry {
                project_id,
                key: key.to_string(),
                value,
                category: CATEGORY.to_string(),
                importance: 0,
            })
            .map_err(|e| StateError::WriteFailed(e.to_string()))
    }

    async fn delete(&self, scope: &Scope, key: &str) -> Result<(), StateError> {
        let project_id = project_id_for(scope);
        self.store
            .delete_knowledge(&project_id, key)
            .map_err(|e| StateError::WriteFailed(e.to_string()))
    }

    async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, StateError> {
        let project_id = project_id_for(scope);
        let entries = self
            .store
            .list_knowledge(&project_id)
            .map_err(|e| StateError::WriteFailed(e.to_string()))?;
        Ok(entries
            .into_iter()
            .map(|e| e.key)
            .filter(|k| k.starts_with(prefix))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_store::Project;

    fn store_with_projects(ids: &[&str]) -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        for id in ids {
            store
                .create_project(&Project {
                    id: ProjectId::new(*id),
                    root_path: format!("/tmp/{id}"),
                    name: (*id).to_string(),
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn round_trips_through_project_scope() {
        let store = store_with_projects(&["proj-1"]);
        let adapter = KnowledgeStateStore::new(store);
        let scope = Scope::Project("proj-1".into());
        adapter.write(&scope, "lang", serde_json::json!("rust")).await.unwrap();
        let got = adapter.read(&scope, "lang").await.unwrap();
        assert_eq!(got, Some(serde_json::json!("rust")));
    }

    #[tokio::test]
    async fn session_scope_is_isolated_from_project_scope() {
        let store = store_with_projects(&["session:s1", "s1"]);
        let adapter = KnowledgeStateStore::new(store);
        adapter
            .write(&Scope::Session("s1".into()), "k", serde_json::json!(1))
            .await
            .unwrap();
        let project_side = adapter.read(&Scope::Project("s1".into()), "k").await.unwrap();
        assert!(project_side.is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_key() {
        let store = store_with_projects(&["proj-1"]);
        let adapter = KnowledgeStateStore::new(store);
        let scope = Scope::Project("proj-1".into());
        adapter.write(&scope, "k", serde_json::json!("v")).await.unwrap();
        adapter.delete(&scope, "k").await.unwrap();
        assert_eq!(adapter.read(&scope, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let store = store_with_projects(&["proj-1"]);
        let adapter = KnowledgeStateStore::new(store);
        let scope = Scope::Project("proj-1".into());
        adapter.write(&scope, "build.target", serde_json::json!("x")).await.unwrap();
        adapter.write(&scope, "other", serde_json::json!("y")).await.unwrap();
        let keys = adapter.list(&scope, "build.").await.unwrap();
        assert_eq!(keys, vec!["build.target".to_string()]);
    }
}
