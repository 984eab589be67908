//! Minimal read/write scope abstraction backing the `memory` tool
//! (read/write knowledge store, spec §4.3).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from a [`StateStore`] operation.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The requested key was not found in the given scope.
    #[error("not found: {scope}/{key}")]
    NotFound {
        /// Scope that was searched.
        scope: String,
        /// Key that was not found.
        key: String,
    },

    /// The write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// Where a key/value pair lives. Scopes are hierarchical: a session
/// scope is narrower than a project scope.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Per-project knowledge.
    Project(String),
    /// Per-session working context.
    Session(String),
}

/// CRUD + search over a scoped key/value space. [`crate::error::StorageError`]
/// is the error type used by the concrete persistence-backed
/// implementation (`cortex-store`); this trait is kept storage-agnostic
/// so tests can swap in an in-memory store.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value by key within a scope. `None` if absent.
    async fn read(&self, scope: &Scope, key: &str) -> Result<Option<serde_json::Value>, StateError>;

    /// Write a value. Creates or overwrites.
    async fn write(
        &self,
        scope: &Scope,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), StateError>;

    /// Delete a value. No-op if the key doesn't exist.
    async fn delete(&self, scope: &Scope, key: &str) -> Result<(), StateError>;

    /// List keys under a prefix within a scope.
    async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    struct MemoryStore {
        data: RwLock<HashMap<(Scope, String), serde_json::Value>>,
    }

    #[async_trait]
    impl StateStore for MemoryStore {
        async fn read(
            &self,
            scope: &Scope,
            key: &str,
        ) -> Result<Option<serde_json::Value>, StateError> {
            Ok(self.data.read().await.get(&(scope.clone(), key.to_string())).cloned())
        }

        async fn write(
            &self,
            scope: &Scope,
            key: &str,
            value: serde_json::Value,
        ) -> Result<(), StateError> {
            self.data
                .write()
                .await
                .insert((scope.clone(), key.to_string()), value);
            Ok(())
        }

        async fn delete(&self, scope: &Scope, key: &str) -> Result<(), StateError> {
            self.data.write().await.remove(&(scope.clone(), key.to_string()));
            Ok(())
        }

        async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, StateError> {
            Ok(self
                .data
                .read()
                .await
                .keys()
                .filter(|(s, k)| s == scope && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    #[tokio::test]
    async fn round_trips_through_scope() {
        let store = MemoryStore {
            data: RwLock::new(HashMap::new()),
        };
        let scope = Scope::Project("proj-1".into());
        store
            .write(&scope, "lang", serde_json::json!("rust"))
            .await
            .unwrap();
        let got = store.read(&scope, "lang").await.unwrap();
        assert_eq!(got, Some(serde_json::json!("rust")));
    }
}
