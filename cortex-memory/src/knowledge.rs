//! Knowledge layer — long-lived key/value facts about the project
//! (spec §4.4).

use std::sync::Arc;

use cortex_core::ProjectId;
use cortex_store::Store;

use crate::error::MemoryError;
use crate::types::{GatherRequest, LayerOutput};

const TOP_N: usize = 10;

/// Fetches and formats the project's durable knowledge entries.
pub struct KnowledgeLayer {
    store: Arc<Store>,
}

impl KnowledgeLayer {
    /// Construct a layer over the given store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fetch the top-10 entries by importance and format them under a
    /// "Project Knowledge" header (spec §4.4). An empty project yields
    /// the literal fallback sentence.
    pub fn gather(&self, request: &GatherRequest, _budget_tokens: usize) -> Result<LayerOutput, MemoryError> {
        let mut entries = self.store.list_knowledge(&request.project_id)?;
        entries.sort_by(|a, b| b.importance.cmp(&a.importance));
        entries.truncate(TOP_N);

        let text = if entries.is_empty() {
            "No project-specific knowledge stored.".to_string()
        } else {
            let mut out = String::from("## Project Knowledge\n\n");
            for entry in &entries {
                out.push_str(&format!("{}: {}\n", entry.key, entry.value));
            }
            out
        };
        let tokens_used = cortex_tokens::TokenBudget::count(&text);
        Ok(LayerOutput {
            text,
            tokens_used,
            chunk_ids: Vec::new(),
        })
    }

    /// Store or update a knowledge entry (backs the `memory` tool's
    /// write path, spec §4.3).
    pub fn store(
        &self,
        project_id: &ProjectId,
        key: impl Into<String>,
        value: impl Into<String>,
        category: impl Into<String>,
        importance: i64,
    ) -> Result<(), MemoryError> {
        self.store.upsert_knowledge(&cortex_store::KnowledgeEntry {
            project_id: project_id.clone(),
            key: key.into(),
            value: value.into(),
            category: category.into(),
            importance,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_store::KnowledgeEntry;

    fn request() -> GatherRequest {
        GatherRequest {
            project_id: ProjectId::new("p1"),
            session_id: cortex_core::SessionId::new("s1"),
            query: "anything".into(),
        }
    }

    #[test]
    fn empty_project_yields_sentinel() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let layer = KnowledgeLayer::new(store);
        let out = layer.gather(&request(), 2_000).unwrap();
        assert_eq!(out.text, "No project-specific knowledge stored.");
    }

    #[test]
    fn orders_by_importance_descending() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: ProjectId::new("p1"),
                key: "low".into(),
                value: "less important".into(),
                category: "note".into(),
                importance: 1,
            })
            .unwrap();
        store
            .upsert_knowledge(&KnowledgeEntry {
                project_id: ProjectId::new("p1"),
                key: "high".into(),
                value: "very important".into(),
                category: "note".into(),
                importance: 9,
            })
            .unwrap();
        let layer = KnowledgeLayer::new(store);
        let out = layer.gather(&request(), 2_000).unwrap();
        let high_pos = out.text.find("high").unwrap();
        let low_pos = out.text.find("low").unwrap();
        assert!(high_pos < low_pos);
    }

    #[test]
    fn store_then_gather_round_trips() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let layer = KnowledgeLayer::new(store);
        layer
            .store(&ProjectId::new("p1"), "lang", "rust", "convention", 5)
            .unwrap();
        let out = layer.gather(&request(), 2_000).unwrap();
        assert!(out.text.contains("lang: rust"));
    }
}
