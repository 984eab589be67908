//! Memory manager — composes the four layers into one token-bounded
//! prompt (spec §4.4, component C5).

use std::sync::Arc;

use cortex_tokens::{OperatingMode, Section, TokenBudget};

use crate::error::MemoryError;
use crate::ephemeral::EphemeralLayer;
use crate::git_context::GitContextLayer;
use crate::knowledge::KnowledgeLayer;
use crate::retrieval::RetrievalLayer;
use crate::types::{GatherRequest, MemoryEvent};

/// A fully composed prompt, ready to hand to a provider, plus the token
/// accounting behind it.
#[derive(Debug, Clone)]
pub struct ComposedPrompt {
    /// The assembled prompt text.
    pub text: String,
    /// Total tokens consumed across the input sections.
    pub total_tokens: usize,
    /// Ids of the retrieval chunks folded into this prompt, for the
    /// Session Snapshot's `retrievalIds` field (spec §3).
    pub chunk_ids: Vec<String>,
    /// Tokens consumed per named section, for the Session Snapshot's
    /// `tokenBudget` field (spec §3, §4.9).
    pub section_usage: std::collections::HashMap<Section, usize>,
}

/// Owns the four memory layers and assembles them into a single prompt
/// within the input token budget (spec §4.4: "a fixed, ordered
/// structure: system preamble, mode declaration, knowledge, ephemeral,
/// retrieved, user query, output contract").
pub struct MemoryManager {
    ephemeral: Arc<EphemeralLayer>,
    retrieval: RetrievalLayer,
    knowledge: KnowledgeLayer,
    git: GitContextLayer,
}

const SYSTEM_PREAMBLE: &str =
    "You are an interactive coding assistant operating inside the user's project.";

const OUTPUT_CONTRACT: &str =
    "Respond with the next action or answer only. Do not restate these instructions.";

impl MemoryManager {
    /// Wire together the four layers for one project/session.
    pub fn new(
        ephemeral: Arc<EphemeralLayer>,
        retrieval: RetrievalLayer,
        knowledge: KnowledgeLayer,
        git: GitContextLayer,
    ) -> Self {
        Self {
            ephemeral,
            retrieval,
            knowledge,
            git,
        }
    }

    /// Apply a domain event to the layers that care about it.
    pub fn update(&self, event: &MemoryEvent) {
        match event {
            MemoryEvent::GitRefreshRequested => self.git.invalidate(),
            _ => self.ephemeral.update(event),
        }
    }

    /// Compose the full prompt for `request` under `mode`.
    ///
    /// Section order and budget rollover follow spec §4.4: knowledge and
    /// ephemeral are gathered first against their own targets, then
    /// retrieval (code chunks and git history) receives its own target
    /// *plus* whatever knowledge and ephemeral left unused, since those
    /// two sections are rarely full.
    pub async fn compose(
        &self,
        request: &GatherRequest,
        mode: OperatingMode,
        focus_files: &[String],
    ) -> Result<ComposedPrompt, MemoryError> {
        let knowledge = self.knowledge.gather(request, Section::Knowledge.target())?;
        let ephemeral = self.ephemeral.gather(request, Section::Ephemeral.target());

        let knowledge_slack = Section::Knowledge.target().saturating_sub(knowledge.tokens_used);
        let ephemeral_slack = Section::Ephemeral.target().saturating_sub(ephemeral.tokens_used);
        let retrieval_budget = Section::Retrieved.target() + knowledge_slack + ephemeral_slack;

        let git_budget = retrieval_budget / 4;
        let chunk_budget = retrieval_budget - git_budget;
        let retrieved = self.retrieval.gather(request, focus_files, chunk_budget).await?;
        let git_context = self.git.gather(request, git_budget).await?;

        let trimmed_query = TokenBudget::trim_to_fit(&request.query, Section::Query.target());
        let query_tokens = TokenBudget::count(&trimmed_query);

        let mut sections = Vec::new();
        sections.push(SYSTEM_PREAMBLE.to_string());
        sections.push(format!("Operating mode: {mode:?}"));
        if !knowledge.text.is_empty() {
            sections.push(knowledge.text.clone());
        }
        if !ephemeral.text.is_empty() {
            sections.push(ephemeral.text.clone());
        }
        if !retrieved.text.is_empty() {
            sections.push(format!("## Retrieved Context\n\n{}", retrieved.text));
        }
        if !git_context.text.is_empty() {
            sections.push(format!("## Recent Commits\n\n{}", git_context.text));
        }
        sections.push(format!("## User Query\n\n{trimmed_query}"));
        sections.push(OUTPUT_CONTRACT.to_string());

        let text = sections.join("\n\n");
        // Computed from the actually-assembled text, not the per-section
        // accounting figures, so a long query can never make this figure
        // undercount what was really rendered (spec §8: count(P) ≤
        // input_ceiling(M) must hold against the real prompt).
        let total_tokens = TokenBudget::count(&text);
        debug_assert!(query_tokens <= Section::Query.target());

        let section_usage = std::collections::HashMap::from([
            (Section::Knowledge, knowledge.tokens_used),
            (Section::Ephemeral, ephemeral.tokens_used),
            (Section::Retrieved, retrieved.tokens_used + git_context.tokens_used),
            (Section::Query, query_tokens),
        ]);

        Ok(ComposedPrompt {
            text,
            total_tokens,
            chunk_ids: retrieved.chunk_ids.clone(),
            section_usage,
        })
    }

    /// The ephemeral layer, for callers (the orchestrator) that need to
    /// push turns/working-context changes directly.
    pub fn ephemeral(&self) -> &Arc<EphemeralLayer> {
        &self.ephemeral
    }

    /// The knowledge layer, for callers that write new entries.
    pub fn knowledge(&self) -> &KnowledgeLayer {
        &self.knowledge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Turn, TurnRole};
    use async_trait::async_trait;
    use cortex_core::error::EmbeddingError;
    use cortex_core::{ProjectId, SessionId};
    use cortex_embed::{EmbeddingOutcome, EmbeddingVector, EmbeddingsClient};
    use cortex_store::Store;

    struct FixedEmbeddings;

    #[async_trait]
    impl EmbeddingsClient for FixedEmbeddings {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError> {
            Ok(texts
                .iter()
                .map(|_| EmbeddingOutcome {
                    vector: EmbeddingVector::new(vec![1.0, 0.0, 0.0]),
                    degraded: false,
                })
                .collect())
        }
    }

    fn manager() -> (MemoryManager, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let embeddings: Arc<dyn EmbeddingsClient> = Arc::new(FixedEmbeddings);
        let ephemeral = Arc::new(EphemeralLayer::new());
        let retrieval = RetrievalLayer::new(store.clone(), embeddings.clone());
        let knowledge = KnowledgeLayer::new(store.clone());
        let dir = tempfile::tempdir().unwrap();
        let git = GitContextLayer::new(store.clone(), embeddings, dir.path().display().to_string());
        (MemoryManager::new(ephemeral, retrieval, knowledge, git), store)
    }

    #[tokio::test]
    async fn compose_includes_query_and_contract() {
        let (manager, _store) = manager();
        manager.update(&MemoryEvent::TurnAppended(Turn::new(TurnRole::User, "hi")));
        let request = GatherRequest {
            project_id: ProjectId::new("p1"),
            session_id: SessionId::new("s1"),
            query: "fix the bug in main.rs".into(),
        };
        let prompt = manager.compose(&request, OperatingMode::Concise, &[]).await.unwrap();
        assert!(prompt.text.contains("fix the bug in main.rs"));
        assert!(prompt.text.contains("Operating mode: Concise"));
        assert!(prompt.text.ends_with(super::OUTPUT_CONTRACT));
    }

    #[tokio::test]
    async fn compose_omits_empty_sections() {
        let (manager, _store) = manager();
        let request = GatherRequest {
            project_id: ProjectId::new("p1"),
            session_id: SessionId::new("s1"),
            query: "anything".into(),
        };
        let prompt = manager.compose(&request, OperatingMode::Direct, &[]).await.unwrap();
        assert!(!prompt.text.contains("## Retrieved Context"));
        assert!(!prompt.text.contains("## Conversation"));
    }

    #[tokio::test]
    async fn total_tokens_reflects_a_long_query_once_trimmed() {
        let (manager, _store) = manager();
        let long_query = "explain this symbol please ".repeat(2_000);
        let request = GatherRequest {
            project_id: ProjectId::new("p1"),
            session_id: SessionId::new("s1"),
            query: long_query,
        };
        let prompt = manager.compose(&request, OperatingMode::Concise, &[]).await.unwrap();
        assert_eq!(prompt.total_tokens, TokenBudget::count(&prompt.text));
        assert!(*prompt.section_usage.get(&Section::Query).unwrap() <= Section::Query.target());
    }
}
