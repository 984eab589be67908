//! Retrieval layer — embedding-based similarity search over indexed
//! project chunks (spec §4.4).
//!
//! Grounded on `neuron-context`'s `ContextStrategy` shape generalized to
//! a ranked multi-source fetch; the ranking formula and emission format
//! are specified verbatim in spec §4.4.

use std::sync::Arc;

use chrono::Utc;
use cortex_core::ProjectId;
use cortex_embed::{cosine_similarity, EmbeddingVector, EmbeddingsClient};
use cortex_store::{Chunk, Store};
use cortex_tokens::TokenBudget;

use crate::error::MemoryError;
use crate::types::{GatherRequest, LayerOutput};

const INITIAL_K: usize = 12;
const MAX_K: usize = 30;
const SIMILARITY_FLOOR_FOR_EXPANSION: f32 = 0.7;
const RECENCY_WEIGHT: f32 = 0.2;
const PROXIMITY_WEIGHT: f32 = 0.3;

/// Ranks and formats project chunks relevant to a query.
pub struct RetrievalLayer {
    store: Arc<Store>,
    embeddings: Arc<dyn EmbeddingsClient>,
}

struct Ranked {
    chunk: Chunk,
    similarity: f32,
    rank: f32,
}

impl RetrievalLayer {
    /// Construct a layer over the given store and embeddings client.
    pub fn new(store: Arc<Store>, embeddings: Arc<dyn EmbeddingsClient>) -> Self {
        Self { store, embeddings }
    }

    /// Embed `request.query`, rank project chunks by similarity +
    /// recency + proximity, and format the top matches within
    /// `budget_tokens` (spec §4.4).
    pub async fn gather(
        &self,
        request: &GatherRequest,
        focus_files: &[String],
        budget_tokens: usize,
    ) -> Result<LayerOutput, MemoryError> {
        let all_chunks = self.store.list_chunks(&request.project_id)?;
        if all_chunks.is_empty() {
            return Ok(LayerOutput::empty());
        }

        let query_embedding = self
            .embeddings
            .embed(std::slice::from_ref(&request.query))
            .await?
            .pop()
            .map(|o| o.vector)
            .ok_or_else(|| {
                cortex_core::error::EmbeddingError::Unavailable("empty embed response".into())
            })?;

        let mut ranked = rank_chunks(&all_chunks, &query_embedding, focus_files)?;
        ranked.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(std::cmp::Ordering::Equal));

        let mut k = INITIAL_K.min(ranked.len());
        // Expand K up to MAX_K while the budget allows and scores remain
        // strong (spec §4.4).
        while k < MAX_K.min(ranked.len()) && ranked[k].similarity > SIMILARITY_FLOOR_FOR_EXPANSION {
            k += 1;
        }

        let mut out = String::new();
        let mut tokens_used = 0usize;
        let mut chunk_ids = Vec::new();
        for entry in ranked.iter().take(k) {
            let fragment = format!(
                "--- {} (similarity: {:.2}) ---\n{}",
                entry.chunk.path, entry.similarity, entry.chunk.content
            );
            let fragment_tokens = TokenBudget::count(&fragment);
            let separator_tokens = if out.is_empty() { 0 } else { TokenBudget::count("\n\n") };
            if tokens_used + separator_tokens + fragment_tokens > budget_tokens {
                break;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
                tokens_used += separator_tokens;
            }
            out.push_str(&fragment);
            tokens_used += fragment_tokens;
            chunk_ids.push(entry.chunk.id.as_str().to_string());
            self.store.touch_chunk(&entry.chunk.id, Utc::now())?;
        }

        Ok(LayerOutput {
            text: out,
            tokens_used,
            chunk_ids,
        })
    }

    /// Project id this layer was constructed for (used by callers that
    /// need to confirm dimension consistency on reindex).
    pub fn project_chunk_count(&self, project_id: &ProjectId) -> Result<usize, MemoryError> {
        Ok(self.store.list_chunks(project_id)?.len())
    }
}

fn rank_chunks(
    chunks: &[Chunk],
    query: &EmbeddingVector,
    focus_files: &[String],
) -> Result<Vec<Ranked>, MemoryError> {
    let now = Utc::now();
    let mut out = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let vector = EmbeddingVector::from_bytes(&chunk.embedding)
            .map_err(cortex_core::error::EmbeddingError::from)?;
        if vector.dim() != query.dim() {
            // Spec invariant: cosine similarity only defined between
            // equal-dimension vectors. A dimension drift (e.g. embedding
            // model changed) skips the chunk rather than failing the
            // whole gather.
            continue;
        }
        let similarity = cosine_similarity(&vector, query)?;
        let days_since_use = (now - chunk.last_used_at).num_seconds().max(0) as f32 / 86_400.0;
        let recency_score = 1.0 / (1.0 + days_since_use);
        let proximity_score = if focus_files.iter().any(|f| f == &chunk.path) {
            1.0
        } else {
            0.0
        };
        let rank = similarity + RECENCY_WEIGHT * recency_score + PROXIMITY_WEIGHT * proximity_score;
        out.push(Ranked {
            chunk: chunk.clone(),
            similarity,
            rank,
        });
    }
    Ok(out)
}
