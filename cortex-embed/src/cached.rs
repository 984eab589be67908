//! Caching decorator over any [`EmbeddingsClient`] (spec §4.2, §8: "embed(text)
//! called twice on the same text in the same session returns bit-identical
//! vectors (via cache)").
//!
//! Backed by `cortex-store`'s `Cache` table (spec §6) rather than an
//! in-process map, so the cache also survives across a resumed session.

use std::sync::Arc;

use async_trait::async_trait;
use cortex_core::error::EmbeddingError;
use cortex_store::{hash_key, CacheEntry, Store};

use crate::client::{EmbeddingOutcome, EmbeddingsClient};
use crate::vector::EmbeddingVector;

const CACHE_CATEGORY: &str = "embedding";

/// Wraps an [`EmbeddingsClient`], checking `cortex-store`'s `Cache` table
/// before calling through, and populating it with whatever the inner
/// client returns (including degraded pseudo-embeddings, so a repeated
/// lookup for the same text during an outage stays consistent until the
/// cache entry is recomputed).
pub struct CachedEmbeddingsClient<C> {
    inner: C,
    store: Arc<Store>,
    model: String,
}

impl<C: EmbeddingsClient> CachedEmbeddingsClient<C> {
    /// Wrap `inner`, caching under `store` keyed by `model` + dimension +
    /// text so switching embedding models never serves a stale vector.
    pub fn new(inner: C, store: Arc<Store>, model: impl Into<String>) -> Self {
        Self {
            inner,
            store,
            model: model.into(),
        }
    }

    fn cache_key(&self, text: &str) -> String {
        hash_key(&format!("{}:{}:{}", self.model, self.inner.dimension(), text))
    }
}

#[async_trait]
impl<C: EmbeddingsClient + Send + Sync> EmbeddingsClient for CachedEmbeddingsClient<C> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut outcomes: Vec<Option<EmbeddingOutcome>> = vec![None; texts.len()];
        let mut miss_indices = Vec::new();
        let mut miss_texts = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            match self.store.get_cache(&self.cache_key(text)) {
                Ok(Some(entry)) => match decode(&entry.value) {
                    Ok(outcome) => outcomes[i] = Some(outcome),
                    Err(e) => {
                        tracing::warn!(error = %e, "discarding corrupt embedding cache entry");
                        miss_indices.push(i);
                        miss_texts.push(text.clone());
                    }
                },
                Ok(None) => {
                    miss_indices.push(i);
                    miss_texts.push(text.clone());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "embedding cache lookup failed, falling through to provider");
                    miss_indices.push(i);
                    miss_texts.push(text.clone());
                }
            }
        }

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed(&miss_texts).await?;
            for (&idx, outcome) in miss_indices.iter().zip(fresh.into_iter()) {
                let entry = CacheEntry {
                    cache_key: self.cache_key(&texts[idx]),
                    category: CACHE_CATEGORY.to_string(),
                    value: encode(&outcome),
                    expires_at: None,
                };
                if let Err(e) = self.store.put_cache(&entry) {
                    tracing::warn!(error = %e, "failed to populate embedding cache");
                }
                outcomes[idx] = Some(outcome);
            }
        }

        Ok(outcomes.into_iter().map(|o| o.expect("every index is filled by a hit or a miss")).collect())
    }
}

/// `[degraded: u8][vector bytes]`.
fn encode(outcome: &EmbeddingOutcome) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + outcome.vector.dim() * 4 + 4);
    buf.push(outcome.degraded as u8);
    buf.extend_from_slice(&outcome.vector.to_bytes());
    buf
}

fn decode(bytes: &[u8]) -> Result<EmbeddingOutcome, EmbeddingError> {
    let (flag, rest) = bytes
        .split_first()
        .ok_or_else(|| EmbeddingError::Unavailable("empty embedding cache entry".into()))?;
    Ok(EmbeddingOutcome {
        vector: EmbeddingVector::from_bytes(rest)?,
        degraded: *flag != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingsClient for CountingClient {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| EmbeddingOutcome {
                    vector: EmbeddingVector::new(vec![t.len() as f32, 0.0, 0.0]),
                    degraded: false,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn repeated_embed_of_the_same_text_hits_the_cache() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let inner = CountingClient {
            calls: AtomicUsize::new(0),
        };
        let client = CachedEmbeddingsClient::new(inner, store, "test-model");

        let first = client.embed(&["hello world".to_string()]).await.unwrap();
        let second = client.embed(&["hello world".to_string()]).await.unwrap();

        assert_eq!(first[0].vector, second[0].vector);
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_texts_each_trigger_the_inner_client() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let inner = CountingClient {
            calls: AtomicUsize::new(0),
        };
        let client = CachedEmbeddingsClient::new(inner, store, "test-model");

        client.embed(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
        client.embed(&["c".to_string()]).await.unwrap();
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
    }
}
