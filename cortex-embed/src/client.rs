//! Embeddings client contract and HTTP implementation (spec §4.2).
//!
//! Grounded on `neuron-provider-openai::embeddings` for the request/
//! response shape and HTTP status mapping, generalized with the
//! retry/backoff policy shape `agent-types`' `RetryPolicy` describes
//! (three attempts, 500 ms initial interval, doubling).

use async_trait::async_trait;
use cortex_core::error::EmbeddingError;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::vector::EmbeddingVector;

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// One embedding result, tagged if it came from the pseudo-embedding
/// fallback rather than the real model (spec §4.2: "calls that produced
/// a fallback embedding are tagged so they can be recomputed later").
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    /// The computed vector.
    pub vector: EmbeddingVector,
    /// `true` if this vector is a deterministic pseudo-embedding
    /// substituted after the real provider failed past its retry budget.
    pub degraded: bool,
}

/// Computes fixed-dimension vectors for text. `dimension()` must be
/// constant for the lifetime of the client.
#[async_trait]
pub trait EmbeddingsClient: Send + Sync {
    /// The fixed dimension this client produces.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one outcome per input, preserving order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError>;
}

/// HTTP embeddings client speaking an OpenAI-compatible embeddings API.
///
/// On transient failure (network error or 5xx/429) retries up to
/// [`MAX_ATTEMPTS`] times with exponential backoff starting at
/// [`INITIAL_BACKOFF`]. If every attempt fails, falls back to a
/// deterministic hash-based pseudo-embedding for the whole batch rather
/// than failing the call outright — retrieval degrades gracefully
/// instead of going dark.
pub struct HttpEmbeddingsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingsClient {
    /// Construct a client targeting `api_url` (the full embeddings
    /// endpoint, e.g. `https://api.openai.com/v1/embeddings`).
    pub fn new(
        api_key: impl Into<String>,
        api_url: impl Into<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            dimension,
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
            "encoding_format": "float",
        });

        tracing::debug!(url = %self.api_url, model = %self.model, batch = texts.len(), "sending embedding request");

        let response = self
            .client
            .post(&self.api_url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Unavailable(format!("network error: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EmbeddingError::Unavailable(format!("network error: {e}")))?;

        if !status.is_success() {
            return Err(EmbeddingError::Unavailable(format!(
                "HTTP {status}: {text}"
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| EmbeddingError::Unavailable(format!("invalid JSON response: {e}")))?;

        parse_embeddings(&json, self.dimension)
    }
}

#[async_trait]
impl EmbeddingsClient for HttpEmbeddingsClient {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<EmbeddingOutcome>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            match self.embed_once(texts).await {
                Ok(vectors) => {
                    return Ok(vectors
                        .into_iter()
                        .map(|vector| EmbeddingOutcome {
                            vector,
                            degraded: false,
                        })
                        .collect());
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "embedding request failed");
                    last_err = Some(err);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        tracing::warn!(
            error = ?last_err,
            "embedding provider exhausted retries, falling back to pseudo-embeddings"
        );
        Ok(texts
            .iter()
            .map(|t| EmbeddingOutcome {
                vector: pseudo_embedding(t, self.dimension),
                degraded: true,
            })
            .collect())
    }
}

fn parse_embeddings(
    json: &serde_json::Value,
    expected_dim: usize,
) -> Result<Vec<EmbeddingVector>, EmbeddingError> {
    let data = json["data"]
        .as_array()
        .ok_or_else(|| EmbeddingError::Unavailable("missing 'data' array".to_string()))?;

    let mut out = Vec::with_capacity(data.len());
    for item in data {
        let values = item["embedding"]
            .as_array()
            .ok_or_else(|| EmbeddingError::Unavailable("missing 'embedding' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| EmbeddingError::Unavailable("non-numeric embedding value".into()))
            })
            .collect::<Result<Vec<f32>, _>>()?;
        if values.len() != expected_dim {
            return Err(EmbeddingError::DimensionMismatch {
                a: expected_dim,
                b: values.len(),
            });
        }
        out.push(EmbeddingVector::new(values));
    }
    Ok(out)
}

/// Deterministic hash-based pseudo-embedding, used when the real
/// embedding provider is unavailable after retries (spec §4.2).
///
/// Not semantically meaningful — it exists only so retrieval keeps a
/// well-formed, fixed-dimension vector to compare against until the
/// chunk can be recomputed with a real embedding.
pub fn pseudo_embedding(text: &str, dim: usize) -> EmbeddingVector {
    let mut values = Vec::with_capacity(dim);
    let mut counter: u32 = 0;
    while values.len() < dim {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();
        for chunk in digest.chunks_exact(4) {
            if values.len() >= dim {
                break;
            }
            let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            // Map to [-1, 1].
            values.push((raw as f32 / u32::MAX as f32) * 2.0 - 1.0);
        }
        counter += 1;
    }
    EmbeddingVector::new(values)
}
