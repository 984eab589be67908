//! The `Provider` trait (spec §4.5: "`Generate(messages, tools) → (text |
//! tool_calls)` call with streaming variant").
//!
//! The teacher's `neuron-turn::Provider` uses RPITIT and is deliberately
//! not object-safe (`NeuronTurn<P: Provider>` is generic there). This
//! workspace's planner/executor/orchestrator hold a provider behind
//! `Arc<dyn Provider>` picked once at startup from configuration, so this
//! trait is `async_trait`-based instead — the same tradeoff
//! `cortex_embed::EmbeddingsClient` already made.

use async_trait::async_trait;
use cortex_core::error::LlmError;

use crate::types::{ProviderRequest, ProviderResponse};

/// Whether retrying this error might succeed (spec §4.6: transient
/// errors are retried, auth errors are not).
pub fn is_retryable(error: &LlmError) -> bool {
    matches!(error, LlmError::Transient(_))
}

/// An LLM backend. Implementations translate [`ProviderRequest`] into
/// their wire format and back.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a completion request and await the full response.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LlmError>;

    /// Send a completion request, yielding incremental text chunks as
    /// they arrive. The default implementation falls back to a single
    /// chunk from [`Provider::complete`] for providers (or tests) that
    /// don't support streaming.
    async fn complete_stream(
        &self,
        request: ProviderRequest,
    ) -> Result<Vec<String>, LlmError> {
        let response = self.complete(request).await?;
        Ok(response.content.as_text().map(str::to_string).into_iter().collect())
    }
}
