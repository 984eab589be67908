#![deny(missing_docs)]
//! # cortex-provider — the LLM wire contract
//!
//! The LLM is treated as an external collaborator (spec §1): this crate
//! specifies its interface — `generate(messages, tools) -> (text |
//! tool_calls)` with a streaming variant (§4.5) — not its internals.
//! [`anthropic::AnthropicLikeProvider`] is one concrete HTTP
//! implementation of that interface.

pub mod anthropic;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicLikeProvider;
pub use provider::{is_retryable, Provider};
pub use types::{
    ProviderMessage, ProviderRequest, ProviderResponse, Role, StopReason, TokenUsage, ToolSchema,
};
