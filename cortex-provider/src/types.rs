//! Wire types for the LLM contract (spec §4.5 / §6): a single
//! `generate(messages, tools) -> (text | tool_calls)` call abstracted
//! behind [`crate::provider::Provider`].
//!
//! Grounded on `neuron-turn::types` (near-verbatim field shapes), with
//! `ContentPart` dropped in favor of reusing `cortex_core::Content` —
//! this workspace already has a universal content type with the same
//! text/tool-use/tool-result variants, so duplicating it here would just
//! be two names for one shape. No `Image` variant: the spec's canonical
//! tool set and memory layers are all text.

use cortex_core::Content;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The user.
    User,
    /// The model.
    Assistant,
}

/// A single message in the conversation sent to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMessage {
    /// Author role.
    pub role: Role,
    /// Message content.
    pub content: Content,
}

impl ProviderMessage {
    /// Build a plain-text message.
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: Content::text(text),
        }
    }
}

/// A tool's JSON-Schema description, as sent to the provider (spec §4.5:
/// `Generate(messages, tools)`). Built from a tool registry's schemas by
/// the planner — this crate doesn't depend on `cortex-tool`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's input object.
    pub input_schema: serde_json::Value,
}

/// A request to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// Model identifier; `None` uses the provider's default.
    pub model: Option<String>,
    /// Conversation messages.
    pub messages: Vec<ProviderMessage>,
    /// Tools available to the model.
    #[serde(default)]
    pub tools: Vec<ToolSchema>,
    /// Maximum output tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// System prompt text.
    pub system: Option<String>,
    /// Provider-specific passthrough (e.g. JSON-mode flags).
    #[serde(default)]
    pub extra: serde_json::Value,
}

impl ProviderRequest {
    /// Start a request with just a system prompt and messages; tools and
    /// sampling parameters default to empty/unset.
    pub fn new(system: impl Into<String>, messages: Vec<ProviderMessage>) -> Self {
        Self {
            model: None,
            messages,
            tools: Vec::new(),
            max_tokens: None,
            temperature: None,
            system: Some(system.into()),
            extra: serde_json::Value::Null,
        }
    }

    /// Attach tool schemas.
    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = tools;
        self
    }
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A final response was produced.
    EndTurn,
    /// The model requested a tool call.
    ToolUse,
    /// `max_tokens` was reached.
    MaxTokens,
    /// Content was filtered.
    ContentFilter,
}

/// Token accounting for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated.
    pub output_tokens: u64,
    /// Tokens served from a provider-side cache, if supported.
    pub cache_read_tokens: Option<u64>,
    /// Tokens written to a provider-side cache, if supported.
    pub cache_creation_tokens: Option<u64>,
}

/// A provider's response to a [`ProviderRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Response content. `<think>...</think>` blocks are stripped before
    /// this reaches the caller (spec §6).
    pub content: Content,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// Token usage for the call.
    pub usage: TokenUsage,
    /// Model actually used.
    pub model: String,
    /// Provider-reported cost, if known.
    pub cost: Option<Decimal>,
    /// Whether the provider silently truncated input (telemetry only).
    pub truncated: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_roundtrips() {
        let msg = ProviderMessage::text(Role::User, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        let back: ProviderMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.role, Role::User);
        assert_eq!(back.content.as_text(), Some("hello"));
    }

    #[test]
    fn request_builder_attaches_tools() {
        let request = ProviderRequest::new("be helpful", vec![]).with_tools(vec![ToolSchema {
            name: "bash".into(),
            description: "run a shell command".into(),
            input_schema: serde_json::json!({"type": "object"}),
        }]);
        assert_eq!(request.tools.len(), 1);
        assert_eq!(request.system.as_deref(), Some("be helpful"));
    }
}
