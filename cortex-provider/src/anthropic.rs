//! An Anthropic Messages API-shaped HTTP provider.
//!
//! Grounded on `neuron-provider-anthropic::client::Anthropic` (builder
//! fields, `messages_url`, header set, success/failure status handling)
//! generalized to this crate's `Provider` trait and applying
//! `Content::strip_thinking` to the response before it's returned, per
//! spec §6's "no reasoning reaches the caller unless explicitly asked".

use async_trait::async_trait;
use cortex_core::error::LlmError;
use cortex_core::{Content, ContentBlock};

use crate::provider::Provider;
use crate::types::{ProviderRequest, ProviderResponse, Role, StopReason, TokenUsage};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic-Messages-API-shaped provider. Works against the real API or
/// any compatible proxy (`base_url` override).
pub struct AnthropicLikeProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl AnthropicLikeProvider {
    /// Build a client with the given API key and default model/base URL.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the default model used when a request omits one.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn to_api_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let model = request.model.clone().unwrap_or_else(|| self.model.clone());
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": role_str(m.role),
                    "content": content_to_blocks(&m.content),
                })
            })
            .collect();
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(4096),
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!(tools);
        }
        if let Some(system) = &request.system {
            body["system"] = serde_json::json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        body
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn content_to_blocks(content: &Content) -> serde_json::Value {
    match content {
        Content::Text(text) => serde_json::json!(text),
        Content::Blocks(blocks) => serde_json::json!(blocks
            .iter()
            .map(|b| match b {
                ContentBlock::Text { text } => serde_json::json!({"type": "text", "text": text}),
                ContentBlock::ToolUse { id, name, input } => serde_json::json!({
                    "type": "tool_use", "id": id, "name": name, "input": input,
                }),
                ContentBlock::ToolResult { tool_use_id, content, is_error } => serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                }),
            })
            .collect::<Vec<_>>()),
    }
}

fn blocks_from_api(json: &serde_json::Value) -> Content {
    let Some(array) = json.get("content").and_then(|v| v.as_array()) else {
        return Content::Text(String::new());
    };
    let blocks: Vec<ContentBlock> = array
        .iter()
        .filter_map(|block| match block.get("type").and_then(|v| v.as_str()) {
            Some("text") => Some(ContentBlock::Text {
                text: block.get("text")?.as_str()?.to_string(),
            }),
            Some("tool_use") => Some(ContentBlock::ToolUse {
                id: block.get("id")?.as_str()?.to_string(),
                name: block.get("name")?.as_str()?.to_string(),
                input: block.get("input").cloned().unwrap_or(serde_json::Value::Null),
            }),
            _ => None,
        })
        .collect();
    Content::Blocks(blocks)
}

fn stop_reason_from_api(json: &serde_json::Value) -> StopReason {
    match json.get("stop_reason").and_then(|v| v.as_str()) {
        Some("tool_use") => StopReason::ToolUse,
        Some("max_tokens") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

fn usage_from_api(json: &serde_json::Value) -> TokenUsage {
    let usage = json.get("usage");
    TokenUsage {
        input_tokens: usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        output_tokens: usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0),
        cache_read_tokens: usage
            .and_then(|u| u.get("cache_read_input_tokens"))
            .and_then(|v| v.as_u64()),
        cache_creation_tokens: usage
            .and_then(|u| u.get("cache_creation_input_tokens"))
            .and_then(|v| v.as_u64()),
    }
}

fn map_http_status(status: reqwest::StatusCode, body: &str) -> LlmError {
    if status.as_u16() == 401 || status.as_u16() == 403 {
        LlmError::Auth(format!("{status}: {body}"))
    } else if status.is_server_error() || status.as_u16() == 429 {
        LlmError::Transient(format!("{status}: {body}"))
    } else {
        LlmError::Malformed(format!("{status}: {body}"))
    }
}

#[async_trait]
impl Provider for AnthropicLikeProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, LlmError> {
        let body = self.to_api_body(&request);
        let model = body["model"].as_str().unwrap_or(&self.model).to_string();

        tracing::debug!(url = %self.messages_url(), model = %model, "sending completion request");

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        if !status.is_success() {
            return Err(map_http_status(status, &text));
        }

        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| LlmError::Malformed(e.to_string()))?;

        let content = blocks_from_api(&json).strip_thinking();

        Ok(ProviderResponse {
            content,
            stop_reason: stop_reason_from_api(&json),
            usage: usage_from_api(&json),
            model,
            cost: None,
            truncated: None,
        })
    }
}
