//! Universal content types that cross every component boundary.

use serde::{Deserialize, Serialize};

/// The universal content type. Intentionally simple — structured content
/// uses [`ContentBlock`] variants rather than nesting `Content`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    /// Plain text content.
    Text(String),
    /// Structured content blocks (tool use/result, etc.).
    Blocks(Vec<ContentBlock>),
}

/// A single block of structured content.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Plain text block.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
    },

    /// A tool use request from the model.
    #[serde(rename = "tool_use")]
    ToolUse {
        /// Unique identifier for this tool use.
        id: String,
        /// Name of the tool to invoke.
        name: String,
        /// Tool input parameters.
        input: serde_json::Value,
    },

    /// Result from a tool execution.
    #[serde(rename = "tool_result")]
    ToolResult {
        /// The tool_use id this result corresponds to.
        tool_use_id: String,
        /// The result content.
        content: String,
        /// Whether the tool execution errored.
        is_error: bool,
    },
}

impl Content {
    /// Create a text content value.
    pub fn text(s: impl Into<String>) -> Self {
        Content::Text(s.into())
    }

    /// Extract plain text content, ignoring non-text blocks.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(s) => Some(s),
            Content::Blocks(blocks) => blocks.iter().find_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }

    /// Strip `<think>...</think>` blocks from text content before it
    /// reaches a caller (spec §6, LLM interface contract).
    pub fn strip_thinking(&self) -> Content {
        match self {
            Content::Text(s) => Content::Text(strip_thinking_tags(s)),
            Content::Blocks(blocks) => Content::Blocks(
                blocks
                    .iter()
                    .map(|b| match b {
                        ContentBlock::Text { text } => ContentBlock::Text {
                            text: strip_thinking_tags(text),
                        },
                        other => other.clone(),
                    })
                    .collect(),
            ),
        }
    }
}

fn strip_thinking_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    loop {
        match rest.find("<think>") {
            Some(start) => {
                out.push_str(&rest[..start]);
                match rest[start..].find("</think>") {
                    Some(end_rel) => {
                        let end = start + end_rel + "</think>".len();
                        rest = &rest[end..];
                    }
                    None => {
                        // Unterminated block — drop the rest.
                        rest = "";
                        break;
                    }
                }
            }
            None => {
                out.push_str(rest);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_text_extracts_plain() {
        let c = Content::text("hello");
        assert_eq!(c.as_text(), Some("hello"));
    }

    #[test]
    fn as_text_extracts_first_block() {
        let c = Content::Blocks(vec![ContentBlock::Text {
            text: "hi".into(),
        }]);
        assert_eq!(c.as_text(), Some("hi"));
    }

    #[test]
    fn strips_single_think_block() {
        let c = Content::text("<think>secret reasoning</think>the answer is 4");
        assert_eq!(c.strip_thinking().as_text(), Some("the answer is 4"));
    }

    #[test]
    fn strips_multiple_think_blocks() {
        let c = Content::text("a<think>x</think>b<think>y</think>c");
        assert_eq!(c.strip_thinking().as_text(), Some("abc"));
    }

    #[test]
    fn leaves_text_without_think_unchanged() {
        let c = Content::text("no reasoning here");
        assert_eq!(c.strip_thinking().as_text(), Some("no reasoning here"));
    }

    #[test]
    fn unterminated_think_block_drops_rest() {
        let c = Content::text("before<think>dangling");
        assert_eq!(c.strip_thinking().as_text(), Some("before"));
    }
}
