//! Shared types crossing the four memory layers and the manager
//! (spec §3 Turn, §4.4).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a [`Turn`] (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// A message from the user.
    User,
    /// A message from the assistant.
    Assistant,
    /// A system message.
    System,
}

/// A single `(role, content)` message in a session (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Who said it.
    pub role: TurnRole,
    /// What was said.
    pub content: String,
    /// When it was said.
    pub timestamp: DateTime<Utc>,
    /// Approximate token count, per `cortex_tokens::TokenBudget::count`.
    pub token_count: usize,
}

impl Turn {
    /// Build a turn, computing its token count from `content`.
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        let content = content.into();
        let token_count = cortex_tokens::TokenBudget::count(&content);
        Self {
            role,
            content,
            timestamp: Utc::now(),
            token_count,
        }
    }
}

/// The working-context fields the ephemeral layer formats alongside
/// recent turns (spec §4.4: "current file, focus file list, last
/// error, current diff").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkingContext {
    /// The file the user is currently focused on, if any.
    pub current_file: Option<String>,
    /// Files considered "in focus" for retrieval proximity scoring.
    pub focus_files: Vec<String>,
    /// The most recent tool/execution error, if any.
    pub last_error: Option<String>,
    /// A short git diff summary of uncommitted work, if any.
    pub current_diff: Option<String>,
}

/// Domain events the memory layers react to (spec §4.4: "accept domain
/// events (new turn, stored knowledge, git refresh)").
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum MemoryEvent {
    /// A new turn was appended to the conversation.
    TurnAppended(Turn),
    /// The working context changed (focus files, current diff, ...).
    WorkingContextChanged(WorkingContext),
    /// A knowledge entry was stored or updated; the knowledge layer
    /// should treat its next `gather` as needing a fresh read.
    KnowledgeChanged,
    /// The git history cache should be considered stale.
    GitRefreshRequested,
}

/// Inputs common to every layer's `gather` call.
#[derive(Debug, Clone)]
pub struct GatherRequest {
    /// The project being queried.
    pub project_id: cortex_core::ProjectId,
    /// The session this gather is for (ephemeral/git layers are
    /// session-scoped for caching purposes).
    pub session_id: cortex_core::SessionId,
    /// The user's query text, used to drive retrieval and git ranking.
    pub query: String,
}

/// What a layer hands back to the manager: formatted text plus the
/// token count it actually consumed.
#[derive(Debug, Clone, Default)]
pub struct LayerOutput {
    /// Formatted fragment, ready to be concatenated into the prompt.
    pub text: String,
    /// Tokens the fragment consumed, per `TokenBudget::count`.
    pub tokens_used: usize,
    /// Ids of chunks included in `text`, if this output came from the
    /// retrieval layer. Carried through to the Session Snapshot's
    /// `retrievalIds` field (spec §3); empty for the other three layers.
    pub chunk_ids: Vec<String>,
}

impl LayerOutput {
    /// An empty output, consuming zero tokens.
    pub fn empty() -> Self {
        Self::default()
    }
}
