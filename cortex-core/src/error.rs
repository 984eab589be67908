//! Error taxonomy (spec §7). One enum per concern, each
//! `#[non_exhaustive]` with a catch-all `Other` variant.

use thiserror::Error;

/// Configuration errors. Fatal; callers exit with code 2.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration value was missing.
    #[error("missing config: {0}")]
    Missing(String),

    /// A configuration value failed validation.
    #[error("invalid config: {0}")]
    Invalid(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Persistence errors. Fatal on open/migrate failure; callers exit with code 1.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store could not be opened or migrated.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// A row was expected but not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization of a stored value failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The project-scoped advisory lock is held by another process.
#[derive(Debug, Error)]
#[error("project is busy: {0}")]
pub struct AgentBusyError(pub String);

/// Token Budget Manager errors (§4.1).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BudgetError {
    /// Adding text to a section would cross its target + reserved buffer.
    #[error("budget exceeded in section {section}: {used} + {requested} > {limit}")]
    Exceeded {
        /// Section name.
        section: String,
        /// Tokens already used in the section.
        used: usize,
        /// Tokens the caller attempted to add.
        requested: usize,
        /// The section's effective limit.
        limit: usize,
    },
}

/// LLM call errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network/timeout/5xx — retried per policy.
    #[error("transient llm error: {0}")]
    Transient(String),

    /// Non-JSON response when JSON was required.
    #[error("malformed llm response: {0}")]
    Malformed(String),

    /// 401/403 — fatal for the turn.
    #[error("llm authentication error: {0}")]
    Auth(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Tool dispatch errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed schema validation. Not retried.
    #[error("schema: {0}")]
    Schema(String),

    /// The tool itself is not registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The tool returned `success=false`. Retried per policy.
    #[error("tool failure in {tool}: {message}")]
    Failure {
        /// Name of the tool that failed.
        tool: String,
        /// Error message reported by the tool.
        message: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Approval gate errors.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The user denied the operation.
    #[error("denied")]
    Denied,

    /// The operation was cancelled before a decision was made.
    #[error("cancelled")]
    Cancelled,
}

/// Cancellation signal propagated through the executor.
#[derive(Debug, Error)]
#[error("cancelled")]
pub struct CancelledError;

/// Embedding service errors.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The configured embedding dimension does not match.
    #[error("dimension mismatch: {a} vs {b}")]
    DimensionMismatch {
        /// Dimension of the first vector.
        a: usize,
        /// Dimension of the second vector.
        b: usize,
    },

    /// The embedding service is unavailable after retries; caller should
    /// expect a pseudo-embedding was substituted.
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
}

/// Git context layer errors. Never fatal — the layer goes inert.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum GitError {
    /// The project root is not a git repository.
    #[error("not a git repository")]
    NotARepo,

    /// Parsing git history failed partway through.
    #[error("git parse error: {0}")]
    Parse(String),
}

/// Permission-policy violations (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational; logged but not blocking.
    Low,
    /// Should be reviewed.
    Medium,
    /// Blocks the operation outright.
    High,
}

/// A permission policy rejected an operation.
#[derive(Debug, Error)]
#[error("security violation ({severity:?}): {reason}")]
pub struct SecurityError {
    /// How severe the violation was judged to be.
    pub severity: Severity,
    /// Human-readable reason.
    pub reason: String,
}
