//! Error type for the memory layers and manager.

use cortex_core::error::{BudgetError, EmbeddingError, GitError, StorageError};
use thiserror::Error;

/// Errors surfaced while gathering or updating a memory layer.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MemoryError {
    /// The underlying store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The embeddings client failed in a way retrieval can't route around.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The git context layer hit a non-recoverable error (not "not a
    /// repo", which is handled as an inert layer rather than an error).
    #[error(transparent)]
    Git(#[from] GitError),

    /// A section's budget was exhausted and the caller asked for a
    /// hard failure rather than silent trimming.
    #[error(transparent)]
    Budget(#[from] BudgetError),
}
