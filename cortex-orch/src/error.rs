//! Orchestration-layer errors (spec §7): the fatal, turn-ending kinds
//! that don't already have a home in a lower-level crate.

use cortex_core::error::{AgentBusyError, BudgetError, LlmError, StorageError};
use thiserror::Error;

/// Errors from session startup, turn execution, or shutdown.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OrchError {
    /// Persistence failed — fatal, caller exits with code 1.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The project lock is already held — fatal, caller exits with code 1.
    #[error(transparent)]
    AgentBusy(#[from] AgentBusyError),

    /// Composing the prompt exceeded its budget and could not recover.
    #[error(transparent)]
    Budget(#[from] BudgetError),

    /// The planner's LLM call failed unrecoverably.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Memory Manager composition failed.
    #[error("memory error: {0}")]
    Memory(String),
}
