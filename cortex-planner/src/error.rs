//! Planner errors.

use cortex_core::error::LlmError;
use thiserror::Error;

/// Errors from [`crate::planner::Planner::plan`]. Parse failures never
/// surface here — they fall through to the rule-based decomposition
/// (spec §4.5 step 4) — only the LLM call itself can fail outright.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The LLM call failed in a way retries couldn't recover from.
    #[error("planner llm call failed: {0}")]
    Llm(#[from] LlmError),
}
