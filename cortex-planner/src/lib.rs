#![deny(missing_docs)]
//! # cortex-planner — task decomposition (spec §4.5, component C7)
//!
//! Converts a user prompt into a [`TaskPlan`]: a single conversation
//! task for anything simple, or an LLM-produced, dependency-annotated
//! task list for anything that needs tools, with a rule-based fallback
//! when the LLM's response can't be parsed.

pub mod classify;
pub mod error;
pub mod fallback;
pub mod planner;
pub mod repair;
pub mod types;

pub use classify::{classify, has_sequence_markers, has_tool_verbs};
pub use error::PlannerError;
pub use planner::Planner;
pub use types::{Complexity, Task, TaskKind, TaskPlan, MAX_TASKS_PER_PLAN};
