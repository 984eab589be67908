#![deny(missing_docs)]
//! # cortex-exec — execution and approval (spec §4.6–§4.7, components C8+C9)
//!
//! Runs a [`cortex_planner::TaskPlan`] to completion: dispatches tool
//! calls through a [`cortex_tool::ToolRegistry`], gates sensitive ones
//! through an [`ApprovalGate`] and a [`PermissionPolicy`], retries
//! transient failures, and respects task dependencies.

pub mod approval;
pub mod error;
pub mod executor;
pub mod permission;

pub use approval::{ApprovalGate, ApprovalMode, ApprovalPrompt, AutoDenyPrompt, GateDecision, UserDecision};
pub use error::ExecError;
pub use executor::{CancelHandle, ExecutionContext, ExecutionOutcome, Executor, TaskRecord, TaskStatus};
pub use permission::PermissionPolicy;
