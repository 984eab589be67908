//! Execution-layer errors (spec §7): the executor itself only surfaces
//! non-task-scoped failures — per-task outcomes live in [`crate::executor::TaskRecord`].

use cortex_core::error::{CancelledError, SecurityError};
use thiserror::Error;

/// Errors the [`crate::executor::Executor`] can raise outside of a
/// task's own [`cortex_tool::ToolResult`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExecError {
    /// The permission policy rejected the invocation before it ran.
    #[error(transparent)]
    Security(#[from] SecurityError),

    /// Cancellation was requested before the plan finished.
    #[error(transparent)]
    Cancelled(#[from] CancelledError),
}
