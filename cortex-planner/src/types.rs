//! Plan and task shapes (spec §4.5, component C7).

use cortex_core::TaskId;
use serde::{Deserialize, Serialize};

/// How complex a prompt looks, heuristically (spec §4.5 step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Short, no sequencing, no tool verbs — likely pure conversation.
    Simple,
    /// A single identifiable action, or a short prompt with a tool verb.
    Moderate,
    /// Multiple steps, sequencing language, or a long prompt.
    Complex,
}

/// What a task actually does once scheduled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    /// Emit `text` as the assistant's response; no tool is invoked.
    Conversation {
        /// The text to emit.
        text: String,
    },
    /// Invoke `tool` with `args` through the Tool Registry.
    Tool {
        /// Registered tool name.
        tool: String,
        /// Arguments, validated against the tool's schema at execution time.
        args: serde_json::Value,
    },
}

/// One step of a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within the plan.
    pub id: TaskId,
    /// Human-readable description, used for dependency inference and logs.
    pub description: String,
    /// What the task does.
    pub kind: TaskKind,
    /// Tasks that must complete before this one may start.
    pub dependencies: Vec<TaskId>,
}

impl Task {
    /// A conversation task carrying `text` verbatim.
    pub fn conversation(id: TaskId, description: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            kind: TaskKind::Conversation { text: text.into() },
            dependencies: Vec::new(),
        }
    }

    /// A tool-invoking task.
    pub fn tool(
        id: TaskId,
        description: impl Into<String>,
        tool: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            kind: TaskKind::Tool {
                tool: tool.into(),
                args,
            },
            dependencies: Vec::new(),
        }
    }
}

/// The Planner's output: an ordered, dependency-annotated task list plus
/// the metadata spec §3's Data Model names for a Task Plan ("ordered
/// collection of tasks plus metadata: original prompt, complexity,
/// parallelizable flag").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    /// The user prompt this plan was produced from.
    pub original_prompt: String,
    /// Heuristic complexity classification (spec §4.5 step 1).
    pub complexity: Complexity,
    /// Tasks in planning order.
    pub tasks: Vec<Task>,
    /// Whether every task has no dependencies, so the Executor may run
    /// them with its bounded worker pool instead of strictly in order.
    pub parallelizable: bool,
}

impl TaskPlan {
    /// Build a plan from tasks, computing `parallelizable` from their
    /// dependency lists.
    pub fn new(original_prompt: impl Into<String>, complexity: Complexity, tasks: Vec<Task>) -> Self {
        let parallelizable = tasks.iter().all(|t| t.dependencies.is_empty());
        Self {
            original_prompt: original_prompt.into(),
            complexity,
            tasks,
            parallelizable,
        }
    }
}

/// Maximum tasks per plan (spec §4.5: "planner budgets at most 8 tasks
/// per plan; additional operations are merged or deferred").
pub const MAX_TASKS_PER_PLAN: usize = 8;
