//! The Planner (spec §4.5, component C7): classify, then either produce
//! a one-task conversation plan directly or ask the LLM for a
//! JSON-constrained plan, repairing or falling back to rule-based
//! decomposition if that fails.

use std::sync::Arc;

use cortex_core::TaskId;
use cortex_provider::{Provider, ProviderMessage, ProviderRequest, Role};
use cortex_tokens::OperatingMode;
use serde::Deserialize;

use crate::classify::{classify, has_tool_verbs};
use crate::error::PlannerError;
use crate::fallback;
use crate::repair::repair;
use crate::types::{Complexity, Task, TaskPlan, MAX_TASKS_PER_PLAN};

const SYSTEM_PROMPT: &str = "You are the planning stage of a coding assistant. \
Given the user's request and the available tools, respond with exactly one \
JSON object and nothing else: either {\"type\":\"conversation\",\"response\":\"...\"} \
if no tool is needed, or {\"type\":\"tasks\",\"tasks\":[{\"description\":\"...\",\
\"type\":\"<tool name>\",\"tools\":[\"<tool name>\"],\"action\":\"...\",\
\"filename\":\"...\",\"content\":\"...\"}, ...]} otherwise. filename and content \
are only present for file tools.";

/// Raw shape of a task as the LLM emits it (spec §4.5 step 3).
#[derive(Debug, Deserialize)]
struct RawTask {
    description: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawPlannerResponse {
    Conversation { response: String },
    Tasks { tasks: Vec<RawTask> },
}

/// Converts a prompt into a [`TaskPlan`].
pub struct Planner {
    provider: Arc<dyn Provider>,
}

impl Planner {
    /// Build a planner backed by `provider`.
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Produce a plan for `prompt`, given the tools currently registered.
    pub async fn plan(
        &self,
        prompt: &str,
        tools: &[cortex_tool::ToolSchema],
    ) -> Result<TaskPlan, PlannerError> {
        let complexity = classify(prompt);
        if complexity == Complexity::Simple && !has_tool_verbs(prompt) {
            let task = Task::conversation(TaskId::new("t1"), prompt, prompt);
            return Ok(finalize(prompt, complexity, vec![task]));
        }

        let tool_schemas: Vec<cortex_provider::ToolSchema> = tools
            .iter()
            .map(|t| cortex_provider::ToolSchema {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.to_json_schema(),
            })
            .collect();

        let request = ProviderRequest::new(
            SYSTEM_PROMPT,
            vec![ProviderMessage::text(Role::User, prompt)],
        )
        .with_tools(tool_schemas);
        let mut request = request;
        request.max_tokens = Some(OperatingMode::Deep.caps().output_cap as u32);

        let response = self.provider.complete(request).await?;
        let raw_text = response.content.as_text().unwrap_or_default();

        let tasks = match parse_or_repair(raw_text) {
            Some(RawPlannerResponse::Conversation { response }) => {
                vec![Task::conversation(TaskId::new("t1"), prompt, response)]
            }
            Some(RawPlannerResponse::Tasks { tasks }) => raw_tasks_to_tasks(tasks),
            None => {
                tracing::warn!("planner response unparseable even after repair, falling back to rule-based decomposition");
                fallback::decompose(prompt)
            }
        };

        Ok(finalize(prompt, complexity, tasks))
    }
}

fn parse_or_repair(raw_text: &str) -> Option<RawPlannerResponse> {
    if let Ok(parsed) = serde_json::from_str(raw_text) {
        return Some(parsed);
    }
    serde_json::from_str(&repair(raw_text)).ok()
}

fn raw_tasks_to_tasks(raw: Vec<RawTask>) -> Vec<Task> {
    let mut previous_id: Option<TaskId> = None;
    let mut tasks = Vec::with_capacity(raw.len());
    for (i, raw_task) in raw.into_iter().enumerate() {
        let id = TaskId::new(format!("t{}", i + 1));
        let mut task = if raw_task.kind == "conversation" {
            Task::conversation(id.clone(), raw_task.description.clone(), raw_task.action.clone())
        } else {
            let args = build_tool_args(&raw_task);
            Task::tool(id.clone(), raw_task.description.clone(), raw_task.kind.clone(), args)
        };
        if has_back_reference(&raw_task.description) {
            if let Some(prev) = &previous_id {
                task.dependencies.push(prev.clone());
            }
        }
        previous_id = Some(id);
        tasks.push(task);
    }
    tasks
}

fn has_back_reference(description: &str) -> bool {
    let lower = description.to_lowercase();
    [" it ", " it.", " it,", "that", "the file"]
        .iter()
        .any(|marker| lower.contains(marker))
        || lower.ends_with(" it")
}

fn build_tool_args(raw: &RawTask) -> serde_json::Value {
    match raw.kind.as_str() {
        "write_file" => serde_json::json!({
            "path": raw.filename.clone().unwrap_or_default(),
            "content": raw.content.clone().unwrap_or_default(),
        }),
        "read_file" | "ls" => serde_json::json!({
            "path": raw.filename.clone().unwrap_or_else(|| raw.action.clone()),
        }),
        "edit" => serde_json::json!({
            "path": raw.filename.clone().unwrap_or_default(),
            "old_string": raw.action.clone(),
            "new_string": raw.content.clone().unwrap_or_default(),
        }),
        "bash" => serde_json::json!({"command": raw.action}),
        "grep" => serde_json::json!({
            "pattern": raw.action,
            "path": raw.filename.clone().unwrap_or_else(|| ".".to_string()),
        }),
        "web" => serde_json::json!({"url": raw.action}),
        "git" => serde_json::json!({"args": raw.action.split_whitespace().collect::<Vec<_>>()}),
        "memory" => serde_json::json!({"operation": raw.action}),
        _ => serde_json::json!({"action": raw.action}),
    }
}

/// Cap at [`MAX_TASKS_PER_PLAN`] (logging what's dropped) and compute
/// `parallelizable`.
fn finalize(prompt: &str, complexity: Complexity, mut tasks: Vec<Task>) -> TaskPlan {
    if tasks.len() > MAX_TASKS_PER_PLAN {
        tracing::warn!(
            dropped = tasks.len() - MAX_TASKS_PER_PLAN,
            "plan exceeded the task cap, dropping trailing tasks"
        );
        tasks.truncate(MAX_TASKS_PER_PLAN);
    }
    TaskPlan::new(prompt, complexity, tasks)
}
