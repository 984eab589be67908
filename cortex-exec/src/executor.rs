//! Task execution (spec §4.6, component C8): dependency-ordered,
//! bounded-round dispatch through the Tool Registry, Approval Gate, and
//! Permission Policy, with per-operation timeouts, retries, and a
//! stop-on-failure plan policy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cortex_core::hook::{Event, EventKind, ObserverRegistry};
use cortex_planner::{Task, TaskKind, TaskPlan};
use cortex_tool::{Sensitivity, ToolRegistry, ToolResult};
use tokio::sync::Mutex;

use crate::approval::{ApprovalGate, ApprovalPrompt, GateDecision, UserDecision};
use crate::permission::PermissionPolicy;

/// How many dependency-ready tasks are considered per scheduling round
/// (spec §4.6 describes either "in order" or "in parallel"; a dependency
/// chain naturally serializes into rounds of one). Tasks within a round
/// are still awaited one at a time rather than truly concurrently, so
/// that the stop-on-failure policy can see an earlier sibling's failure
/// before a later one is dispatched (spec §8 scenario 4).
const MAX_CONCURRENT_TASKS: usize = 3;

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(10);

/// A cooperative cancellation signal shared across every in-flight task.
#[derive(Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    /// A fresh, not-yet-cancelled handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How a task's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Completed successfully.
    Completed,
    /// Failed after exhausting retries, or failed a non-retryable error.
    Failed,
    /// Skipped because a dependency failed or was cancelled, or because
    /// the user denied approval, or because cancellation was requested.
    Cancelled,
}

/// The outcome of running one task.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Which task this record is for.
    pub task_id: String,
    /// How it ended.
    pub status: TaskStatus,
    /// Output text, if any.
    pub output: Option<String>,
    /// Error message, if it failed or was denied/cancelled.
    pub error: Option<String>,
}

/// Mutable state threaded through a plan's execution: working directory,
/// files the plan has created, and the running history of task outcomes
/// (spec §4.6: "ExecutionContext carrying working directory,
/// created-files list, task history, and a cancellation handle").
pub struct ExecutionContext {
    /// Directory tool invocations are relative to.
    pub working_dir: std::path::PathBuf,
    /// Files written or edited so far in this plan.
    pub created_files: Vec<String>,
    /// Completed task records, in completion order.
    pub task_history: Vec<TaskRecord>,
    /// Shared cancellation signal.
    pub cancel: CancelHandle,
}

impl ExecutionContext {
    /// A fresh context rooted at `working_dir`.
    pub fn new(working_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            created_files: Vec::new(),
            task_history: Vec::new(),
            cancel: CancelHandle::new(),
        }
    }
}

/// The result of running a whole plan.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Every task's final record, in dependency-respecting completion order.
    pub records: Vec<TaskRecord>,
    /// Whether every task completed (no failures, no denials, no cancellations).
    pub success: bool,
    /// Assistant-facing text accumulated from conversation tasks.
    pub responses: Vec<String>,
}

/// Runs a [`TaskPlan`] against a [`ToolRegistry`], gated by an
/// [`ApprovalGate`] and a [`PermissionPolicy`].
pub struct Executor {
    registry: Arc<ToolRegistry>,
    gate: ApprovalGate,
    policy: PermissionPolicy,
    prompt: Arc<dyn ApprovalPrompt>,
    observers: Arc<ObserverRegistry>,
}

impl Executor {
    /// Build an executor from its collaborators.
    pub fn new(
        registry: Arc<ToolRegistry>,
        gate: ApprovalGate,
        policy: PermissionPolicy,
        prompt: Arc<dyn ApprovalPrompt>,
        observers: Arc<ObserverRegistry>,
    ) -> Self {
        Self {
            registry,
            gate,
            policy,
            prompt,
            observers,
        }
    }

    /// Run every task in `plan`, respecting dependencies, in rounds of up
    /// to [`MAX_CONCURRENT_TASKS`] ready tasks. The first task failure or
    /// denial anywhere in a round cancels every task still pending in
    /// that round and every task in later rounds (stop-on-failure is the
    /// plan's default policy, spec §4.6). Detects dependency cycles
    /// before running anything (spec §8: "Plan with circular dependency
    /// ... Executor detects and fails with clear error before any tool
    /// runs").
    pub async fn run_plan(&self, plan: &TaskPlan, ctx: &Mutex<ExecutionContext>, session_id: &str) -> ExecutionOutcome {
        if let Some(cycle) = detect_cycle(&plan.tasks) {
            let record = TaskRecord {
                task_id: cycle,
                status: TaskStatus::Failed,
                output: None,
                error: Some("circular dependency detected".into()),
            };
            return ExecutionOutcome {
                records: vec![record],
                success: false,
                responses: Vec::new(),
            };
        }

        let mut statuses: HashMap<String, TaskStatus> = HashMap::new();
        let mut records = Vec::with_capacity(plan.tasks.len());
        let mut responses = Vec::new();
        let mut remaining: Vec<&Task> = plan.tasks.iter().collect();

        while !remaining.is_empty() {
            let ready_idx: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, t)| t.dependencies.iter().all(|d| statuses.contains_key(d.as_str())))
                .map(|(i, _)| i)
                .take(MAX_CONCURRENT_TASKS)
                .collect();

            if ready_idx.is_empty() {
                // Dependencies reference tasks outside the plan; treat
                // everything left as cancelled rather than loop forever.
                for task in &remaining {
                    statuses.insert(task.id.as_str().to_string(), TaskStatus::Cancelled);
                    records.push(TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Cancelled,
                        output: None,
                        error: Some("unresolvable dependency".into()),
                    });
                }
                break;
            }

            // Stop-on-failure is the default plan policy (spec §4.6: "if
            // task failed and plan policy is stop-on-failure: break outer
            // loop"), and a denial must stop every sibling task, not just
            // ones in later rounds (spec §8 scenario 4: an unrelated,
            // dependency-free task scheduled in the same round as a denied
            // one must still not run). So the ready set is awaited one at
            // a time rather than joined concurrently: as soon as one fails,
            // the rest of the batch is cancelled instead of dispatched.
            let mut batch_records = Vec::with_capacity(ready_idx.len());
            let mut batch_failed = false;
            for &i in &ready_idx {
                let task = remaining[i];
                let blocked_by_dependency = task.dependencies.iter().any(|d| {
                    matches!(statuses.get(d.as_str()), Some(TaskStatus::Failed) | Some(TaskStatus::Cancelled))
                });
                let record = if ctx.lock().await.cancel.is_cancelled() {
                    TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Cancelled,
                        output: None,
                        error: Some("cancelled".into()),
                    }
                } else if blocked_by_dependency {
                    TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Cancelled,
                        output: None,
                        error: Some("a dependency failed or was cancelled".into()),
                    }
                } else if batch_failed {
                    TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Cancelled,
                        output: None,
                        error: Some("plan stopped after a sibling task failed".into()),
                    }
                } else {
                    self.run_one(task, ctx, session_id).await
                };
                if record.status == TaskStatus::Failed {
                    batch_failed = true;
                }
                batch_records.push(record);
            }

            for (record, &i) in batch_records.iter().zip(ready_idx.iter()) {
                let task = remaining[i];
                if let TaskKind::Conversation { text } = &task.kind {
                    if record.status == TaskStatus::Completed {
                        responses.push(text.clone());
                    }
                }
            }

            for record in batch_records {
                statuses.insert(record.task_id.clone(), record.status);
                records.push(record);
            }

            // Remove the indices we just scheduled, highest first so
            // earlier indices stay valid during removal.
            let mut sorted = ready_idx;
            sorted.sort_unstable_by(|a, b| b.cmp(a));
            for i in sorted {
                remaining.remove(i);
            }

            // A failure anywhere in this round also stops every
            // not-yet-started task in later rounds (spec §4.6 stop-on-failure).
            if batch_failed {
                for task in &remaining {
                    statuses.insert(task.id.as_str().to_string(), TaskStatus::Cancelled);
                    records.push(TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Cancelled,
                        output: None,
                        error: Some("plan stopped after a sibling task failed".into()),
                    });
                }
                break;
            }
        }

        let success = records.iter().all(|r| r.status == TaskStatus::Completed);
        ctx.lock().await.task_history.extend(records.clone());
        ExecutionOutcome {
            records,
            success,
            responses,
        }
    }

    async fn run_one(&self, task: &Task, ctx: &Mutex<ExecutionContext>, session_id: &str) -> TaskRecord {
        let TaskKind::Tool { tool, args } = &task.kind else {
            return TaskRecord {
                task_id: task.id.as_str().to_string(),
                status: TaskStatus::Completed,
                output: None,
                error: None,
            };
        };

        let default_sensitivity = self
            .registry
            .get(tool)
            .map(|t| t.schema().category)
            .unwrap_or(Sensitivity::High);
        let sensitivity = self.gate.classify(tool, default_sensitivity);

        if let Err(violation) = self.policy.check(tool, args, sensitivity) {
            tracing::warn!(tool, reason = %violation.reason, "permission policy blocked task");
            return TaskRecord {
                task_id: task.id.as_str().to_string(),
                status: TaskStatus::Failed,
                output: None,
                error: Some(format!("security violation: {}", violation.reason)),
            };
        }

        match self.gate.decide(tool, sensitivity).await {
            GateDecision::Deny => {
                return TaskRecord {
                    task_id: task.id.as_str().to_string(),
                    status: TaskStatus::Failed,
                    output: None,
                    error: Some("denied".into()),
                };
            }
            GateDecision::Prompt => {
                let decision = self.prompt.ask(tool, args, sensitivity).await;
                if decision.should_remember() {
                    self.gate.remember(tool, sensitivity, decision.approved()).await;
                }
                if !decision.approved() {
                    return TaskRecord {
                        task_id: task.id.as_str().to_string(),
                        status: TaskStatus::Failed,
                        output: None,
                        error: Some("denied".into()),
                    };
                }
            }
            GateDecision::Allow => {}
        }

        self.observers
            .emit(Event::new(
                EventKind::ToolExecute,
                session_id,
                serde_json::json!({"tool": tool, "task_id": task.id.as_str()}),
            ))
            .await;

        let timeout = timeout_for(tool);
        let mut result = ToolResult::err("not attempted");
        for attempt in 1..=MAX_ATTEMPTS {
            if ctx.lock().await.cancel.is_cancelled() {
                result = ToolResult::err("cancelled");
                break;
            }
            result = match tokio::time::timeout(timeout, self.registry.execute(tool, args.clone())).await {
                Ok(r) => r,
                Err(_) => ToolResult::err(format!("timed out after {timeout:?}")),
            };
            if result.success || !is_retryable(&result) || attempt == MAX_ATTEMPTS {
                break;
            }
            tokio::time::sleep(backoff(attempt)).await;
        }

        self.observers
            .emit(Event::new(
                EventKind::ToolResult,
                session_id,
                serde_json::json!({"tool": tool, "task_id": task.id.as_str(), "success": result.success}),
            ))
            .await;

        if result.success {
            if matches!(tool.as_str(), "write_file" | "edit") {
                if let Some(path) = args.get("path").and_then(|v| v.as_str()) {
                    ctx.lock().await.created_files.push(path.to_string());
                }
            }
            TaskRecord {
                task_id: task.id.as_str().to_string(),
                status: TaskStatus::Completed,
                output: result.output,
                error: None,
            }
        } else {
            TaskRecord {
                task_id: task.id.as_str().to_string(),
                status: TaskStatus::Failed,
                output: None,
                error: result.error,
            }
        }
    }
}

fn is_retryable(result: &ToolResult) -> bool {
    match &result.error {
        None => false,
        Some(message) => {
            let lower = message.to_lowercase();
            !(lower.starts_with("schema:") || lower.contains("401") || lower.contains("403"))
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let scaled = BACKOFF_BASE.saturating_mul(1 << (attempt.saturating_sub(1)));
    scaled.min(BACKOFF_CAP)
}

fn timeout_for(tool: &str) -> Duration {
    match tool {
        "read_file" => Duration::from_secs(5),
        "write_file" | "edit" => Duration::from_secs(10),
        "bash" | "git" => Duration::from_secs(30),
        "web" => Duration::from_secs(15),
        _ => Duration::from_secs(30),
    }
}

fn detect_cycle(tasks: &[Task]) -> Option<String> {
    use std::collections::HashSet;

    let mut visiting = HashSet::new();
    let mut visited = HashSet::new();

    fn visit<'a>(
        id: &'a str,
        tasks: &'a [Task],
        visiting: &mut HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) -> Option<String> {
        if visited.contains(id) {
            return None;
        }
        if !visiting.insert(id) {
            return Some(id.to_string());
        }
        if let Some(task) = tasks.iter().find(|t| t.id.as_str() == id) {
            for dep in &task.dependencies {
                if let Some(cycle) = visit(dep.as_str(), tasks, visiting, visited) {
                    return Some(cycle);
                }
            }
        }
        visiting.remove(id);
        visited.insert(id);
        None
    }

    for task in tasks {
        if let Some(cycle) = visit(task.id.as_str(), tasks, &mut visiting, &mut visited) {
            return Some(cycle);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalMode, AutoDenyPrompt};
    use async_trait::async_trait;
    use cortex_core::state::{Scope, StateError, StateStore};
    use cortex_core::TaskId;
    use cortex_planner::Complexity;
    use cortex_tool::builtin::canonical_registry;
    use std::collections::HashMap;
    use tokio::sync::RwLock as TokioRwLock;

    #[derive(Default)]
    struct MemoryStoreStub {
        data: TokioRwLock<HashMap<(Scope, String), serde_json::Value>>,
    }

    #[async_trait]
    impl StateStore for MemoryStoreStub {
        async fn read(&self, scope: &Scope, key: &str) -> Result<Option<serde_json::Value>, StateError> {
            Ok(self.data.read().await.get(&(scope.clone(), key.to_string())).cloned())
        }

        async fn write(&self, scope: &Scope, key: &str, value: serde_json::Value) -> Result<(), StateError> {
            self.data.write().await.insert((scope.clone(), key.to_string()), value);
            Ok(())
        }

        async fn delete(&self, scope: &Scope, key: &str) -> Result<(), StateError> {
            self.data.write().await.remove(&(scope.clone(), key.to_string()));
            Ok(())
        }

        async fn list(&self, scope: &Scope, prefix: &str) -> Result<Vec<String>, StateError> {
            Ok(self
                .data
                .read()
                .await
                .keys()
                .filter(|(s, k)| s == scope && k.starts_with(prefix))
                .map(|(_, k)| k.clone())
                .collect())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStoreStub::default());
        Arc::new(canonical_registry(store))
    }

    fn executor(mode: ApprovalMode) -> Executor {
        Executor::new(
            registry(),
            ApprovalGate::new(mode),
            PermissionPolicy::default(),
            Arc::new(AutoDenyPrompt),
            Arc::new(ObserverRegistry::new()),
        )
    }

    #[tokio::test]
    async fn conversation_task_succeeds_without_a_tool() {
        let exec = executor(ApprovalMode::Yolo);
        let task = Task::conversation(TaskId::new("t1"), "reply", "hello");
        let plan = TaskPlan::new("test", Complexity::Simple, vec![task]);
        let dir = tempfile::tempdir().unwrap();
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(outcome.success);
        assert_eq!(outcome.responses, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn yolo_mode_runs_a_write_tool_without_prompting() {
        let exec = executor(ApprovalMode::Yolo);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let task = Task::tool(
            TaskId::new("t1"),
            "write a file",
            "write_file",
            serde_json::json!({"path": path.to_str().unwrap(), "content": "hi"}),
        );
        let plan = TaskPlan::new("test", Complexity::Simple, vec![task]);
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(outcome.success);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hi");
    }

    #[tokio::test]
    async fn default_mode_denies_without_a_prompt_implementation() {
        let exec = executor(ApprovalMode::Default);
        let dir = tempfile::tempdir().unwrap();
        let task = Task::tool(
            TaskId::new("t1"),
            "run a command",
            "bash",
            serde_json::json!({"command": "echo hi"}),
        );
        let plan = TaskPlan::new("test", Complexity::Simple, vec![task]);
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(!outcome.success);
        assert_eq!(outcome.records[0].status, TaskStatus::Failed);
        assert_eq!(outcome.records[0].error.as_deref(), Some("denied"));
    }

    #[tokio::test]
    async fn a_failed_dependency_cancels_its_dependents() {
        let exec = executor(ApprovalMode::Default);
        let dir = tempfile::tempdir().unwrap();
        let first = Task::tool(
            TaskId::new("t1"),
            "run a command",
            "bash",
            serde_json::json!({"command": "echo hi"}),
        );
        let mut second = Task::tool(
            TaskId::new("t2"),
            "write after",
            "write_file",
            serde_json::json!({"path": dir.path().join("done.txt").to_str().unwrap(), "content": "x"}),
        );
        second.dependencies.push(TaskId::new("t1"));
        let plan = TaskPlan::new("test", Complexity::Moderate, vec![first, second]);
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(!outcome.success);
        assert_eq!(outcome.records[1].status, TaskStatus::Cancelled);
        assert!(!dir.path().join("done.txt").exists());
    }

    #[tokio::test]
    async fn a_denied_task_stops_independent_siblings_in_the_same_round() {
        // spec §8 scenario 4: "rm -rf /tmp/x" then "create done.txt" with
        // no back-reference between the two clauses, so the planner's
        // fallback decomposition emits them with no dependency edge
        // between them. The denial of the first must still stop the
        // second from running.
        let exec = executor(ApprovalMode::Default);
        let dir = tempfile::tempdir().unwrap();
        let dangerous = Task::tool(
            TaskId::new("t1"),
            "run a dangerous command",
            "bash",
            serde_json::json!({"command": "rm -rf /tmp/x"}),
        );
        let independent = Task::tool(
            TaskId::new("t2"),
            "create done.txt",
            "write_file",
            serde_json::json!({"path": dir.path().join("done.txt").to_str().unwrap(), "content": "done"}),
        );
        let plan = TaskPlan::new("test", Complexity::Moderate, vec![dangerous, independent]);
        assert!(plan.parallelizable);
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(!outcome.success);
        assert_eq!(outcome.records[0].status, TaskStatus::Failed);
        assert_eq!(outcome.records[1].status, TaskStatus::Cancelled);
        assert!(!dir.path().join("done.txt").exists());
    }

    #[tokio::test]
    async fn circular_dependency_is_detected_before_anything_runs() {
        let exec = executor(ApprovalMode::Yolo);
        let dir = tempfile::tempdir().unwrap();
        let mut a = Task::tool(TaskId::new("a"), "a", "bash", serde_json::json!({"command": "true"}));
        a.dependencies.push(TaskId::new("b"));
        let mut b = Task::tool(TaskId::new("b"), "b", "bash", serde_json::json!({"command": "true"}));
        b.dependencies.push(TaskId::new("a"));
        let plan = TaskPlan::new("test", Complexity::Moderate, vec![a, b]);
        let ctx = Mutex::new(ExecutionContext::new(dir.path()));
        let outcome = exec.run_plan(&plan, &ctx, "sess").await;
        assert!(!outcome.success);
        assert!(outcome.records[0].error.as_deref().unwrap().contains("circular"));
    }

    #[test]
    fn backoff_caps_at_ten_seconds() {
        assert_eq!(backoff(1), Duration::from_secs(1));
        assert_eq!(backoff(2), Duration::from_secs(2));
        assert_eq!(backoff(4), Duration::from_secs(8));
        assert_eq!(backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn auth_errors_are_not_retryable() {
        assert!(!is_retryable(&ToolResult::err("401 unauthorized")));
        assert!(!is_retryable(&ToolResult::err("schema: missing field")));
        assert!(is_retryable(&ToolResult::err("connection reset")));
    }
}
