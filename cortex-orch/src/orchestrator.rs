//! The Orchestrator (spec §4.8, component C10): the per-turn state
//! machine binding the Memory Manager, Planner, and Executor together
//! and emitting the named event set through [`ObserverRegistry`].
//!
//! Grounded on `neuron-orch-local`'s dispatch loop, generalized from a
//! single dispatch-and-collect step to the full
//! `planning -> executing -> finalizing` turn spec §4.8 describes.

use std::path::PathBuf;
use std::sync::Arc;

use cortex_core::hook::{Event, EventKind, ObserverRegistry};
use cortex_core::{ProjectId, SessionId};
use cortex_exec::{ExecutionContext, Executor};
use cortex_memory::{GatherRequest, MemoryEvent, MemoryManager, Turn, TurnRole};
use cortex_planner::{Planner, TaskKind};
use cortex_tokens::{OperatingMode, TokenBudget, HARD_INPUT_CEILING};
use cortex_tool::ToolRegistry;
use tokio::sync::Mutex;

/// Outcome of one user turn (spec §4.8 step 7: `{success, response?,
/// toolsUsed[], error?}`).
#[derive(Debug, Clone, Default)]
pub struct TurnResult {
    /// Whether the turn completed without a fatal error.
    pub success: bool,
    /// Assistant-facing text, if the plan produced any.
    pub response: Option<String>,
    /// Names of tools invoked while executing the plan.
    pub tools_used: Vec<String>,
    /// A human-readable error, if `success` is false.
    pub error: Option<String>,
    /// Total tokens the composed prompt consumed, for the caller to
    /// hand to the Session Manager's turn accounting.
    pub total_tokens: usize,
    /// Per-section token usage, for the Session Manager's snapshot.
    pub section_usage: std::collections::HashMap<cortex_tokens::Section, usize>,
    /// Chunk ids folded into the composed prompt, for the Session
    /// Manager's snapshot.
    pub chunk_ids: Vec<String>,
}

/// Binds the Memory Manager, Planner, and Executor into the per-turn
/// state machine of spec §4.8:
/// `idle -> planning -> awaiting-approval? -> executing -> finalizing -> idle`.
///
/// The approval gate itself lives inside [`Executor`] (it gates
/// individual tool dispatches, not the whole turn) — the orchestrator's
/// role in that state is just to run the executor and observe its
/// events, per spec §4.7's description of the gate as per-tool-call.
pub struct Orchestrator {
    project_id: ProjectId,
    session_id: SessionId,
    mode: OperatingMode,
    memory: Arc<MemoryManager>,
    planner: Arc<Planner>,
    executor: Arc<Executor>,
    registry: Arc<ToolRegistry>,
    observers: Arc<ObserverRegistry>,
    working_dir: PathBuf,
}

impl Orchestrator {
    /// Wire together one turn's collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: ProjectId,
        session_id: SessionId,
        mode: OperatingMode,
        memory: Arc<MemoryManager>,
        planner: Arc<Planner>,
        executor: Arc<Executor>,
        registry: Arc<ToolRegistry>,
        observers: Arc<ObserverRegistry>,
        working_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_id,
            session_id,
            mode,
            memory,
            planner,
            executor,
            registry,
            observers,
            working_dir: working_dir.into(),
        }
    }

    /// Run one full turn for `prompt` (spec §4.8).
    pub async fn handle_turn(&self, prompt: &str) -> TurnResult {
        self.memory
            .update(&MemoryEvent::TurnAppended(Turn::new(TurnRole::User, prompt)));

        let request = GatherRequest {
            project_id: self.project_id.clone(),
            session_id: self.session_id.clone(),
            query: prompt.to_string(),
        };

        let composed = match self.memory.compose(&request, self.mode, &[]).await {
            Ok(c) => c,
            Err(e) => {
                self.emit(EventKind::OrchestrationError, serde_json::json!({"stage": "memory", "error": e.to_string()}))
                    .await;
                return TurnResult {
                    success: false,
                    error: Some(format!("memory composition failed: {e}")),
                    ..Default::default()
                };
            }
        };

        // Safety net for spec §8's "100,000-token prompt doesn't crash"
        // scenario: composition can exceed the hard ceiling when many
        // layers are simultaneously near-full, since each layer only
        // enforces its own target plus rollover slack.
        let prompt_text = if composed.total_tokens > HARD_INPUT_CEILING {
            tracing::warn!(tokens = composed.total_tokens, ceiling = HARD_INPUT_CEILING, "composed prompt exceeded the hard input ceiling, trimming");
            TokenBudget::trim_to_fit(&composed.text, HARD_INPUT_CEILING)
        } else {
            composed.text.clone()
        };

        self.emit(EventKind::PlanningStart, serde_json::json!({"prompt_tokens": composed.total_tokens}))
            .await;

        let tool_schemas: Vec<cortex_tool::ToolSchema> = self.registry.list().into_iter().cloned().collect();
        let plan = match self.planner.plan(&prompt_text, &tool_schemas).await {
            Ok(p) => p,
            Err(e) => {
                self.emit(EventKind::OrchestrationError, serde_json::json!({"stage": "planning", "error": e.to_string()}))
                    .await;
                return TurnResult {
                    success: false,
                    error: Some(format!("planning failed: {e}")),
                    total_tokens: composed.total_tokens,
                    section_usage: composed.section_usage.clone(),
                    chunk_ids: composed.chunk_ids.clone(),
                    ..Default::default()
                };
            }
        };

        self.emit(
            EventKind::PlanningComplete,
            serde_json::json!({"task_count": plan.tasks.len(), "parallelizable": plan.parallelizable}),
        )
        .await;

        let ctx = Mutex::new(ExecutionContext::new(self.working_dir.clone()));
        let outcome = self.executor.run_plan(&plan, &ctx, self.session_id.as_str()).await;

        let tools_used: Vec<String> = plan
            .tasks
            .iter()
            .filter_map(|t| match &t.kind {
                TaskKind::Tool { tool, .. } => Some(tool.clone()),
                TaskKind::Conversation { .. } => None,
            })
            .collect();

        let response = outcome.responses.last().cloned();
        if let Some(text) = &response {
            self.memory
                .update(&MemoryEvent::TurnAppended(Turn::new(TurnRole::Assistant, text.clone())));
        }

        self.emit(
            EventKind::ExecutionComplete,
            serde_json::json!({"success": outcome.success, "task_count": outcome.records.len()}),
        )
        .await;
        self.emit(EventKind::TokenUsage, serde_json::json!({"total_tokens": composed.total_tokens})).await;
        self.emit(EventKind::MemoryUpdate, serde_json::json!({})).await;

        let error = if outcome.success {
            None
        } else {
            outcome.records.iter().find_map(|r| r.error.clone())
        };

        TurnResult {
            success: outcome.success,
            response,
            tools_used,
            error,
            total_tokens: composed.total_tokens,
            section_usage: composed.section_usage,
            chunk_ids: composed.chunk_ids,
        }
    }

    async fn emit(&self, kind: EventKind, payload: serde_json::Value) {
        self.observers.emit(Event::new(kind, self.session_id.as_str(), payload)).await;
    }
}
