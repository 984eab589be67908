//! Observer/event interface. The orchestrator emits events at fixed
//! points (spec §4.8); observers are fire-and-forget and their failures
//! must never affect orchestration (spec §6).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The orchestration events named in spec §4.8.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    /// The planner has been invoked for this turn.
    PlanningStart,
    /// The planner produced a task plan.
    PlanningComplete,
    /// A task is about to dispatch a tool call.
    ToolExecute,
    /// A tool call has returned.
    ToolResult,
    /// The plan has finished executing (success or failure).
    ExecutionComplete,
    /// Token usage was recorded for this turn.
    TokenUsage,
    /// A memory layer was updated.
    MemoryUpdate,
    /// An unrecoverable orchestration error occurred.
    OrchestrationError,
}

/// A single event, carrying whatever payload is relevant to `kind`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Which kind of event this is.
    pub kind: EventKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    /// The session this event belongs to.
    pub session_id: String,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

impl Event {
    /// Create a new event with the given kind, session, and payload.
    pub fn new(
        kind: EventKind,
        session_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            timestamp_ms: now_ms(),
            session_id: session_id.into(),
            payload,
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// An observer of orchestration events. Implementations must not let a
/// slow or failing observer affect orchestration — `notify` errors are
/// logged by the dispatcher and otherwise ignored.
#[async_trait]
pub trait Observer: Send + Sync {
    /// Receive one event. Should return quickly; long-running work
    /// should be spawned off, not awaited inline.
    async fn notify(&self, event: &Event) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Fans a single event out to an ordered list of observers. Observer
/// errors are swallowed (best-effort delivery, per spec §6).
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<std::sync::Arc<dyn Observer>>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Register an observer.
    pub fn add(&mut self, observer: std::sync::Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Emit an event to every registered observer. Never returns an
    /// error — a failing observer is logged and skipped.
    pub async fn emit(&self, event: Event) {
        for observer in &self.observers {
            if let Err(err) = observer.notify(&event).await {
                tracing::warn!(error = %err, kind = ?event.kind, "observer failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingObserver(Arc<AtomicUsize>);

    #[async_trait]
    impl Observer for CountingObserver {
        async fn notify(
            &self,
            _event: &Event,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingObserver;

    #[async_trait]
    impl Observer for FailingObserver {
        async fn notify(
            &self,
            _event: &Event,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("boom".into())
        }
    }

    #[tokio::test]
    async fn emits_to_all_observers() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ObserverRegistry::new();
        registry.add(Arc::new(CountingObserver(counter.clone())));
        registry.add(Arc::new(CountingObserver(counter.clone())));

        registry
            .emit(Event::new(
                EventKind::PlanningStart,
                "sess-1",
                serde_json::json!({}),
            ))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_observer_does_not_stop_others() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = ObserverRegistry::new();
        registry.add(Arc::new(FailingObserver));
        registry.add(Arc::new(CountingObserver(counter.clone())));

        registry
            .emit(Event::new(
                EventKind::OrchestrationError,
                "sess-1",
                serde_json::json!({}),
            ))
            .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
