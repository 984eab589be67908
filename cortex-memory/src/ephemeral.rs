//! Ephemeral layer — the short, session-scoped conversation buffer
//! (spec §4.4).
//!
//! Grounded on `neuron-context/src/strategies.rs`'s `SlidingWindowStrategy`
//! (bounded recent-message window, token-threshold trigger), generalized
//! from "drop whole messages" to the spec's own drop policy: oldest
//! turns first, but never below the last two.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cortex_tokens::TokenBudget;

use crate::types::{GatherRequest, LayerOutput, MemoryEvent, Turn, WorkingContext};

/// TTL for the supplementary lookup cache (spec §4.4: "15 min").
const LRU_TTL: Duration = Duration::from_secs(15 * 60);

struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
}

/// A small TTL-bounded lookup cache for transient values the ephemeral
/// layer wants to remember between turns without putting them in the
/// prompt (spec §4.4: "not part of the prompt").
#[derive(Default)]
struct TtlCache {
    entries: HashMap<String, CacheEntry>,
}

impl TtlCache {
    fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        self.evict_expired();
        self.entries.get(key).map(|e| e.value.clone())
    }

    fn put(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    fn evict_expired(&mut self) {
        let now = Instant::now();
        self.entries
            .retain(|_, e| now.duration_since(e.inserted_at) < LRU_TTL);
    }
}

/// The ring of recent turns plus the current working context.
pub struct EphemeralLayer {
    inner: Mutex<Inner>,
}

struct Inner {
    turns: Vec<Turn>,
    working: WorkingContext,
    cache: TtlCache,
}

impl EphemeralLayer {
    /// Construct an empty layer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                turns: Vec::new(),
                working: WorkingContext::default(),
                cache: TtlCache::default(),
            }),
        }
    }

    /// Apply a domain event (spec §4.4 `update`).
    pub fn update(&self, event: &MemoryEvent) {
        let mut inner = self.inner.lock().expect("ephemeral layer lock poisoned");
        match event {
            MemoryEvent::TurnAppended(turn) => inner.turns.push(turn.clone()),
            MemoryEvent::WorkingContextChanged(ctx) => inner.working = ctx.clone(),
            _ => {}
        }
    }

    /// Remember a transient value outside the prompt (not surfaced by
    /// `gather`), honoring the 15-minute TTL.
    pub fn remember(&self, key: impl Into<String>, value: serde_json::Value) {
        let mut inner = self.inner.lock().expect("ephemeral layer lock poisoned");
        inner.cache.put(key, value);
    }

    /// Recall a transient value if it hasn't expired.
    pub fn recall(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.inner.lock().expect("ephemeral layer lock poisoned");
        inner.cache.get(key)
    }

    /// All turns currently held, oldest first. Used by `SessionManager`
    /// to build a snapshot.
    pub fn turns(&self) -> Vec<Turn> {
        self.inner
            .lock()
            .expect("ephemeral layer lock poisoned")
            .turns
            .clone()
    }

    /// The current working context, for callers (the session manager)
    /// building a snapshot.
    pub fn working_context(&self) -> WorkingContext {
        self.inner
            .lock()
            .expect("ephemeral layer lock poisoned")
            .working
            .clone()
    }

    /// Replace the held turns wholesale, e.g. when restoring from a
    /// session snapshot.
    pub fn restore(&self, turns: Vec<Turn>, working: WorkingContext) {
        let mut inner = self.inner.lock().expect("ephemeral layer lock poisoned");
        inner.turns = turns;
        inner.working = working;
    }

    /// Format the buffer within `budget_tokens`, newest-first selection
    /// but oldest-first emission (spec §4.4): drop the oldest turns
    /// until the formatted text fits, but never drop below the last two
    /// turns even if that leaves the section over budget.
    pub fn gather(&self, _request: &GatherRequest, budget_tokens: usize) -> LayerOutput {
        let inner = self.inner.lock().expect("ephemeral layer lock poisoned");
        if inner.turns.is_empty() && inner.working == WorkingContext::default() {
            return LayerOutput::empty();
        }

        let mut kept: Vec<&Turn> = inner.turns.iter().collect();
        loop {
            let text = format_turns(&kept, &inner.working);
            let tokens = TokenBudget::count(&text);
            if tokens <= budget_tokens || kept.len() <= 2 {
                return LayerOutput {
                    text,
                    tokens_used: tokens,
                    chunk_ids: Vec::new(),
                };
            }
            kept.remove(0);
        }
    }
}

impl Default for EphemeralLayer {
    fn default() -> Self {
        Self::new()
    }
}

fn format_turns(turns: &[&Turn], working: &WorkingContext) -> String {
    let mut out = String::new();
    if !turns.is_empty() {
        out.push_str("## Conversation\n\n");
        for turn in turns {
            let role = match turn.role {
                crate::types::TurnRole::User => "user",
                crate::types::TurnRole::Assistant => "assistant",
                crate::types::TurnRole::System => "system",
            };
            out.push_str(&format!("{role}: {}\n", turn.content));
        }
    }

    let mut context_lines = Vec::new();
    if let Some(file) = &working.current_file {
        context_lines.push(format!("current file: {file}"));
    }
    if !working.focus_files.is_empty() {
        context_lines.push(format!("focus files: {}", working.focus_files.join(", ")));
    }
    if let Some(err) = &working.last_error {
        context_lines.push(format!("last error: {err}"));
    }
    if let Some(diff) = &working.current_diff {
        context_lines.push(format!("current diff:\n{diff}"));
    }
    if !context_lines.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("## Working Context\n\n");
        out.push_str(&context_lines.join("\n"));
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TurnRole;
    use cortex_core::{ProjectId, SessionId};

    fn request() -> GatherRequest {
        GatherRequest {
            project_id: ProjectId::new("p1"),
            session_id: SessionId::new("s1"),
            query: "hello".into(),
        }
    }

    #[test]
    fn empty_layer_yields_empty_output() {
        let layer = EphemeralLayer::new();
        let out = layer.gather(&request(), 5_000);
        assert!(out.text.is_empty());
        assert_eq!(out.tokens_used, 0);
    }

    #[test]
    fn appended_turns_are_emitted_oldest_first() {
        let layer = EphemeralLayer::new();
        layer.update(&MemoryEvent::TurnAppended(Turn::new(TurnRole::User, "first")));
        layer.update(&MemoryEvent::TurnAppended(Turn::new(
            TurnRole::Assistant,
            "second",
        )));
        let out = layer.gather(&request(), 5_000);
        let first_pos = out.text.find("first").unwrap();
        let second_pos = out.text.find("second").unwrap();
        assert!(first_pos < second_pos);
    }

    #[test]
    fn drops_oldest_turns_to_fit_budget_but_keeps_last_two() {
        let layer = EphemeralLayer::new();
        for i in 0..20 {
            layer.update(&MemoryEvent::TurnAppended(Turn::new(
                TurnRole::User,
                format!("turn number {i} with some padding text to consume tokens"),
            )));
        }
        let out = layer.gather(&request(), 10);
        // Always keeps at least the last two turns even though 10 tokens
        // can't hold them.
        assert!(out.text.contains("turn number 18"));
        assert!(out.text.contains("turn number 19"));
        assert!(!out.text.contains("turn number 0"));
    }

    #[test]
    fn working_context_is_formatted() {
        let layer = EphemeralLayer::new();
        layer.update(&MemoryEvent::WorkingContextChanged(WorkingContext {
            current_file: Some("src/main.rs".into()),
            focus_files: vec!["src/lib.rs".into()],
            last_error: Some("panic at main.rs:10".into()),
            current_diff: None,
        }));
        let out = layer.gather(&request(), 5_000);
        assert!(out.text.contains("src/main.rs"));
        assert!(out.text.contains("panic at main.rs:10"));
    }

    #[test]
    fn ttl_cache_round_trips_within_window() {
        let layer = EphemeralLayer::new();
        layer.remember("k", serde_json::json!(42));
        assert_eq!(layer.recall("k"), Some(serde_json::json!(42)));
    }

    #[test]
    fn restore_replaces_turns() {
        let layer = EphemeralLayer::new();
        layer.update(&MemoryEvent::TurnAppended(Turn::new(TurnRole::User, "old")));
        layer.restore(
            vec![Turn::new(TurnRole::User, "restored")],
            WorkingContext::default(),
        );
        let out = layer.gather(&request(), 5_000);
        assert!(out.text.contains("restored"));
        assert!(!out.text.contains("old"));
    }

    #[test]
    fn working_context_getter_round_trips() {
        let layer = EphemeralLayer::new();
        layer.update(&MemoryEvent::WorkingContextChanged(WorkingContext {
            current_file: Some("src/lib.rs".into()),
            ..Default::default()
        }));
        assert_eq!(layer.working_context().current_file.as_deref(), Some("src/lib.rs"));
    }
}
