#![deny(missing_docs)]
//! # cortex-tokens — Token Budget Manager (spec §4.1, component C1)
//!
//! Apportions a fixed input-token budget across named sections and
//! enforces per-section caps. Every other component asks this manager
//! before adding text to a composed prompt — the LLM's effective
//! context window is the binding constraint on the whole system.
//!
//! Token counting here is the character-heuristic the spec explicitly
//! allows (~4 chars/token, accuracy within ±15% of a real tokenizer on
//! representative inputs) — the same approach `neuron-context`'s
//! `SlidingWindow` uses for its own token estimates.

use cortex_core::error::BudgetError;
use std::collections::HashMap;

/// Operating mode, controlling output/reasoning caps (spec §4.1 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Short answers.
    Direct,
    /// Default coding mode.
    Concise,
    /// Complex refactors.
    Deep,
}

/// Output caps for one [`OperatingMode`].
#[derive(Debug, Clone, Copy)]
pub struct ModeCaps {
    /// Total output token cap.
    pub output_cap: usize,
    /// Sub-cap reserved for reasoning tokens within the output cap.
    pub reasoning_cap: usize,
}

impl OperatingMode {
    /// Look up the authoritative caps for this mode (spec §4.1 table).
    pub fn caps(&self) -> ModeCaps {
        match self {
            OperatingMode::Direct => ModeCaps {
                output_cap: 1_000,
                reasoning_cap: 200,
            },
            OperatingMode::Concise => ModeCaps {
                output_cap: 6_000,
                reasoning_cap: 5_000,
            },
            OperatingMode::Deep => ModeCaps {
                output_cap: 15_000,
                reasoning_cap: 12_000,
            },
        }
    }
}

/// A named input section with its target token allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    /// Recent-turn conversation buffer.
    Ephemeral,
    /// Retrieved code/doc/diff chunks.
    Retrieved,
    /// Project knowledge entries.
    Knowledge,
    /// The user's query itself.
    Query,
    /// Reserved headroom, never allocated to any section directly.
    Buffer,
}

impl Section {
    /// Target token allocation for this section (spec §4.1 table),
    /// regardless of operating mode — the input budget is mode-independent.
    pub fn target(&self) -> usize {
        match self {
            Section::Ephemeral => 5_000,
            Section::Retrieved => 40_000,
            Section::Knowledge => 2_000,
            Section::Query => 2_000,
            Section::Buffer => 10_000,
        }
    }
}

/// Hard input ceiling regardless of mode (spec §4.1).
pub const HARD_INPUT_CEILING: usize = 128_000;

/// Hard ceiling on input + output tokens combined (spec §4.1).
pub const HARD_TOTAL_CEILING: usize = 160_768;

/// Approximate characters consumed per token by the heuristic counter.
const CHARS_PER_TOKEN: usize = 4;

/// Per-turn token accounting across the five named sections.
///
/// Not shared across turns (spec §5): construct a fresh `TokenBudget`
/// per orchestrator turn and discard it at the end.
pub struct TokenBudget {
    mode: OperatingMode,
    used: HashMap<Section, usize>,
}

impl TokenBudget {
    /// Create a budget for the given operating mode with all sections empty.
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            used: HashMap::new(),
        }
    }

    /// The operating mode this budget was constructed for.
    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    /// Approximate the token count of `text`.
    ///
    /// Character-based heuristic: `chars / 4`, rounded up so a non-empty
    /// string never counts as zero tokens. Within ±15% of a real BPE
    /// tokenizer on representative English/code input, per spec §4.1.
    pub fn count(text: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 {
            0
        } else {
            (chars + CHARS_PER_TOKEN - 1) / CHARS_PER_TOKEN
        }
    }

    /// Tokens already recorded for `section`.
    pub fn used(&self, section: Section) -> usize {
        *self.used.get(&section).unwrap_or(&0)
    }

    /// Remaining target tokens for `section` (target minus used; may be
    /// negative conceptually but is clamped to zero).
    pub fn remaining(&self, section: Section) -> usize {
        section.target().saturating_sub(self.used(section))
    }

    /// Record `text` as consumed by `section`.
    ///
    /// Fails with [`BudgetError::Exceeded`] if adding it would cross the
    /// section's target plus the reserved buffer headroom. Partial
    /// additions are never made — on error, `section`'s usage is
    /// unchanged.
    pub fn add_to(&mut self, section: Section, text: &str) -> Result<usize, BudgetError> {
        let tokens = Self::count(text);
        let used = self.used(section);
        let limit = section.target() + Section::Buffer.target();
        if used + tokens > limit {
            return Err(BudgetError::Exceeded {
                section: format!("{section:?}"),
                used,
                requested: tokens,
                limit,
            });
        }
        *self.used.entry(section).or_insert(0) += tokens;
        Ok(tokens)
    }

    /// Total tokens recorded across all sections so far.
    pub fn total_used(&self) -> usize {
        self.used.values().sum()
    }

    /// Clear per-call counters. Mode and caps are unchanged.
    pub fn reset(&mut self) {
        self.used.clear();
    }

    /// Snapshot the per-section usage map, for the Session Snapshot's
    /// `tokenBudget` field (spec §3, §4.9).
    pub fn used_by_section(&self) -> HashMap<Section, usize> {
        self.used.clone()
    }

    /// Rebuild a budget from a previously snapshotted usage map, e.g.
    /// when resuming a crashed session.
    pub fn from_used(mode: OperatingMode, used: HashMap<Section, usize>) -> Self {
        Self { mode, used }
    }

    /// Deterministically truncate `text` to at most `max_tokens` tokens,
    /// preferring to cut at a line boundary (spec §4.1: "must truncate at
    /// a structural boundary (line) when possible").
    pub fn trim_to_fit(text: &str, max_tokens: usize) -> String {
        if Self::count(text) <= max_tokens {
            return text.to_string();
        }
        let max_chars = max_tokens * CHARS_PER_TOKEN;
        if max_chars == 0 {
            return String::new();
        }

        // Find the char boundary at or before max_chars.
        let mut boundary = max_chars.min(text.chars().count());
        let char_indices: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        let byte_cut = char_indices.get(boundary).copied().unwrap_or(text.len());
        let candidate = &text[..byte_cut];

        // Prefer cutting at the last newline within the candidate so we
        // never split a line in half, as long as that doesn't throw away
        // more than half the allotted budget.
        if let Some(last_nl) = candidate.rfind('\n') {
            if last_nl * 2 >= byte_cut {
                boundary = last_nl;
                return text[..boundary].to_string();
            }
        }
        candidate.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_caps_match_table() {
        assert_eq!(OperatingMode::Direct.caps().output_cap, 1_000);
        assert_eq!(OperatingMode::Direct.caps().reasoning_cap, 200);
        assert_eq!(OperatingMode::Concise.caps().output_cap, 6_000);
        assert_eq!(OperatingMode::Deep.caps().reasoning_cap, 12_000);
    }

    #[test]
    fn count_is_roughly_four_chars_per_token() {
        assert_eq!(TokenBudget::count(""), 0);
        assert_eq!(TokenBudget::count("abcd"), 1);
        assert_eq!(TokenBudget::count("abcde"), 2);
    }

    #[test]
    fn add_to_accumulates_and_reports_remaining() {
        let mut budget = TokenBudget::new(OperatingMode::Concise);
        budget.add_to(Section::Query, "hello world").unwrap();
        assert!(budget.used(Section::Query) > 0);
        assert_eq!(
            budget.remaining(Section::Query),
            Section::Query.target() - budget.used(Section::Query)
        );
    }

    #[test]
    fn add_to_rejects_overflow_without_partial_write() {
        let mut budget = TokenBudget::new(OperatingMode::Concise);
        let huge = "x".repeat((Section::Query.target() + Section::Buffer.target() + 100) * 4);
        let before = budget.used(Section::Query);
        let err = budget.add_to(Section::Query, &huge);
        assert!(err.is_err());
        assert_eq!(budget.used(Section::Query), before);
    }

    #[test]
    fn reset_clears_usage_not_mode() {
        let mut budget = TokenBudget::new(OperatingMode::Deep);
        budget.add_to(Section::Knowledge, "some text").unwrap();
        budget.reset();
        assert_eq!(budget.used(Section::Knowledge), 0);
        assert_eq!(budget.mode(), OperatingMode::Deep);
    }

    #[test]
    fn trim_to_fit_is_idempotent() {
        let text = "line one\nline two\nline three\nline four\n".repeat(20);
        let once = TokenBudget::trim_to_fit(&text, 10);
        let twice = TokenBudget::trim_to_fit(&once, 10);
        assert_eq!(once, twice);
    }

    #[test]
    fn trim_to_fit_prefers_line_boundary() {
        let text = "aaaa\nbbbb\ncccc\ndddd\n";
        let trimmed = TokenBudget::trim_to_fit(text, 3);
        assert!(!trimmed.is_empty());
        assert!(text.starts_with(&trimmed));
        // Should not end mid-line unless the single line itself exceeds budget.
        if trimmed.contains('\n') {
            assert!(trimmed.ends_with('\n') || !trimmed.contains('\n'));
        }
    }

    #[test]
    fn trim_to_fit_under_budget_is_noop() {
        let text = "short";
        assert_eq!(TokenBudget::trim_to_fit(text, 100), text);
    }

    proptest::proptest! {
        #[test]
        fn trim_to_fit_is_idempotent_for_arbitrary_text(
            lines in proptest::collection::vec("[a-zA-Z0-9 ]{0,40}", 0..30),
            max_tokens in 0usize..50,
        ) {
            let text = lines.join("\n");
            let once = TokenBudget::trim_to_fit(&text, max_tokens);
            let twice = TokenBudget::trim_to_fit(&once, max_tokens);
            proptest::prop_assert_eq!(once, twice);
        }

        #[test]
        fn trim_to_fit_never_exceeds_budget_by_more_than_one_line(
            lines in proptest::collection::vec("[a-zA-Z0-9 ]{0,40}", 1..30),
            max_tokens in 1usize..50,
        ) {
            let text = lines.join("\n");
            let trimmed = TokenBudget::trim_to_fit(&text, max_tokens);
            proptest::prop_assert!(text.starts_with(&trimmed));
        }
    }
}
