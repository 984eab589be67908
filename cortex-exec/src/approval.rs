//! Approval Gate (spec §4.7, component C9): sensitivity × approval-mode
//! matrix plus session-scoped remembered decisions.

use std::collections::HashMap;

use async_trait::async_trait;
use cortex_tool::Sensitivity;
use tokio::sync::RwLock;

/// How permissive the session is about tool sensitivity (spec §4.7 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalMode {
    /// Medium and high sensitivity both prompt.
    Default,
    /// Medium is allowed; high still prompts.
    AutoEdit,
    /// Everything is allowed.
    Yolo,
}

/// What the gate decided for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed without asking.
    Allow,
    /// Refuse without asking (a remembered denial).
    Deny,
    /// Ask the user.
    Prompt,
}

/// The user's response to an approval prompt (spec §4.7: "approve once,
/// approve+remember, deny once, deny+remember").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserDecision {
    /// Allow this one invocation.
    ApproveOnce,
    /// Allow this invocation and remember it for the rest of the session.
    ApproveRemember,
    /// Deny this one invocation.
    DenyOnce,
    /// Deny this invocation and remember it for the rest of the session.
    DenyRemember,
}

impl UserDecision {
    /// Whether this decision approves the invocation.
    pub fn approved(self) -> bool {
        matches!(self, UserDecision::ApproveOnce | UserDecision::ApproveRemember)
    }

    /// Whether this decision should be remembered for the session.
    pub fn should_remember(self) -> bool {
        matches!(self, UserDecision::ApproveRemember | UserDecision::DenyRemember)
    }
}

/// Surfaces an approval prompt to the user. Approval prompts never time
/// out (spec §4.7) — implementations should block until a choice is made
/// or the user interrupts.
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    /// Ask whether `tool` may run with `args`, given its sensitivity.
    async fn ask(
        &self,
        tool: &str,
        args: &serde_json::Value,
        sensitivity: Sensitivity,
    ) -> UserDecision;
}

/// An [`ApprovalPrompt`] for non-interactive runs: denies everything that
/// would otherwise need a prompt. Useful for `--non-interactive` and tests.
pub struct AutoDenyPrompt;

#[async_trait]
impl ApprovalPrompt for AutoDenyPrompt {
    async fn ask(&self, _tool: &str, _args: &serde_json::Value, _sensitivity: Sensitivity) -> UserDecision {
        UserDecision::DenyOnce
    }
}

/// Classifies tool invocations and decides, per spec §4.7's mode table,
/// whether they may proceed, are denied, or need a prompt.
pub struct ApprovalGate {
    mode: ApprovalMode,
    overrides: HashMap<String, Sensitivity>,
    remembered: RwLock<HashMap<(String, Sensitivity), bool>>,
}

impl ApprovalGate {
    /// Build a gate for `mode` with no classification overrides.
    pub fn new(mode: ApprovalMode) -> Self {
        Self {
            mode,
            overrides: HashMap::new(),
            remembered: RwLock::new(HashMap::new()),
        }
    }

    /// Override a tool's default sensitivity classification.
    pub fn with_override(mut self, tool: impl Into<String>, sensitivity: Sensitivity) -> Self {
        self.overrides.insert(tool.into(), sensitivity);
        self
    }

    /// Classify a tool, honoring any configured override over its
    /// registry-declared default.
    pub fn classify(&self, tool_name: &str, default: Sensitivity) -> Sensitivity {
        self.overrides.get(tool_name).copied().unwrap_or(default)
    }

    fn table_decision(mode: ApprovalMode, sensitivity: Sensitivity) -> GateDecision {
        match (mode, sensitivity) {
            (_, Sensitivity::Low) => GateDecision::Allow,
            (ApprovalMode::Yolo, _) => GateDecision::Allow,
            (ApprovalMode::AutoEdit, Sensitivity::Medium) => GateDecision::Allow,
            (ApprovalMode::AutoEdit, Sensitivity::High) => GateDecision::Prompt,
            (ApprovalMode::Default, Sensitivity::Medium) => GateDecision::Prompt,
            (ApprovalMode::Default, Sensitivity::High) => GateDecision::Prompt,
        }
    }

    /// Decide what to do about `tool_name` at `sensitivity`, consulting
    /// any remembered decision from earlier in the session first.
    pub async fn decide(&self, tool_name: &str, sensitivity: Sensitivity) -> GateDecision {
        if let Some(approved) = self
            .remembered
            .read()
            .await
            .get(&(tool_name.to_string(), sensitivity))
            .copied()
        {
            return if approved { GateDecision::Allow } else { GateDecision::Deny };
        }
        Self::table_decision(self.mode, sensitivity)
    }

    /// Record a "remember this" decision for the rest of the session.
    pub async fn remember(&self, tool_name: &str, sensitivity: Sensitivity, approved: bool) {
        self.remembered
            .write()
            .await
            .insert((tool_name.to_string(), sensitivity), approved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn low_sensitivity_always_allowed() {
        let gate = ApprovalGate::new(ApprovalMode::Default);
        assert_eq!(gate.decide("read_file", Sensitivity::Low).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn default_mode_prompts_for_medium_and_high() {
        let gate = ApprovalGate::new(ApprovalMode::Default);
        assert_eq!(gate.decide("edit", Sensitivity::Medium).await, GateDecision::Prompt);
        assert_eq!(gate.decide("bash", Sensitivity::High).await, GateDecision::Prompt);
    }

    #[tokio::test]
    async fn auto_edit_allows_medium_but_prompts_high() {
        let gate = ApprovalGate::new(ApprovalMode::AutoEdit);
        assert_eq!(gate.decide("edit", Sensitivity::Medium).await, GateDecision::Allow);
        assert_eq!(gate.decide("bash", Sensitivity::High).await, GateDecision::Prompt);
    }

    #[tokio::test]
    async fn yolo_allows_everything() {
        let gate = ApprovalGate::new(ApprovalMode::Yolo);
        assert_eq!(gate.decide("bash", Sensitivity::High).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn remembered_approval_short_circuits_the_table() {
        let gate = ApprovalGate::new(ApprovalMode::Default);
        gate.remember("bash", Sensitivity::High, true).await;
        assert_eq!(gate.decide("bash", Sensitivity::High).await, GateDecision::Allow);
    }

    #[tokio::test]
    async fn remembered_denial_short_circuits_the_table() {
        let gate = ApprovalGate::new(ApprovalMode::Yolo);
        gate.remember("bash", Sensitivity::High, false).await;
        assert_eq!(gate.decide("bash", Sensitivity::High).await, GateDecision::Deny);
    }

    #[test]
    fn override_changes_classification() {
        let gate = ApprovalGate::new(ApprovalMode::Default).with_override("custom_script", Sensitivity::High);
        assert_eq!(gate.classify("custom_script", Sensitivity::Low), Sensitivity::High);
        assert_eq!(gate.classify("read_file", Sensitivity::Low), Sensitivity::Low);
    }
}
