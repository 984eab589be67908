//! Permission policy (spec §4.7): a separate, stricter layer than the
//! Approval Gate, meant for constrained agents — per-agent allow/deny
//! lists, dangerous-operation/read-only/network-access flags, and
//! file-path safety checks.

use std::collections::HashSet;

use cortex_core::error::{Severity, SecurityError};
use cortex_tool::Sensitivity;

const UNSAFE_PATH_SUBSTRINGS: &[&str] = &[".env", "secret", "password", "key", "token"];
const SYSTEM_PATH_PREFIXES: &[&str] = &["/etc", "/sys", "/proc", "/root/.ssh", "/boot"];
const PATH_ARG_KEYS: &[&str] = &["path", "filename", "cwd"];

/// Tools considered to mutate the filesystem or run arbitrary commands,
/// blocked by [`PermissionPolicy::read_only`].
const WRITE_TOOLS: &[&str] = &["write_file", "edit", "bash", "git"];

/// Per-agent restrictions layered on top of the Approval Gate.
pub struct PermissionPolicy {
    allow: Option<HashSet<String>>,
    deny: HashSet<String>,
    allow_dangerous: bool,
    read_only: bool,
    allow_network: bool,
}

impl Default for PermissionPolicy {
    /// The least restrictive policy: every tool, every sensitivity,
    /// read/write, network allowed. Callers narrow it per agent.
    fn default() -> Self {
        Self {
            allow: None,
            deny: HashSet::new(),
            allow_dangerous: true,
            read_only: false,
            allow_network: true,
        }
    }
}

impl PermissionPolicy {
    /// Restrict to an explicit allow-list of tool names.
    pub fn allow_only(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allow = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    /// Add tool names to the deny-list.
    pub fn deny(mut self, tools: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deny.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Forbid high-sensitivity (dangerous) operations outright.
    pub fn forbid_dangerous(mut self) -> Self {
        self.allow_dangerous = false;
        self
    }

    /// Forbid anything that writes (file writes/edits, shell, git).
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Forbid network access (the `web` tool).
    pub fn no_network(mut self) -> Self {
        self.allow_network = false;
        self
    }

    /// Check one invocation against the policy. Returns the first
    /// violation found, if any.
    pub fn check(
        &self,
        tool_name: &str,
        args: &serde_json::Value,
        sensitivity: Sensitivity,
    ) -> Result<(), SecurityError> {
        if let Some(allow) = &self.allow {
            if !allow.contains(tool_name) {
                return Err(violation(
                    Severity::High,
                    format!("tool '{tool_name}' is not in the allow-list"),
                ));
            }
        }
        if self.deny.contains(tool_name) {
            return Err(violation(Severity::High, format!("tool '{tool_name}' is denied")));
        }
        if sensitivity == Sensitivity::High && !self.allow_dangerous {
            return Err(violation(
                Severity::High,
                format!("tool '{tool_name}' is a dangerous operation and this agent may not run it"),
            ));
        }
        if self.read_only && WRITE_TOOLS.contains(&tool_name) {
            return Err(violation(
                Severity::Medium,
                format!("tool '{tool_name}' would write and this agent is read-only"),
            ));
        }
        if !self.allow_network && tool_name == "web" {
            return Err(violation(Severity::Medium, "this agent may not access the network".into()));
        }
        check_path_args(args)?;
        Ok(())
    }
}

fn check_path_args(args: &serde_json::Value) -> Result<(), SecurityError> {
    for key in PATH_ARG_KEYS {
        if let Some(path) = args.get(key).and_then(|v| v.as_str()) {
            check_path_safety(path)?;
        }
    }
    Ok(())
}

fn check_path_safety(path: &str) -> Result<(), SecurityError> {
    if path.contains("..") {
        return Err(violation(Severity::High, format!("path traversal rejected: {path}")));
    }
    if path.starts_with('~') {
        return Err(violation(Severity::High, format!("home-relative path rejected: {path}")));
    }
    let lower = path.to_lowercase();
    if SYSTEM_PATH_PREFIXES.iter().any(|prefix| lower.starts_with(prefix)) {
        return Err(violation(Severity::High, format!("system path rejected: {path}")));
    }
    if let Some(hit) = UNSAFE_PATH_SUBSTRINGS.iter().find(|needle| lower.contains(**needle)) {
        return Err(violation(
            Severity::High,
            format!("path looks like a secret ('{hit}' in '{path}')"),
        ));
    }
    Ok(())
}

fn violation(severity: Severity, reason: String) -> SecurityError {
    SecurityError { severity, reason }
}
