//! Terminal [`ApprovalPrompt`] (spec §4.7, §1: "the interactive terminal
//! UI and approval dialog" is an out-of-scope collaborator — this is the
//! minimal stdin/stdout stand-in the core needs to actually run
//! end-to-end). Approval prompts never time out: this blocks on a
//! blocking-thread stdin read, not a timed future.

use async_trait::async_trait;
use cortex_exec::{ApprovalPrompt, UserDecision};
use cortex_tool::Sensitivity;
use std::io::Write;

/// Reads `y`/`n`/`Y`/`N` (remember) from stdin, printing the proposed
/// invocation to stderr first so it doesn't interleave with any
/// assistant output on stdout.
pub struct TtyApprovalPrompt;

#[async_trait]
impl ApprovalPrompt for TtyApprovalPrompt {
    async fn ask(&self, tool: &str, args: &serde_json::Value, sensitivity: Sensitivity) -> UserDecision {
        let tool = tool.to_string();
        let args = args.clone();
        tokio::task::spawn_blocking(move || prompt_once(&tool, &args, sensitivity))
            .await
            .unwrap_or(UserDecision::DenyOnce)
    }
}

fn prompt_once(tool: &str, args: &serde_json::Value, sensitivity: Sensitivity) -> UserDecision {
    loop {
        eprintln!("\n[{sensitivity:?}] run `{tool}` with args: {args}?");
        eprint!("  (y)es once / (a)lways this session / (n)o once / (N)ever this session > ");
        let _ = std::io::stderr().flush();

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return UserDecision::DenyOnce;
        }
        return match line.trim() {
            "y" | "Y" | "yes" => UserDecision::ApproveOnce,
            "a" | "always" => UserDecision::ApproveRemember,
            "n" | "no" | "" => UserDecision::DenyOnce,
            "N" | "never" => UserDecision::DenyRemember,
            _ => continue,
        };
    }
}
