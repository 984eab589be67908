//! Rule-based fallback decomposition (spec §4.5 step 4: used when the
//! LLM's JSON response can't be parsed or repaired).

use cortex_core::TaskId;

use crate::types::Task;

const SPLIT_MARKERS: &[&str] = &[", then ", " then ", ", after that ", " next ", " finally "];

/// Split `prompt` into clause-sized segments on sequence markers.
fn split_segments(prompt: &str) -> Vec<String> {
    let mut segments = vec![prompt.to_string()];
    for marker in SPLIT_MARKERS {
        segments = segments
            .into_iter()
            .flat_map(|segment| {
                split_case_insensitive(&segment, marker)
                    .into_iter()
                    .map(|s| s.trim().to_string())
            })
            .collect();
    }
    segments.retain(|s| !s.is_empty());
    segments
}

fn split_case_insensitive(haystack: &str, needle: &str) -> Vec<String> {
    let lower_haystack = haystack.to_lowercase();
    let lower_needle = needle.to_lowercase();
    let mut parts = Vec::new();
    let mut rest = haystack;
    let mut lower_rest = lower_haystack.as_str();
    let mut offset = 0;
    while let Some(pos) = lower_rest.find(&lower_needle) {
        parts.push(rest[..pos].to_string());
        let advance = pos + lower_needle.len();
        offset += advance;
        rest = &haystack[offset..];
        lower_rest = &lower_haystack[offset..];
    }
    parts.push(rest.to_string());
    parts
}

/// Guess a tool name for a clause from its leading verb. Falls back to a
/// `conversation` task (no tool name) when nothing matches.
fn infer_tool(segment: &str) -> Option<&'static str> {
    let lower = segment.to_lowercase();
    if lower.contains("run ") || lower.contains("execute ") {
        Some("bash")
    } else if lower.contains("create") || lower.contains("write") {
        Some("write_file")
    } else if lower.contains("read") {
        Some("read_file")
    } else if lower.contains("edit") || lower.contains("replace") {
        Some("edit")
    } else if lower.contains("search") || lower.contains("grep") || lower.contains("find") {
        Some("grep")
    } else if lower.contains("list") {
        Some("ls")
    } else if lower.contains("commit") || lower.starts_with("git ") {
        Some("git")
    } else if lower.contains("http://") || lower.contains("https://") || lower.contains("fetch") {
        Some("web")
    } else {
        None
    }
}

fn has_back_reference(segment: &str) -> bool {
    let lower = segment.to_lowercase();
    [" it ", " it.", " it,", "that", "the file"]
        .iter()
        .any(|marker| lower.contains(marker))
        || lower.ends_with(" it")
}

/// Decompose `prompt` into a sequence of tasks without an LLM call,
/// inferring one tool per clause and chaining dependencies through
/// back-references (spec §4.5 steps 4-5).
pub fn decompose(prompt: &str) -> Vec<Task> {
    let segments = split_segments(prompt);
    let mut tasks = Vec::new();
    let mut previous_id: Option<TaskId> = None;

    for (i, segment) in segments.iter().enumerate() {
        let id = TaskId::new(format!("t{}", i + 1));
        let mut task = match infer_tool(segment) {
            Some(tool) => Task::tool(id.clone(), segment.clone(), tool, build_fallback_args(tool, segment)),
            None => Task::conversation(id.clone(), segment.clone(), segment.clone()),
        };
        if has_back_reference(segment) {
            if let Some(prev) = &previous_id {
                task.dependencies.push(prev.clone());
            }
        }
        previous_id = Some(id);
        tasks.push(task);
    }

    if tasks.is_empty() {
        tasks.push(Task::conversation(TaskId::new("t1"), prompt, prompt));
    }
    tasks
}

fn build_fallback_args(tool: &str, segment: &str) -> serde_json::Value {
    match tool {
        "bash" => serde_json::json!({"command": segment}),
        "grep" => serde_json::json!({"pattern": segment, "path": "."}),
        "web" => serde_json::json!({"url": segment}),
        "git" => serde_json::json!({"args": segment.split_whitespace().skip(1).collect::<Vec<_>>()}),
        _ => serde_json::json!({"action": segment}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskKind;

    #[test]
    fn splits_on_then() {
        let tasks = decompose("Create a.txt with 'A', then read it, then create b.txt");
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn infers_write_file_for_create() {
        let tasks = decompose("Create hello.txt with content 'Hello World'");
        assert_eq!(tasks.len(), 1);
        match &tasks[0].kind {
            TaskKind::Tool { tool, .. } => assert_eq!(tool, "write_file"),
            _ => panic!("expected a tool task"),
        }
    }

    #[test]
    fn back_reference_adds_dependency() {
        let tasks = decompose("Create a.txt with 'A', then read it");
        assert_eq!(tasks[1].dependencies, vec![tasks[0].id.clone()]);
    }

    #[test]
    fn no_markers_yields_single_segment() {
        let tasks = decompose("just say hi");
        assert_eq!(tasks.len(), 1);
    }
}
