//! Complexity classification heuristic (spec §4.5 step 1).

use crate::types::Complexity;

const SEQUENCE_MARKERS: &[&str] = &["then", "after", "next", "finally"];

const TOOL_VERBS: &[&str] = &[
    "create", "run", "search", "write", "read", "edit", "delete", "remove", "fetch", "list",
    "commit", "grep", "find", "execute", "install", "build",
];

/// Whether `prompt` contains a sequencing word (case-insensitive, word
/// boundary aware).
pub fn has_sequence_markers(prompt: &str) -> bool {
    contains_any_word(prompt, SEQUENCE_MARKERS)
}

/// Whether `prompt` contains a verb that typically names a tool action.
pub fn has_tool_verbs(prompt: &str) -> bool {
    contains_any_word(prompt, TOOL_VERBS)
}

fn contains_any_word(prompt: &str, words: &[&str]) -> bool {
    let lower = prompt.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| words.contains(&token))
}

/// Classify a prompt's complexity (spec §4.5 step 1: word count,
/// sequence markers, tool verbs).
pub fn classify(prompt: &str) -> Complexity {
    let word_count = prompt.split_whitespace().count();
    if has_sequence_markers(prompt) || word_count > 40 {
        Complexity::Complex
    } else if has_tool_verbs(prompt) || (12..=40).contains(&word_count) {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_question_is_simple() {
        assert_eq!(classify("What is 2+2?"), Complexity::Simple);
    }

    #[test]
    fn sequence_marker_forces_complex() {
        assert_eq!(
            classify("Create a.txt with 'A', then read it, then create b.txt"),
            Complexity::Complex
        );
    }

    #[test]
    fn single_tool_verb_is_moderate() {
        assert_eq!(classify("run the tests"), Complexity::Moderate);
    }

    #[test]
    fn long_prompt_without_markers_is_moderate() {
        let prompt = "please help me understand how this particular module handles configuration loading across environments";
        assert_eq!(classify(prompt), Complexity::Moderate);
    }

    #[test]
    fn sequence_marker_is_word_bounded() {
        assert!(!has_sequence_markers("thenable promises are neat"));
        assert!(has_sequence_markers("do this, then do that"));
    }
}
