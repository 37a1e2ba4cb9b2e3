//! Intent classification: `spec.md` §4.3.
//!
//! A pure function of the message text. No I/O, no state.

/// Case-insensitive keywords whose presence as a substring marks a message
/// as a `task`.
const TASK_KEYWORDS: &[&str] = &[
    "research", "write", "analyze", "create", "build", "find", "summarize", "compile", "report",
    "draft", "generate", "make", "prepare", "search", "compare", "list", "collect", "gather",
    "extract", "translate",
];

/// Length threshold (in bytes) above which a message is classified `task`
/// regardless of keyword content.
const TASK_LENGTH_THRESHOLD_BYTES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Quick,
    Task,
}

/// Classify `message` as `Quick` or `Task`.
pub fn classify(message: &str) -> Intent {
    let lower = message.to_lowercase();
    let has_keyword = TASK_KEYWORDS.iter().any(|kw| lower.contains(kw));
    let is_long = message.len() > TASK_LENGTH_THRESHOLD_BYTES;

    if has_keyword || is_long { Intent::Task } else { Intent::Quick }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_plain_message_is_quick() {
        assert_eq!(classify("what's 2+2?"), Intent::Quick);
    }

    #[test]
    fn keyword_message_is_task_even_if_short() {
        assert_eq!(classify("build x"), Intent::Task);
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        assert_eq!(classify("RESEARCH quantum computing"), Intent::Task);
    }

    #[test]
    fn exactly_100_bytes_with_no_keyword_is_quick() {
        let message = "a".repeat(100);
        assert_eq!(message.len(), 100);
        assert_eq!(classify(&message), Intent::Quick);
    }

    #[test]
    fn exactly_101_bytes_is_task() {
        let message = "a".repeat(101);
        assert_eq!(message.len(), 101);
        assert_eq!(classify(&message), Intent::Task);
    }

    #[test]
    fn single_character_keyword_message_is_task() {
        // "find" is a keyword — even minimal surrounding text should classify as task.
        assert_eq!(classify("find"), Intent::Task);
    }

    #[test]
    fn each_keyword_triggers_task() {
        for kw in TASK_KEYWORDS {
            assert_eq!(classify(kw), Intent::Task, "keyword '{kw}' should classify as task");
        }
    }
}
