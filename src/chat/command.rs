//! Chat command parsing: `spec.md` §9's "model as an enumerated sum type"
//! guidance, following the teacher's `parse_bot_command`.

/// A parsed `/`-prefixed chat command. Job ids may be a full id or its
/// 8-character prefix; resolution happens in the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Status,
    Get(String),
    Retry(String),
    Unknown(String),
}

/// Parse `text` as a command. Returns `None` if `text` does not start with
/// `/`.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let raw = text.trim_start_matches('/');
    let (word, rest) = raw.split_once(' ').unwrap_or((raw, ""));
    let arg = rest.trim().to_string();

    Some(match word.to_lowercase().as_str() {
        "start" => Command::Start,
        "status" => Command::Status,
        "get" => Command::Get(arg),
        "retry" => Command::Retry(arg),
        other => Command::Unknown(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_slash_text_is_not_a_command() {
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn start_and_status_take_no_argument() {
        assert_eq!(parse_command("/start"), Some(Command::Start));
        assert_eq!(parse_command("/status"), Some(Command::Status));
    }

    #[test]
    fn get_captures_job_id_argument() {
        assert_eq!(parse_command("/get abcd1234"), Some(Command::Get("abcd1234".to_string())));
    }

    #[test]
    fn retry_captures_job_id_argument() {
        assert_eq!(parse_command("/retry abcd1234"), Some(Command::Retry("abcd1234".to_string())));
    }

    #[test]
    fn unrecognized_command_is_unknown() {
        assert_eq!(parse_command("/frobnicate"), Some(Command::Unknown("frobnicate".to_string())));
    }

    #[test]
    fn get_with_missing_argument_has_empty_id() {
        assert_eq!(parse_command("/get"), Some(Command::Get(String::new())));
    }

    #[test]
    fn command_word_is_case_insensitive() {
        assert_eq!(parse_command("/START"), Some(Command::Start));
    }
}
