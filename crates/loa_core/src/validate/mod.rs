use crate::config::Tunables;
use crate::domain::ConversationTurn;
use crate::error::AppError;

/// Strip control characters from a user message, preserving newlines.
/// Tabs become single spaces so they fold under whitespace collapsing.
pub fn strip_control_chars(raw: &str) -> String {
    raw.chars()
        .filter_map(|c| {
            if c == '\n' {
                Some(c)
            } else if c == '\t' {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}

/// Validate and sanitize the current user message. Rejections carry
/// `INPUT_*` codes and have no side effects.
pub fn sanitize_message(raw: &str, tunables: &Tunables) -> Result<String, AppError> {
    let cleaned = strip_control_chars(raw);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid_input(
            "INPUT_MESSAGE_EMPTY",
            "Message must not be empty after sanitization",
        ));
    }
    let len = trimmed.chars().count();
    if len > tunables.max_message_length {
        return Err(AppError::invalid_input(
            "INPUT_MESSAGE_TOO_LONG",
            "Message exceeds the maximum length",
        )
        .with_details(format!(
            "length={len}; max={}",
            tunables.max_message_length
        )));
    }
    Ok(trimmed.to_string())
}

/// Validate conversation history bounds. Roles are already typed; only the
/// length and per-turn content need checking here.
pub fn validate_history(
    history: &[ConversationTurn],
    tunables: &Tunables,
) -> Result<(), AppError> {
    if history.len() > tunables.max_history_messages {
        return Err(AppError::invalid_input(
            "INPUT_HISTORY_TOO_LONG",
            "Conversation history exceeds the maximum number of turns",
        )
        .with_details(format!(
            "length={}; max={}",
            history.len(),
            tunables.max_history_messages
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConversationTurn;
    use pretty_assertions::assert_eq;

    fn tunables() -> Tunables {
        Tunables::default()
    }

    #[test]
    fn empty_message_is_rejected() {
        let err = sanitize_message("", &tunables()).unwrap_err();
        assert_eq!(err.code, "INPUT_MESSAGE_EMPTY");
    }

    #[test]
    fn whitespace_and_control_only_message_is_rejected() {
        let err = sanitize_message(" \t \u{0007}\u{0000} \n ", &tunables()).unwrap_err();
        assert_eq!(err.code, "INPUT_MESSAGE_EMPTY");
    }

    #[test]
    fn control_chars_are_stripped_but_text_survives() {
        let out = sanitize_message("hola\u{0008} mundo\u{001b}", &tunables()).unwrap();
        assert_eq!(out, "hola mundo");
    }

    #[test]
    fn message_over_limit_is_rejected() {
        let raw = "a".repeat(5001);
        let err = sanitize_message(&raw, &tunables()).unwrap_err();
        assert_eq!(err.code, "INPUT_MESSAGE_TOO_LONG");

        let ok = "a".repeat(5000);
        assert!(sanitize_message(&ok, &tunables()).is_ok());
    }

    #[test]
    fn history_bounds_zero_one_and_max() {
        let t = tunables();
        assert!(validate_history(&[], &t).is_ok());
        assert!(validate_history(&[ConversationTurn::user("hola")], &t).is_ok());

        let max: Vec<ConversationTurn> = (0..t.max_history_messages)
            .map(|i| ConversationTurn::user(format!("turno {i}")))
            .collect();
        assert!(validate_history(&max, &t).is_ok());

        let mut over = max;
        over.push(ConversationTurn::assistant("uno más"));
        let err = validate_history(&over, &t).unwrap_err();
        assert_eq!(err.code, "INPUT_HISTORY_TOO_LONG");
    }
}
