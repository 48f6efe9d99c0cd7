//! Conversation history formatting: render the transcript as the flat text
//! block the agent consumes as context, and parse it back by label.

use crate::domain::session::{Role, Turn};

/// Render each turn as `"<label>: <content>"` (user -> "You",
/// assistant -> "Dinebot"), joined by newlines in turn order.
pub fn format_history(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bounded variant: format only the most recent `max_turns` turns when a
/// bound is configured. The transcript itself is never truncated; this only
/// limits the context handed to the agent on long sessions.
pub fn format_recent(turns: &[Turn], max_turns: Option<usize>) -> String {
    match max_turns {
        Some(limit) if turns.len() > limit => format_history(&turns[turns.len() - limit..]),
        _ => format_history(turns),
    }
}

/// Recover the role sequence and contents from a formatted history block.
/// Lines without a known label are folded into the preceding turn, so
/// multi-line contents survive the round trip.
pub fn parse_history(text: &str) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();

    for line in text.lines() {
        if let Some(content) = line.strip_prefix("You: ") {
            turns.push(Turn::user(content));
        } else if let Some(content) = line.strip_prefix("Dinebot: ") {
            turns.push(Turn::assistant(content));
        } else if let Some(last) = turns.last_mut() {
            last.content.push('\n');
            last.content.push_str(line);
        }
    }

    turns
}

#[cfg(test)]
mod tests {
    use super::{format_history, format_recent, parse_history};
    use crate::domain::session::{Role, Turn};

    fn transcript() -> Vec<Turn> {
        vec![
            Turn::assistant("How can I help you?"),
            Turn::user("Book me a table for 2 at 7pm"),
            Turn::assistant("Your table is booked."),
        ]
    }

    #[test]
    fn formats_with_fixed_labels_in_turn_order() {
        let formatted = format_history(&transcript());

        assert_eq!(
            formatted,
            "Dinebot: How can I help you?\n\
             You: Book me a table for 2 at 7pm\n\
             Dinebot: Your table is booked."
        );
    }

    #[test]
    fn round_trip_recovers_roles_and_contents() {
        let turns = transcript();
        let parsed = parse_history(&format_history(&turns));
        assert_eq!(parsed, turns);
    }

    #[test]
    fn round_trip_preserves_multi_line_contents() {
        let turns = vec![
            Turn::user("two options:\n1. italian\n2. thai"),
            Turn::assistant("Both are nearby."),
        ];

        let parsed = parse_history(&format_history(&turns));
        assert_eq!(parsed, turns);
    }

    #[test]
    fn empty_transcript_formats_to_empty_string() {
        assert_eq!(format_history(&[]), "");
        assert!(parse_history("").is_empty());
    }

    #[test]
    fn format_recent_keeps_only_the_newest_turns() {
        let turns = transcript();

        let bounded = format_recent(&turns, Some(2));
        let parsed = parse_history(&bounded);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].role, Role::User);
        assert_eq!(parsed[1].content, "Your table is booked.");
    }

    #[test]
    fn format_recent_without_bound_matches_format_history() {
        let turns = transcript();
        assert_eq!(format_recent(&turns, None), format_history(&turns));
        assert_eq!(format_recent(&turns, Some(10)), format_history(&turns));
    }
}
