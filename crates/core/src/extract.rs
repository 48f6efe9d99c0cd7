//! Response extraction: pull the latest assistant-authored message out of a
//! step event for one persona.

use crate::domain::step::{MessageAuthor, Persona, StepEvent};

/// Scan the persona's message stream newest-to-oldest and return the first
/// assistant message whose trimmed text is non-empty.
///
/// Deterministic and side-effect free. A snapshot missing the persona's
/// stream entirely degrades to `None` rather than failing the turn.
pub fn latest_assistant_message(event: &StepEvent, persona: Persona) -> Option<&str> {
    let messages = event.messages.get(&persona)?;
    messages
        .iter()
        .rev()
        .find(|message| {
            message.author == MessageAuthor::Assistant && !message.content.trim().is_empty()
        })
        .map(|message| message.content.as_str())
}
