use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::action::ActionId;

/// A named agent identity within the multi-agent graph. A closed enum so a
/// misspelled persona is a deserialization error, not a silently empty
/// message stream.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    #[default]
    General,
    Dining,
    Transport,
}

impl Persona {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::General => "General Agent",
            Self::Dining => "Dining Agent",
            Self::Transport => "Transport Agent",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAuthor {
    User,
    Assistant,
    Tool,
}

/// One role-tagged message inside a persona's stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMessage {
    pub author: MessageAuthor,
    pub content: String,
}

impl StepMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { author: MessageAuthor::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { author: MessageAuthor::Assistant, content: content.into() }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self { author: MessageAuthor::Tool, content: content.into() }
    }
}

/// One incremental state snapshot emitted by the executor during a run.
/// Snapshots are cumulative: each carries the full per-persona message
/// history up to that step.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    pub current_persona: Persona,
    pub messages: BTreeMap<Persona, Vec<StepMessage>>,
}

impl StepEvent {
    /// Snapshot with a single persona's messages, the common case in tests
    /// and in the scripted executor.
    pub fn for_persona(persona: Persona, messages: Vec<StepMessage>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(persona, messages);
        Self { current_persona: persona, messages: map }
    }
}

/// The executor's report of a run that is scheduled-but-blocked on a human
/// decision. `action_id` is optional only because the wire format cannot
/// promise it; the approval workflow treats its absence as a malformed event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseDescriptor {
    pub action_id: Option<ActionId>,
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::{Persona, StepEvent, StepMessage};

    #[test]
    fn persona_display_names() {
        assert_eq!(Persona::General.to_string(), "General Agent");
        assert_eq!(Persona::Dining.to_string(), "Dining Agent");
        assert_eq!(Persona::Transport.to_string(), "Transport Agent");
    }

    #[test]
    fn for_persona_sets_current_persona_and_stream() {
        let event =
            StepEvent::for_persona(Persona::Dining, vec![StepMessage::assistant("Booked.")]);

        assert_eq!(event.current_persona, Persona::Dining);
        assert_eq!(event.messages[&Persona::Dining].len(), 1);
        assert!(event.messages.get(&Persona::General).is_none());
    }
}
