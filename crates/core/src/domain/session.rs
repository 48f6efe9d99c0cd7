use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::ApprovalState;

/// Opaque per-conversation token. One per browser session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Fixed transcript label, also used when formatting agent context.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Dinebot",
        }
    }
}

/// One transcript entry. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The external executor's thread context. Shared by every turn of one
/// session, never shared across sessions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunHandle {
    pub thread_id: Uuid,
}

impl RunHandle {
    pub fn new() -> Self {
        Self { thread_id: Uuid::new_v4() }
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Greeting appended as the first assistant turn of every session.
pub const GREETING: &str = "How can I help you?";

/// Per-conversation state: the ordered transcript, the executor thread
/// handle, and the approval bookkeeping.
///
/// Invariant: at most one pending action is unresolved at any time, enforced
/// by the embedded [`ApprovalState`].
#[derive(Clone, Debug)]
pub struct Session {
    id: SessionId,
    run_handle: RunHandle,
    turns: Vec<Turn>,
    approvals: ApprovalState,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            run_handle: RunHandle::new(),
            turns: vec![Turn::assistant(GREETING)],
            approvals: ApprovalState::default(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn run_handle(&self) -> &RunHandle {
        &self.run_handle
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::assistant(content));
    }

    /// Content of the most recent assistant turn, if any.
    pub fn last_assistant(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(|turn| turn.content.as_str())
    }

    pub fn approvals(&self) -> &ApprovalState {
        &self.approvals
    }

    pub fn approvals_mut(&mut self) -> &mut ApprovalState {
        &mut self.approvals
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
