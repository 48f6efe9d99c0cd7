use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of one pause event, supplied by the agent executor.
///
/// The executor owns the identifier space; this crate never fabricates one.
/// A pause reported without an identifier is rejected as a malformed step
/// event instead (see `approval::ApprovalState::register_pause`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub String);

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A tool invocation the executor has paused before performing, awaiting
/// human approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ActionId,
    pub tool: String,
    pub arguments: Value,
}

impl PendingAction {
    /// Render-ready description shown in the approval prompt.
    pub fn describe(&self) -> String {
        format!("{} {}", self.tool, self.arguments)
    }
}

/// The user's verdict on a pending action. A denial always carries the
/// user's free-text reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Denied { reason: String },
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied { .. } => "denied",
        }
    }
}
