use thiserror::Error;

use crate::approval::{ApprovalError, MalformedStepEvent};

/// Application-level failures of one chat turn or resolution attempt.
///
/// Propagation policy: extraction and formatting never abort a session (they
/// degrade to `None`/empty output); everything that can abort a turn funnels
/// through this enum so the front ends share one mapping to user-facing
/// messages.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error(transparent)]
    Approval(#[from] ApprovalError),
    #[error(transparent)]
    MalformedStepEvent(#[from] MalformedStepEvent),
    #[error("agent executor unavailable: {detail}")]
    ExecutorUnavailable { detail: String },
}

/// Interface-tier rendering of a [`ChatError`], tagged with the session the
/// failure belongs to.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, session_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, session_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, session_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, session_id: String },
}

impl InterfaceError {
    /// Safe text shown to the chat user. Never leaks executor internals.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "That decision could not be applied. Check the pending action and try again."
            }
            Self::Conflict { .. } => "This action was already resolved.",
            Self::ServiceUnavailable { .. } => {
                "Dinebot is temporarily unavailable. Please retry your message."
            }
            Self::Internal { .. } => "Something went wrong on our side.",
        }
    }
}

impl ChatError {
    pub fn into_interface(self, session_id: impl Into<String>) -> InterfaceError {
        let session_id = session_id.into();
        match self {
            Self::Approval(ApprovalError::InvalidDecision { .. }) => InterfaceError::BadRequest {
                message: "decision validation failed".to_owned(),
                session_id,
            },
            Self::Approval(ApprovalError::AlreadyResolved { action_id }) => {
                InterfaceError::Conflict {
                    message: format!("action `{action_id}` already resolved"),
                    session_id,
                }
            }
            Self::MalformedStepEvent(error) => {
                InterfaceError::Internal { message: error.to_string(), session_id }
            }
            Self::ExecutorUnavailable { detail } => {
                InterfaceError::ServiceUnavailable { message: detail, session_id }
            }
        }
    }
}
