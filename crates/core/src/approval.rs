//! The approval workflow state machine.
//!
//! One [`ApprovalState`] lives inside each session and drives a paused tool
//! call from "detected" to "resolved" exactly once:
//!
//! ```text
//! register_pause -> present -> begin_resolution -> (dispatch) -> commit_resolution
//! ```
//!
//! Resolution is two-phase so it stays transactional across the async
//! executor boundary: `begin_resolution` validates and produces the
//! resumption payload without mutating anything; the caller dispatches the
//! resumption; `commit_resolution` retires the action only after that
//! dispatch succeeded. A failed dispatch leaves the action unresolved.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::action::{ActionId, Decision, PendingAction};
use crate::domain::step::PauseDescriptor;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("invalid decision for action `{action_id}`: {detail}")]
    InvalidDecision { action_id: ActionId, detail: String },
    #[error("action `{action_id}` was already resolved")]
    AlreadyResolved { action_id: ActionId },
}

/// A pause report the executor emitted without the structure the workflow
/// needs. Fabricating a substitute identifier would silently lose
/// correlation to the paused tool call, so this is an error instead.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("malformed step event: {detail}")]
pub struct MalformedStepEvent {
    pub detail: String,
}

/// What the adapter sends back into the executor to continue a paused run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResumptionPayload {
    /// Approval: the executor continues with the tool call it paused before.
    Continue,
    /// Denial: a correction message addressed to the paused tool call.
    Denial { action_id: ActionId, message: String },
}

impl ResumptionPayload {
    pub fn denial(action_id: ActionId, reason: &str) -> Self {
        Self::Denial {
            action_id,
            message: format!(
                "Action denied by user. Reason: '{reason}'. \
                 Continue assisting, accounting for the user's input."
            ),
        }
    }
}

/// Outcome of reporting a pause to the workflow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PauseOutcome {
    /// A new action is now awaiting a decision.
    Registered(PendingAction),
    /// The currently unresolved action was reported again; nothing changed.
    StillPending(ActionId),
    /// The pause refers to an action that was already resolved; ignored.
    AlreadyRetired(ActionId),
    /// Another action is still unresolved, so this pause is not surfaced.
    Deferred(ActionId),
}

/// Per-session approval bookkeeping: the single unresolved pending action,
/// the set of action ids already presented to the user, and the terminal
/// resolutions of retired actions.
#[derive(Clone, Debug, Default)]
pub struct ApprovalState {
    pending: Option<PendingAction>,
    presented: HashSet<ActionId>,
    resolved: HashMap<ActionId, Decision>,
}

impl ApprovalState {
    pub fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    pub fn resolution(&self, action_id: &ActionId) -> Option<&Decision> {
        self.resolved.get(action_id)
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Record a pause reported by the executor.
    ///
    /// Fails when the descriptor carries no stable action identifier. Pauses
    /// for already-resolved actions are ignored, as is any new pause while
    /// another action is still unresolved (at-most-one invariant). Reporting
    /// the current unresolved action again is a no-op.
    pub fn register_pause(
        &mut self,
        descriptor: PauseDescriptor,
    ) -> Result<PauseOutcome, MalformedStepEvent> {
        let Some(action_id) = descriptor.action_id else {
            return Err(MalformedStepEvent {
                detail: format!(
                    "pause for tool `{}` carries no action identifier",
                    descriptor.tool
                ),
            });
        };

        if self.resolved.contains_key(&action_id) {
            return Ok(PauseOutcome::AlreadyRetired(action_id));
        }

        if let Some(current) = &self.pending {
            if current.id == action_id {
                return Ok(PauseOutcome::StillPending(action_id));
            }
            return Ok(PauseOutcome::Deferred(action_id));
        }

        let action = PendingAction {
            id: action_id,
            tool: descriptor.tool,
            arguments: descriptor.arguments,
        };
        self.pending = Some(action.clone());
        Ok(PauseOutcome::Registered(action))
    }

    /// Yield the unresolved action for rendering, exactly once per action id.
    /// Repeated calls return `None` until a different action registers.
    pub fn present(&mut self) -> Option<PendingAction> {
        let action = self.pending.as_ref()?;
        if self.presented.insert(action.id.clone()) {
            Some(action.clone())
        } else {
            None
        }
    }

    /// Validation phase of `resolve`. Produces the resumption payload without
    /// mutating any state, so a failed dispatch cannot strand the workflow.
    pub fn begin_resolution(
        &self,
        action_id: &ActionId,
        decision: &Decision,
    ) -> Result<ResumptionPayload, ApprovalError> {
        if self.resolved.contains_key(action_id) {
            return Err(ApprovalError::AlreadyResolved { action_id: action_id.clone() });
        }

        match &self.pending {
            Some(current) if current.id == *action_id => {}
            _ => {
                return Err(ApprovalError::InvalidDecision {
                    action_id: action_id.clone(),
                    detail: "no unresolved action with this identifier".to_string(),
                })
            }
        }

        match decision {
            Decision::Approved => Ok(ResumptionPayload::Continue),
            Decision::Denied { reason } if reason.trim().is_empty() => {
                Err(ApprovalError::InvalidDecision {
                    action_id: action_id.clone(),
                    detail: "a denial requires a non-empty reason".to_string(),
                })
            }
            Decision::Denied { reason } => {
                Ok(ResumptionPayload::denial(action_id.clone(), reason))
            }
        }
    }

    /// Mutation phase of `resolve`: retire the action after the resumption
    /// was dispatched. Re-runs the `begin_resolution` guards, so a commit
    /// without a matching begin fails the same way.
    pub fn commit_resolution(
        &mut self,
        action_id: &ActionId,
        decision: Decision,
    ) -> Result<(), ApprovalError> {
        self.begin_resolution(action_id, &decision)?;
        self.pending = None;
        self.resolved.insert(action_id.clone(), decision);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        ApprovalError, ApprovalState, PauseOutcome, ResumptionPayload,
    };
    use crate::domain::action::{ActionId, Decision};
    use crate::domain::step::PauseDescriptor;

    fn descriptor(id: &str, tool: &str) -> PauseDescriptor {
        PauseDescriptor {
            action_id: Some(ActionId(id.to_string())),
            tool: tool.to_string(),
            arguments: json!({"party_size": 2}),
        }
    }

    fn registered(state: &mut ApprovalState, id: &str, tool: &str) -> ActionId {
        match state.register_pause(descriptor(id, tool)).expect("pause should register") {
            PauseOutcome::Registered(action) => action.id,
            other => panic!("expected registration, got {other:?}"),
        }
    }

    #[test]
    fn pause_without_identifier_is_malformed() {
        let mut state = ApprovalState::default();
        let error = state
            .register_pause(PauseDescriptor {
                action_id: None,
                tool: "book_a_cab".to_string(),
                arguments: json!({}),
            })
            .expect_err("missing identifier should be rejected");

        assert!(error.detail.contains("book_a_cab"));
        assert!(state.pending().is_none());
    }

    #[test]
    fn at_most_one_unresolved_action_at_a_time() {
        let mut state = ApprovalState::default();
        registered(&mut state, "p1", "book_a_table");

        let outcome = state.register_pause(descriptor("p2", "book_a_cab")).expect("valid pause");
        assert_eq!(outcome, PauseOutcome::Deferred(ActionId("p2".to_string())));
        assert_eq!(state.pending().map(|action| action.id.0.as_str()), Some("p1"));
    }

    #[test]
    fn re_reporting_the_same_pause_is_a_no_op() {
        let mut state = ApprovalState::default();
        registered(&mut state, "p1", "book_a_table");

        let outcome = state.register_pause(descriptor("p1", "book_a_table")).expect("valid");
        assert_eq!(outcome, PauseOutcome::StillPending(ActionId("p1".to_string())));
    }

    #[test]
    fn present_yields_each_action_exactly_once() {
        let mut state = ApprovalState::default();
        registered(&mut state, "p1", "book_a_table");

        assert!(state.present().is_some());
        assert!(state.present().is_none());
        assert!(state.present().is_none());
    }

    #[test]
    fn approval_produces_continue_payload() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p1", "book_a_table");

        let payload =
            state.begin_resolution(&id, &Decision::Approved).expect("approval should validate");
        assert_eq!(payload, ResumptionPayload::Continue);

        state.commit_resolution(&id, Decision::Approved).expect("commit should succeed");
        assert!(state.pending().is_none());
        assert_eq!(state.resolution(&id), Some(&Decision::Approved));
    }

    #[test]
    fn denial_payload_carries_exact_message_tagged_to_the_action() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p2", "book_a_cab");

        let decision = Decision::Denied { reason: "too expensive".to_string() };
        let payload = state.begin_resolution(&id, &decision).expect("denial should validate");

        match payload {
            ResumptionPayload::Denial { action_id, message } => {
                assert_eq!(action_id, id);
                assert_eq!(
                    message,
                    "Action denied by user. Reason: 'too expensive'. \
                     Continue assisting, accounting for the user's input."
                );
            }
            other => panic!("expected denial payload, got {other:?}"),
        }
    }

    #[test]
    fn denial_without_reason_fails_invalid_decision_and_changes_nothing() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p3", "book_a_cab");

        let decision = Decision::Denied { reason: "".to_string() };
        let error = state.begin_resolution(&id, &decision).expect_err("empty reason must fail");
        assert!(matches!(error, ApprovalError::InvalidDecision { .. }));

        // The action stays unresolved; a later valid decision still works.
        assert_eq!(state.pending().map(|action| action.id.clone()), Some(id.clone()));
        state.commit_resolution(&id, Decision::Approved).expect("still resolvable");
    }

    #[test]
    fn whitespace_only_reason_is_also_invalid() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p3", "book_a_cab");

        let decision = Decision::Denied { reason: "   ".to_string() };
        let error = state.begin_resolution(&id, &decision).expect_err("blank reason must fail");
        assert!(matches!(error, ApprovalError::InvalidDecision { .. }));
    }

    #[test]
    fn duplicate_resolution_fails_already_resolved() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p1", "book_a_table");
        state.commit_resolution(&id, Decision::Approved).expect("first resolution");

        let error = state
            .begin_resolution(&id, &Decision::Approved)
            .expect_err("second resolution must fail");
        assert_eq!(error, ApprovalError::AlreadyResolved { action_id: id });
    }

    #[test]
    fn resolving_an_unknown_action_fails_invalid_decision() {
        let mut state = ApprovalState::default();
        registered(&mut state, "p1", "book_a_table");

        let stranger = ActionId("p9".to_string());
        let error = state
            .begin_resolution(&stranger, &Decision::Approved)
            .expect_err("unknown identifier must fail");
        assert!(matches!(error, ApprovalError::InvalidDecision { .. }));
    }

    #[test]
    fn retired_actions_are_never_re_presented() {
        let mut state = ApprovalState::default();
        let id = registered(&mut state, "p1", "book_a_table");
        state.present();
        state.commit_resolution(&id, Decision::Approved).expect("resolution");

        let outcome = state.register_pause(descriptor("p1", "book_a_table")).expect("valid");
        assert_eq!(outcome, PauseOutcome::AlreadyRetired(id));
        assert!(state.present().is_none());
    }

    #[test]
    fn a_new_action_can_register_after_the_previous_one_resolves() {
        let mut state = ApprovalState::default();
        let first = registered(&mut state, "p1", "book_a_table");
        state.commit_resolution(&first, Decision::Approved).expect("resolution");

        let second = registered(&mut state, "p2", "book_a_cab");
        assert_eq!(state.pending().map(|action| action.id.clone()), Some(second));
        assert!(state.present().is_some());
    }
}
