//! Dinebot Core - conversation state and the approval workflow state machine
//!
//! This crate holds the pure, synchronous heart of Dinebot:
//! - **Domain model** (`domain`) - sessions, turns, personas, pending actions
//! - **Approval workflow** (`approval`) - the state machine that drives a
//!   paused tool call from detected to resolved exactly once
//! - **Response extraction** (`extract`) - pull the latest assistant message
//!   out of an executor step event
//! - **History formatting** (`history`) - render the transcript as agent
//!   context
//! - **Errors** (`errors`) - the taxonomy shared by every front end
//! - **Configuration** (`config`) - TOML file + `DINEBOT_*` env overrides
//!
//! # Safety Principle
//!
//! Sensitive tool calls (cab bookings, table reservations) are NEVER executed
//! on the agent's say-so alone. The executor pauses before them, and only the
//! approval workflow in this crate can release the pause - exactly once, with
//! an explicit human decision.
//!
//! Nothing in this crate performs I/O. The async executor boundary lives in
//! `dinebot-agent`; the HTTP and terminal front ends live in
//! `dinebot-server` and `dinebot-cli`.

pub mod approval;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod history;

pub use approval::{
    ApprovalError, ApprovalState, MalformedStepEvent, PauseOutcome, ResumptionPayload,
};
pub use domain::action::{ActionId, Decision, PendingAction};
pub use domain::session::{Role, RunHandle, Session, SessionId, Turn, GREETING};
pub use domain::step::{MessageAuthor, PauseDescriptor, Persona, StepEvent, StepMessage};
pub use errors::{ChatError, InterfaceError};
