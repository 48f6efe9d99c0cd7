//! Agent Runtime - the async boundary between Dinebot and its collaborators
//!
//! This crate is the only caller of the external agent-graph executor. It
//! provides:
//! - **Executor boundary** (`executor`) - the `AgentExecutor` trait, the
//!   HTTP client against the hosted executor, and a scripted in-memory
//!   executor for tests
//! - **Runtime** (`runtime`) - `AgentRuntime`, which drives a session
//!   through user turns and approval resolutions using the state machine in
//!   `dinebot-core`
//! - **Retrieval** (`retrieval`) - the RAG document-store boundary used by
//!   the `answer_question` tool
//! - **Tools** (`tools`) - the tool trait, registry, and Dinebot's stubs
//! - **LLM seam** (`llm`) - the pluggable completion client
//!
//! # Architecture
//!
//! ```text
//! user text -> AgentRuntime.submit_turn -> AgentExecutor.start_turn
//!                  |                             |
//!                  v                             v
//!            drain StepEvents  <----------  TurnStream
//!                  |
//!                  v
//!            pause_state? -> ApprovalState.register_pause/present
//!                  |
//!        user decision -> begin_resolution -> resume (exactly once) -> commit
//! ```
//!
//! Resumption dispatch is deliberately sandwiched between the validation and
//! commit phases of the core state machine, so a failed executor call leaves
//! the pending action unresolved and retryable.

pub mod executor;
pub mod llm;
pub mod retrieval;
pub mod runtime;
pub mod tools;

pub use executor::{AgentExecutor, ExecutorError, HttpAgentExecutor, ScriptedExecutor, TurnStream};
pub use runtime::{AgentRuntime, RuntimeOptions, TurnOutcome};
