//! The agent executor boundary.
//!
//! The executor itself (graph scheduling, state persistence, interrupt
//! generation) is an external collaborator. This module fixes the interface
//! Dinebot consumes from it: submit a turn, inspect the pause state, resume
//! a paused run.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use dinebot_core::config::ExecutorConfig;
use dinebot_core::{PauseDescriptor, ResumptionPayload, RunHandle, StepEvent};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("executor call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("executor protocol violation: {detail}")]
    Protocol { detail: String },
    #[error("event stream closed before the run completed")]
    Closed,
}

/// A lazy, single-pass, finite sequence of step events. Not restartable: a
/// fresh call to the executor produces a fresh stream. Consumers must drain
/// it fully before considering the turn complete.
#[derive(Debug)]
pub struct TurnStream {
    rx: mpsc::Receiver<Result<StepEvent, ExecutorError>>,
}

impl TurnStream {
    /// Channel-backed stream for producers that emit events incrementally.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<StepEvent, ExecutorError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    /// Stream over an already-materialized event sequence.
    pub fn from_events(events: Vec<StepEvent>) -> Self {
        let (tx, stream) = Self::channel(events.len().max(1));
        for event in events {
            // Capacity covers every event, so try_send cannot fail here.
            let _ = tx.try_send(Ok(event));
        }
        stream
    }

    pub async fn next(&mut self) -> Option<Result<StepEvent, ExecutorError>> {
        self.rx.recv().await
    }
}

/// The sole interface into the external agent-graph executor.
#[async_trait]
pub trait AgentExecutor: Send + Sync {
    /// Submit a new user turn for the session bound to `handle`.
    async fn start_turn(
        &self,
        handle: &RunHandle,
        context: &str,
    ) -> Result<TurnStream, ExecutorError>;

    /// Continue a paused run. Must be called at most once per pending action;
    /// the approval workflow in `dinebot-core` enforces that.
    async fn resume(
        &self,
        handle: &RunHandle,
        payload: ResumptionPayload,
    ) -> Result<TurnStream, ExecutorError>;

    /// Whether the run has steps scheduled but blocked on a human decision.
    async fn pause_state(
        &self,
        handle: &RunHandle,
    ) -> Result<Option<PauseDescriptor>, ExecutorError>;
}

/// HTTP client for a hosted executor. One request per operation; failures
/// are not retried here (they surface to the user as transient, retryable
/// errors).
pub struct HttpAgentExecutor {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct StartTurnRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    events: Vec<StepEvent>,
}

#[derive(Deserialize)]
struct StateResponse {
    pause: Option<PauseDescriptor>,
}

impl HttpAgentExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| ExecutorError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn thread_url(&self, handle: &RunHandle, suffix: &str) -> String {
        format!("{}/threads/{}/{suffix}", self.base_url, handle.thread_id)
    }

    fn map_error(&self, error: reqwest::Error) -> ExecutorError {
        if error.is_timeout() {
            ExecutorError::Timeout { timeout_secs: self.timeout_secs }
        } else {
            ExecutorError::Transport(error.to_string())
        }
    }

    async fn run_request<B: Serialize>(
        &self,
        url: String,
        body: &B,
    ) -> Result<TurnStream, ExecutorError> {
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|error| self.map_error(error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Protocol {
                detail: format!("executor returned {status} for `{url}`"),
            });
        }

        let run: RunResponse = response
            .json()
            .await
            .map_err(|error| ExecutorError::Protocol { detail: error.to_string() })?;

        Ok(TurnStream::from_events(run.events))
    }
}

#[async_trait]
impl AgentExecutor for HttpAgentExecutor {
    async fn start_turn(
        &self,
        handle: &RunHandle,
        context: &str,
    ) -> Result<TurnStream, ExecutorError> {
        let url = self.thread_url(handle, "runs");
        self.run_request(url, &StartTurnRequest { input: context }).await
    }

    async fn resume(
        &self,
        handle: &RunHandle,
        payload: ResumptionPayload,
    ) -> Result<TurnStream, ExecutorError> {
        let url = self.thread_url(handle, "resume");
        self.run_request(url, &payload).await
    }

    async fn pause_state(
        &self,
        handle: &RunHandle,
    ) -> Result<Option<PauseDescriptor>, ExecutorError> {
        let url = self.thread_url(handle, "state");
        let response =
            self.client.get(&url).send().await.map_err(|error| self.map_error(error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::Protocol {
                detail: format!("executor returned {status} for `{url}`"),
            });
        }

        let state: StateResponse = response
            .json()
            .await
            .map_err(|error| ExecutorError::Protocol { detail: error.to_string() })?;

        Ok(state.pause)
    }
}

/// One scripted executor turn: the events it streams and the pause it leaves
/// behind, if any.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTurn {
    pub events: Vec<StepEvent>,
    pub pause_after: Option<PauseDescriptor>,
}

/// Deterministic in-memory executor for tests and offline development.
/// Turns and resumptions are played back in script order; every resumption
/// payload is recorded so tests can assert exactly-once dispatch.
#[derive(Default)]
pub struct ScriptedExecutor {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    resumptions_script: Mutex<VecDeque<ScriptedTurn>>,
    current_pause: Mutex<Option<PauseDescriptor>>,
    received_contexts: Mutex<Vec<String>>,
    dispatched: Mutex<Vec<ResumptionPayload>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_turn(&self, turn: ScriptedTurn) {
        self.turns.lock().expect("script lock").push_back(turn);
    }

    pub fn script_resumption(&self, turn: ScriptedTurn) {
        self.resumptions_script.lock().expect("script lock").push_back(turn);
    }

    /// Every resumption payload dispatched so far, in order.
    pub fn dispatched_resumptions(&self) -> Vec<ResumptionPayload> {
        self.dispatched.lock().expect("dispatch lock").clone()
    }

    /// Contexts received by `start_turn`, in order.
    pub fn received_contexts(&self) -> Vec<String> {
        self.received_contexts.lock().expect("context lock").clone()
    }
}

#[async_trait]
impl AgentExecutor for ScriptedExecutor {
    async fn start_turn(
        &self,
        _handle: &RunHandle,
        context: &str,
    ) -> Result<TurnStream, ExecutorError> {
        self.received_contexts.lock().expect("context lock").push(context.to_string());

        let turn = self
            .turns
            .lock()
            .expect("script lock")
            .pop_front()
            .ok_or(ExecutorError::Closed)?;
        *self.current_pause.lock().expect("pause lock") = turn.pause_after;
        Ok(TurnStream::from_events(turn.events))
    }

    async fn resume(
        &self,
        _handle: &RunHandle,
        payload: ResumptionPayload,
    ) -> Result<TurnStream, ExecutorError> {
        self.dispatched.lock().expect("dispatch lock").push(payload);

        let turn = self
            .resumptions_script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_default();
        *self.current_pause.lock().expect("pause lock") = turn.pause_after;
        Ok(TurnStream::from_events(turn.events))
    }

    async fn pause_state(
        &self,
        _handle: &RunHandle,
    ) -> Result<Option<PauseDescriptor>, ExecutorError> {
        Ok(self.current_pause.lock().expect("pause lock").clone())
    }
}

#[cfg(test)]
mod tests {
    use dinebot_core::{Persona, ResumptionPayload, RunHandle, StepEvent, StepMessage};

    use super::{AgentExecutor, ExecutorError, ScriptedExecutor, ScriptedTurn, TurnStream};

    fn snapshot(content: &str) -> StepEvent {
        StepEvent::for_persona(Persona::General, vec![StepMessage::assistant(content)])
    }

    #[tokio::test]
    async fn turn_stream_is_finite_and_single_pass() {
        let mut stream = TurnStream::from_events(vec![snapshot("one"), snapshot("two")]);

        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn scripted_executor_plays_turns_in_order_and_records_dispatches() {
        let executor = ScriptedExecutor::new();
        executor.script_turn(ScriptedTurn { events: vec![snapshot("hi")], pause_after: None });

        let handle = RunHandle::new();
        let mut stream = executor.start_turn(&handle, "You: hello").await.expect("scripted turn");
        assert!(matches!(stream.next().await, Some(Ok(_))));
        assert!(stream.next().await.is_none());

        assert_eq!(executor.received_contexts(), vec!["You: hello".to_string()]);
        assert!(executor.pause_state(&handle).await.expect("state").is_none());

        executor.resume(&handle, ResumptionPayload::Continue).await.expect("resume");
        assert_eq!(executor.dispatched_resumptions(), vec![ResumptionPayload::Continue]);
    }

    #[tokio::test]
    async fn exhausted_script_reports_closed() {
        let executor = ScriptedExecutor::new();
        let handle = RunHandle::new();

        let error = executor.start_turn(&handle, "context").await.expect_err("empty script");
        assert_eq!(error, ExecutorError::Closed);
    }
}
