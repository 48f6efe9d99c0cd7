//! HTTP chat front end.
//!
//! Endpoints:
//! - `POST   /sessions`                 — open a conversation (returns the greeting)
//! - `GET    /sessions/{id}`            — transcript plus the pending action, if any
//! - `DELETE /sessions/{id}`            — drop a conversation
//! - `POST   /sessions/{id}/messages`   — submit a user turn
//! - `POST   /sessions/{id}/decision`   — approve or deny the pending action
//!
//! A duplicate decision for an already-retired action is answered with `200`
//! and `status = "already_resolved"`: the client that raced is told the
//! outcome rather than handed an error for a state it cannot fix.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use dinebot_agent::{AgentExecutor, AgentRuntime, TurnOutcome};
use dinebot_core::{
    ApprovalError, ActionId, ChatError, Decision, InterfaceError, PendingAction, Session,
    SessionId, Turn, GREETING,
};

use crate::sessions::SessionRegistry;

pub struct ChatState<E> {
    pub runtime: Arc<AgentRuntime<E>>,
    pub sessions: SessionRegistry,
}

impl<E> Clone for ChatState<E> {
    fn clone(&self) -> Self {
        Self { runtime: Arc::clone(&self.runtime), sessions: self.sessions.clone() }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub action_id: String,
    #[serde(flatten)]
    pub decision: Decision,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub greeting: &'static str,
}

#[derive(Debug, Serialize)]
pub struct TurnView {
    pub role: &'static str,
    pub content: String,
}

impl From<&Turn> for TurnView {
    fn from(turn: &Turn) -> Self {
        Self { role: turn.role.label(), content: turn.content.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct PendingActionView {
    pub action_id: String,
    pub tool: String,
    pub arguments: Value,
    pub prompt: String,
}

impl From<&PendingAction> for PendingActionView {
    fn from(action: &PendingAction) -> Self {
        Self {
            action_id: action.id.to_string(),
            tool: action.tool.clone(),
            arguments: action.arguments.clone(),
            prompt: action.describe(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub created_at: String,
    pub turns: Vec<TurnView>,
    pub pending_action: Option<PendingActionView>,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub status: &'static str,
    pub replies: Vec<String>,
    pub pending_action: Option<PendingActionView>,
}

impl TurnResponse {
    fn from_outcome(status: &'static str, outcome: TurnOutcome) -> Self {
        Self {
            status,
            replies: outcome.replies,
            pending_action: outcome.pending.as_ref().map(PendingActionView::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub session_id: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn session_not_found(id: &SessionId) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ErrorResponse { error: "Unknown session.", session_id: id.to_string() },
        }
    }

    fn bad_request(message: &'static str, id: &SessionId) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse { error: message, session_id: id.to_string() },
        }
    }

    fn from_chat(error: ChatError, id: SessionId) -> Self {
        let interface = error.into_interface(id.to_string());
        let status = match &interface {
            InterfaceError::BadRequest { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        warn!(
            event_name = "server.chat.error",
            session_id = %id,
            error = %interface,
            "chat request failed"
        );

        Self {
            status,
            body: ErrorResponse { error: interface.user_message(), session_id: id.to_string() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn router<E>(state: ChatState<E>) -> Router
where
    E: AgentExecutor + 'static,
{
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/messages", post(post_message))
        .route("/sessions/{id}/decision", post(post_decision))
        .with_state(state)
}

pub async fn create_session<E>(
    State(state): State<ChatState<E>>,
) -> (StatusCode, Json<CreateSessionResponse>)
where
    E: AgentExecutor,
{
    let (id, _session) = state.sessions.create();

    info!(event_name = "server.session.created", session_id = %id, "session created");

    (StatusCode::CREATED, Json(CreateSessionResponse { session_id: id.to_string(), greeting: GREETING }))
}

pub async fn get_session<E>(
    State(state): State<ChatState<E>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, ApiError>
where
    E: AgentExecutor,
{
    let id = SessionId(id);
    let shared = state.sessions.get(&id).ok_or_else(|| ApiError::session_not_found(&id))?;
    let session = shared.lock().await;

    Ok(Json(view_of(&session)))
}

pub async fn delete_session<E>(
    State(state): State<ChatState<E>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
    E: AgentExecutor,
{
    let id = SessionId(id);
    if state.sessions.remove(&id) {
        info!(event_name = "server.session.deleted", session_id = %id, "session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::session_not_found(&id))
    }
}

pub async fn post_message<E>(
    State(state): State<ChatState<E>>,
    Path(id): Path<Uuid>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<TurnResponse>, ApiError>
where
    E: AgentExecutor,
{
    let id = SessionId(id);
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("Message text must not be empty.", &id));
    }

    let shared = state.sessions.get(&id).ok_or_else(|| ApiError::session_not_found(&id))?;
    let mut session = shared.lock().await;

    let outcome = state
        .runtime
        .submit_turn(&mut session, request.text.trim())
        .await
        .map_err(|error| ApiError::from_chat(error, id))?;

    Ok(Json(TurnResponse::from_outcome("ok", outcome)))
}

pub async fn post_decision<E>(
    State(state): State<ChatState<E>>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<TurnResponse>, ApiError>
where
    E: AgentExecutor,
{
    let id = SessionId(id);
    let shared = state.sessions.get(&id).ok_or_else(|| ApiError::session_not_found(&id))?;
    let mut session = shared.lock().await;

    let action_id = ActionId(request.action_id.clone());
    match state.runtime.resolve_pending(&mut session, &action_id, request.decision).await {
        Ok(outcome) => Ok(Json(TurnResponse::from_outcome("ok", outcome))),
        // A duplicate decision is not an error the client can act on; report
        // the settled state instead.
        Err(ChatError::Approval(ApprovalError::AlreadyResolved { action_id })) => {
            info!(
                event_name = "server.approval.duplicate_decision",
                session_id = %id,
                action_id = %action_id,
                "duplicate decision ignored"
            );
            Ok(Json(TurnResponse {
                status: "already_resolved",
                replies: Vec::new(),
                pending_action: None,
            }))
        }
        Err(error) => Err(ApiError::from_chat(error, id)),
    }
}

fn view_of(session: &Session) -> SessionView {
    SessionView {
        session_id: session.id().to_string(),
        created_at: session.created_at().to_rfc3339(),
        turns: session.turns().iter().map(TurnView::from).collect(),
        pending_action: session.approvals().pending().map(PendingActionView::from),
    }
}
