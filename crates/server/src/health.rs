use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct HealthState {
    executor_base_url: String,
    sessions: SessionRegistry,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub executor: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(executor_base_url: String, sessions: SessionRegistry) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { executor_base_url, sessions })
}

/// Liveness plus a summary of the configured executor endpoint. The executor
/// is an external service; its reachability is probed per-request by the chat
/// handlers, not re-checked here.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "dinebot-server runtime initialized".to_string(),
        },
        executor: HealthCheck {
            status: "configured",
            detail: format!("executor endpoint `{}`", state.executor_base_url),
        },
        active_sessions: state.sessions.len(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::{health, HealthState};
    use crate::sessions::SessionRegistry;

    #[tokio::test]
    async fn health_reports_ready_and_session_count() {
        let sessions = SessionRegistry::new();
        sessions.create();

        let (status, Json(payload)) = health(State(HealthState {
            executor_base_url: "http://localhost:2024".to_string(),
            sessions,
        }))
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.active_sessions, 1);
        assert!(payload.executor.detail.contains("http://localhost:2024"));
    }
}
