//! Session teardown: POST /cleanup_session and POST /restart_session.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use serde::Serialize;
use tracing::info;

use super::respond;
use crate::error::ApiResult;
use crate::session::{session_cookie, session_id_from_headers};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cleanup_session", post(cleanup_session))
        .route("/restart_session", post(restart_session))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Remove the caller's session, if any, and delete its index.
async fn end_session(state: &AppState, headers: &HeaderMap) {
    let Some(id) = session_id_from_headers(headers) else {
        return;
    };
    if let Some(session) = state.sessions.remove(&id) {
        state.close_session(&session).await;
        info!("Session {} ended", id);
    }
}

async fn cleanup_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    end_session(&state, &headers).await;
    let result: ApiResult<SessionResponse> = Ok(SessionResponse {
        success: true,
        message: "Session cleaned up.".into(),
        session_id: None,
    });
    respond(result, None)
}

async fn restart_session(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    end_session(&state, &headers).await;
    let fresh = state.sessions.create();
    info!("Session {} started", fresh.id());

    let result: ApiResult<SessionResponse> = Ok(SessionResponse {
        success: true,
        message: "A new session has started.".into(),
        session_id: Some(fresh.id().to_string()),
    });
    respond(result, Some(session_cookie(fresh.id())))
}
