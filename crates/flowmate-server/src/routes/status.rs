//! GET /status: configured models and live session count.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(status))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "llm_model": state.llm.model(),
        "embedding_model": state.embedder.model(),
        "vector_backend": state.indexes.backend_name(),
        "active_sessions": state.sessions.len(),
    }))
}
