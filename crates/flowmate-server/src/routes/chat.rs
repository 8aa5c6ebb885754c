//! POST /chat: retrieval-augmented answer with per-session history.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use flowmate_chat::prompts;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::respond;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionHandle;
use crate::state::AppState;

/// Chunks retrieved for a chat answer.
const CHAT_TOP_K: usize = 3;
const CHAT_MAX_TOKENS: usize = 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub has_context: bool,
    pub has_uploaded_file: bool,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let session = state.sessions.resolve(&headers);
    let result = answer(&state, &session.handle, req.query.trim()).await;
    respond(result, session.set_cookie)
}

async fn answer(state: &AppState, session: &SessionHandle, query: &str) -> ApiResult<ChatResponse> {
    if query.is_empty() {
        return Err(ApiError::bad_request("Please enter a question."));
    }

    let mut ctx = session.lock().await;
    let has_uploaded_file = ctx.has_upload();

    let relevant = if has_uploaded_file {
        state
            .indexes
            .similarity_search(&ctx.index_slot, query, CHAT_TOP_K)
            .await
    } else {
        Vec::new()
    };
    let context = relevant.join("\n\n");

    let prompt = prompts::chat_prompt(&ctx.memory.format(), &context, query);
    let completion = state.llm.complete(&prompt, CHAT_MAX_TOKENS).await?;
    info!(
        "Chat answered for session {} ({} context chunks)",
        ctx.id,
        relevant.len()
    );

    ctx.memory.append(query, completion.text.clone());

    Ok(ChatResponse {
        success: true,
        response: completion.text,
        has_context: !relevant.is_empty(),
        has_uploaded_file,
    })
}
