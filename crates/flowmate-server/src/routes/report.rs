//! POST /generate_report: one-minute speech as DOCX or TXT.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use flowmate_chat::prompts::{self, DEFAULT_REPORT_QUERY, NO_CONTEXT_NOTICE};
use flowmate_core::Error;
use flowmate_report::{choose_content, write_report, ReportFormat, FALLBACK_SEARCH_QUERY};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::respond;
use crate::error::ApiResult;
use crate::session::SessionHandle;
use crate::state::AppState;

/// Chunks retrieved for a report.
const REPORT_TOP_K: usize = 5;
const REPORT_MAX_TOKENS: usize = 1024;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/generate_report", post(generate_report))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub success: bool,
    pub content: String,
    pub download_url: String,
    pub filename: String,
}

async fn generate_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ReportRequest>,
) -> Response {
    let session = state.sessions.resolve(&headers);
    let result = build_report(&state, &session.handle, req).await;
    respond(result, session.set_cookie)
}

async fn build_report(
    state: &AppState,
    session: &SessionHandle,
    req: ReportRequest,
) -> ApiResult<ReportResponse> {
    let format = match req.format.as_deref() {
        Some(raw) => raw.parse::<ReportFormat>()?,
        None => ReportFormat::default(),
    };
    let query = req
        .query
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REPORT_QUERY.to_string());

    let ctx = session.lock().await;
    let mut relevant = state
        .indexes
        .similarity_search(&ctx.index_slot, &query, REPORT_TOP_K)
        .await;
    if relevant.is_empty() && ctx.has_upload() {
        relevant = state
            .indexes
            .similarity_search(&ctx.index_slot, FALLBACK_SEARCH_QUERY, REPORT_TOP_K)
            .await;
    }
    info!("Report for session {}: {} context chunks", ctx.id, relevant.len());

    let context = if relevant.is_empty() {
        NO_CONTEXT_NOTICE.to_string()
    } else {
        relevant.join("\n\n")
    };

    let prompt = prompts::speech_prompt(&context, &query);
    let generated = match state.llm.complete(&prompt, REPORT_MAX_TOKENS).await {
        Ok(completion) => Some(completion.text),
        Err(e) => {
            warn!("Report generation failed, using fallback: {}", e);
            None
        }
    };
    let content = choose_content(generated.as_deref(), ctx.uploaded_file.as_deref(), &context);
    drop(ctx);
    if content.used_fallback {
        info!("Report uses the fallback template");
    }

    let downloads = state.config.data_paths.downloads.clone();
    let text = content.text.clone();
    let (filename, _) = tokio::task::spawn_blocking(move || write_report(format, &text, &downloads))
        .await
        .map_err(|e| Error::Internal(format!("report writer task failed: {}", e)))??;

    Ok(ReportResponse {
        success: true,
        content: content.text,
        download_url: format!("/download/{}", filename),
        filename,
    })
}
