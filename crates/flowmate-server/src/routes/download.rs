//! GET /download/{filename}: serve a generated report.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use flowmate_ingest::sanitize_filename;
use tracing::debug;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/download/{filename}", get(download))
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "File not found." })),
    )
        .into_response()
}

fn content_type(filename: &str) -> &'static str {
    if filename.ends_with(".docx") {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    } else if filename.ends_with(".txt") {
        "text/plain; charset=utf-8"
    } else {
        "application/octet-stream"
    }
}

async fn download(State(state): State<Arc<AppState>>, Path(filename): Path<String>) -> Response {
    let Some(safe) = sanitize_filename(&filename).filter(|s| *s == filename) else {
        debug!("Rejected download name {:?}", filename);
        return not_found();
    };

    let path = state.config.data_paths.downloads.join(&safe);
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type(&safe).to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", safe),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => not_found(),
    }
}
