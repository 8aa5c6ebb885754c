//! POST /upload: store a document, extract, chunk, embed, index.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::post;
use axum::Router;
use flowmate_core::Error;
use flowmate_ingest::{claim_unique_path, extract_text, sanitize_filename, split_text, FileType};
use flowmate_store::ChunkMetadata;
use serde::Serialize;
use tracing::{info, warn};

use super::respond;
use crate::error::{ApiError, ApiResult};
use crate::session::SessionHandle;
use crate::state::AppState;

/// Minimum extracted text length, in trimmed chars.
const MIN_TEXT_CHARS: usize = 10;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/upload", post(upload))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    /// Stored file name inside the uploads directory.
    pub file_path: String,
    pub chunks_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_chunks: Option<usize>,
}

struct IncomingFile {
    name: String,
    bytes: axum::body::Bytes,
}

async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let session = state.sessions.resolve(&headers);
    let result = handle_upload(&state, &session.handle, multipart).await;
    respond(result, session.set_cookie)
}

async fn handle_upload(
    state: &AppState,
    session: &SessionHandle,
    multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let file = read_file_field(multipart).await?;
    let stored_name = validate(&file, state.config.max_upload_bytes)?;

    let uploads = state.config.data_paths.uploads.clone();
    let path = tokio::task::spawn_blocking(move || claim_unique_path(&uploads, &stored_name))
        .await
        .map_err(|e| Error::Internal(format!("upload naming task failed: {}", e)))??;
    if let Err(e) = tokio::fs::write(&path, &file.bytes).await {
        if let Err(rm) = tokio::fs::remove_file(&path).await {
            warn!("Failed to release upload name {}: {}", path.display(), rm);
        }
        return Err(e.into());
    }
    let stored_name = file_name_of(&path);
    info!("Upload saved: {} ({} bytes)", stored_name, file.bytes.len());

    match process(state, session, &path, &stored_name).await {
        Ok(response) => Ok(response),
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove rejected upload {}: {}", path.display(), rm);
            }
            Err(e)
        }
    }
}

async fn read_file_field(mut multipart: Multipart) -> ApiResult<IncomingFile> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        let Some(field) = field else {
            return Err(ApiError::bad_request("No file was uploaded."));
        };
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        return Ok(IncomingFile { name, bytes });
    }
}

/// Check the incoming file and return its sanitised name.
fn validate(file: &IncomingFile, max_bytes: usize) -> ApiResult<String> {
    if file.name.trim().is_empty() {
        return Err(ApiError::bad_request("No file was selected."));
    }
    if !FileType::from_path(Path::new(&file.name)).is_supported() {
        return Err(ApiError::bad_request(format!(
            "Unsupported file type. Supported types: {}",
            flowmate_ingest::ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if file.bytes.len() > max_bytes {
        return Err(ApiError::bad_request(format!(
            "File is too large ({} MiB limit).",
            max_bytes / (1024 * 1024)
        )));
    }
    sanitize_filename(&file.name).ok_or_else(|| ApiError::bad_request("Invalid file name."))
}

async fn process(
    state: &AppState,
    session: &SessionHandle,
    path: &Path,
    stored_name: &str,
) -> ApiResult<UploadResponse> {
    let owned: PathBuf = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || extract_text(&owned))
        .await
        .map_err(|e| Error::Internal(format!("extraction task failed: {}", e)))??;

    if text.trim().chars().count() < MIN_TEXT_CHARS {
        return Err(ApiError::bad_request(
            "Could not extract enough text from the file.",
        ));
    }
    info!("Extracted {} chars from {}", text.chars().count(), stored_name);

    let chunks = split_text(&text, &state.chunking);
    drop(text);
    if chunks.is_empty() {
        return Err(ApiError::bad_request("The text could not be split into chunks."));
    }
    let total = chunks.len();

    let mut ctx = session.lock().await;
    let metadata: Vec<ChunkMetadata> = (0..total)
        .map(|chunk_id| ChunkMetadata {
            source: stored_name.to_string(),
            chunk_id,
            total_chunks: total,
            session_id: ctx.id.clone(),
        })
        .collect();
    let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();

    let session_id = ctx.id.clone();
    let report = match state
        .indexes
        .add_documents(&mut ctx.index_slot, Some(&session_id), &texts, &metadata)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            // The previous index is gone by now, so the previous file is too.
            ctx.uploaded_file = None;
            return Err(e.into());
        }
    };
    ctx.uploaded_file = Some(stored_name.to_string());
    info!(
        "Indexed {} into {} ({} chunks, {} degraded)",
        stored_name, report.index_name, report.vectors, report.degraded
    );

    Ok(UploadResponse {
        success: true,
        message: format!("{} uploaded ({} chunks created)", stored_name, total),
        file_path: stored_name.to_string(),
        chunks_count: total,
        degraded_chunks: (report.degraded > 0).then_some(report.degraded),
    })
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
