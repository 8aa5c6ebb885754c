//! HTTP route handlers.

pub mod chat;
pub mod download;
pub mod report;
pub mod session;
pub mod status;
pub mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiResult;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .merge(upload::routes())
        .merge(chat::routes())
        .merge(report::routes())
        .merge(session::routes())
        .merge(download::routes())
        .merge(status::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON success or failure body, with the session cookie when one was issued.
pub(crate) fn respond<T: Serialize>(result: ApiResult<T>, set_cookie: Option<String>) -> Response {
    let mut response = match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    if let Some(cookie) = set_cookie {
        if let Ok(value) = cookie.parse::<HeaderValue>() {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
    response
}
