//! Handler-boundary error: every failure becomes `{success: false, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use flowmate_chat::LlmError;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<flowmate_core::Error> for ApiError {
    fn from(e: flowmate_core::Error) -> Self {
        if e.is_validation() {
            Self::bad_request(e.to_string())
        } else if e.is_remote() {
            Self::new(StatusCode::BAD_GATEWAY, format!("Processing error: {}", e))
        } else {
            Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Processing error: {}", e),
            )
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, e.user_message())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        flowmate_core::Error::from(e).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{} {}", self.status, self.message);
        } else {
            warn!("{} {}", self.status, self.message);
        }
        (
            self.status,
            Json(serde_json::json!({
                "success": false,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
