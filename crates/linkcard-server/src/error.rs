use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use linkcard_shared::AccessError;

/// Every failure an HTTP handler can return.  This is the only place errors
/// become status codes; bodies are `{"error": "<code>"}`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    Validation(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(&'static str),

    #[error("Upload too large (max {max} bytes)")]
    UploadTooLarge { max: usize },

    #[error("Media storage error: {0}")]
    MediaStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Validation(code) => (StatusCode::BAD_REQUEST, *code),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid_credentials"),
            ServerError::Forbidden(code) => (StatusCode::FORBIDDEN, *code),
            ServerError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            ServerError::Conflict(code) => (StatusCode::CONFLICT, *code),
            ServerError::UploadTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "upload_too_large"),
            ServerError::MediaStorage(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl From<AccessError> for ServerError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Validation { code } => ServerError::Validation(code),
            AccessError::NotFound => ServerError::NotFound,
            AccessError::Conflict { code } => ServerError::Conflict(code),
            AccessError::Unauthorized => ServerError::Unauthorized,
            AccessError::Forbidden { code } => ServerError::Forbidden(code),
            AccessError::Internal(msg) => ServerError::Internal(msg),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
