//! Error types for the bridge
//!
//! Every failure that reaches the HTTP boundary is rendered as
//! `{"error": {"message", "type", "status"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::translate::TranslateError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// Backend answered with a non-2xx status, or could not be reached.
    #[error("Upstream error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    pub status: u16,
}

impl AppError {
    /// Create an upstream error from a backend status and detail text
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// HTTP status this error renders with
    pub fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                msg.clone(),
            ),
            AppError::Translate(err) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                err.to_string(),
            ),
            AppError::Upstream { status, message } => (
                upstream_status(*status),
                "upstream_error",
                message.clone(),
            ),
            AppError::HttpError(err) => (
                upstream_status(err.status().map(|s| s.as_u16())),
                "upstream_error",
                format!("Backend request failed: {}", err),
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".to_string(),
            ),
        }
    }
}

/// Propagate the backend's status when it is a usable error status, else 500.
fn upstream_status(status: Option<u16>) -> StatusCode {
    status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .filter(|s| s.is_client_error() || s.is_server_error())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref err) = self {
            error!(error = ?err, "Internal error while handling request");
        }

        let (status, error_type, message) = self.parts();

        let body = ErrorResponse {
            error: ErrorBody {
                message,
                error_type: error_type.to_string(),
                status: status.as_u16(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
