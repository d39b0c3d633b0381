//! Error responses.
//!
//! Every non-2xx response carries the same JSON body:
//! `{timestamp, status, error, message}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use blink_core::file::FileError;
use blink_shared::AppError;
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

/// Message returned in place of server-side failure detail.
const INTERNAL_MESSAGE: &str = "An internal error occurred. Please try again later.";

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// When the error was produced (RFC 3339).
    pub timestamp: String,
    /// HTTP status code.
    pub status: u16,
    /// HTTP reason phrase.
    pub error: &'static str,
    /// Human readable message.
    pub message: String,
}

/// Handler error; converts into the uniform error response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// 400 with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(AppError::Validation(msg.into()))
    }

    /// Status code this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_client_error() {
            self.0.message().to_string()
        } else {
            // Detail was logged where the failure was detected.
            debug!(code = self.0.error_code(), "Replacing internal error detail");
            INTERNAL_MESSAGE.to_string()
        };

        let body = ErrorBody {
            timestamp: Utc::now().to_rfc3339(),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Error"),
            message,
        };

        (status, Json(body)).into_response()
    }
}
