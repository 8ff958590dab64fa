//! Error types for the Jasper server

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use jasper_engine::GenerateError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Body returned for a missing or unparseable request
pub const INVALID_PARAMETERS: &str = "invalid parameters";

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Body absent or not a report request
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("Report generation timeout after {0}ms")]
    Timeout(u64),

    /// Engine, IO and other failures; the detail is only logged
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ServerError::InvalidParameters(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    INVALID_PARAMETERS,
                )
                    .into_response();
            }
            ServerError::ReportNotFound(name) => (
                StatusCode::NOT_FOUND,
                "REPORT_NOT_FOUND",
                format!("Report '{}' not found", name),
            ),
            ServerError::Unprocessable(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_REQUEST",
                msg.clone(),
            ),
            ServerError::Timeout(ms) => (
                StatusCode::REQUEST_TIMEOUT,
                "TIMEOUT",
                format!("Report generation timeout after {}ms", ms),
            ),
            ServerError::Internal(detail) => {
                error!("Report generation failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Report generation failed".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<GenerateError> for ServerError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::ReportNotFound(name) => ServerError::ReportNotFound(name),
            GenerateError::TemplateNotFound(path) => {
                error!("Template file missing: {}", path.display());
                ServerError::ReportNotFound(
                    path.file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                )
            }
            err @ (GenerateError::MissingTemplate
            | GenerateError::UnknownConnection(_)
            | GenerateError::InvalidParameter { .. }) => ServerError::Unprocessable(err.to_string()),
            GenerateError::Timeout(ms) => ServerError::Timeout(ms),
            other => ServerError::Internal(other.to_string()),
        }
    }
}
