use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::errors::AglbError;
use crate::validation::{ValidationIssue, ValidationReport};

#[derive(Debug)]
pub enum ApiError {
    /// Every issue found in the payload
    Validation(ValidationReport),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<ValidationIssue>,
    /// Conflicts are safe to retry after re-reading the current state
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match self {
            ApiError::Validation(report) => ErrorBody {
                error: "validation_failed",
                message: format!("{} validation issue(s)", report.len()),
                issues: report.issues,
                retryable: false,
            },
            ApiError::BadRequest(message) => {
                ErrorBody { error: "bad_request", message, issues: Vec::new(), retryable: false }
            }
            ApiError::NotFound(message) => ErrorBody {
                error: "reference_not_found",
                message,
                issues: Vec::new(),
                retryable: false,
            },
            ApiError::Conflict(message) => {
                ErrorBody { error: "conflict", message, issues: Vec::new(), retryable: true }
            }
            ApiError::Internal(message) => {
                ErrorBody { error: "internal_error", message, issues: Vec::new(), retryable: false }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<AglbError> for ApiError {
    fn from(err: AglbError) -> Self {
        match err {
            AglbError::Validation(report) => ApiError::Validation(report),
            AglbError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            AglbError::Conflict { .. } | AglbError::InvalidState { .. } => {
                ApiError::Conflict(err.to_string())
            }
            AglbError::Serialization { context } => ApiError::BadRequest(context),
            AglbError::Database { .. } => {
                tracing::error!(error = %err, "Database failure while serving request");
                ApiError::Internal("database operation failed".to_string())
            }
            AglbError::Config { .. } | AglbError::Io { .. } | AglbError::Internal { .. } => {
                tracing::error!(error = %err, "Internal failure while serving request");
                ApiError::Internal(err.to_string())
            }
        }
    }
}
