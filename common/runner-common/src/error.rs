//! Error response helpers for HTTP handlers
//!
//! Every failing endpoint answers with a JSON body of the same shape so
//! callers can always read `error`, and read `stderr`/`exit_code` when a
//! subprocess produced them.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Error returned by handlers: a status code plus a JSON body
pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Type alias for handler results
pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            stderr: None,
            stage: None,
            exit_code: None,
        }
    }

    /// Attach the captured stderr of the failing process
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.stderr = Some(stderr.into());
        self
    }

    /// Attach the pipeline stage and exit code that failed
    pub fn with_stage(mut self, stage: impl Into<String>, exit_code: i32) -> Self {
        self.stage = Some(stage.into());
        self.exit_code = Some(exit_code);
        self
    }

    /// Pair this body with a status code
    pub fn into_api_error(self, status: StatusCode) -> ApiError {
        (status, Json(self))
    }
}

/// Create a 400 error with a message
///
/// Use this when the request is missing required input.
pub fn bad_request(message: impl Into<String>) -> ApiError {
    ErrorResponse::new(message).into_api_error(StatusCode::BAD_REQUEST)
}

/// Create a 403 error with a message
pub fn forbidden(message: impl Into<String>) -> ApiError {
    ErrorResponse::new(message).into_api_error(StatusCode::FORBIDDEN)
}

/// Create a 500 error with a message
pub fn internal_error(message: impl Into<String>) -> ApiError {
    ErrorResponse::new(message).into_api_error(StatusCode::INTERNAL_SERVER_ERROR)
}
