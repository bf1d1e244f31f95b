//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::JobError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::Conflict(msg) => msg,
            ApiError::ServiceUnavailable(msg) => {
                tracing::warn!("Rejecting request: {}", msg);
                msg
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let message = err.to_string();
        match err {
            JobError::NotFound(_) => ApiError::NotFound(message),
            JobError::NotRunning { .. } => ApiError::Conflict(message),
            JobError::ValidationError(_) => ApiError::BadRequest(message),
            JobError::Unavailable(_) => ApiError::ServiceUnavailable(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
