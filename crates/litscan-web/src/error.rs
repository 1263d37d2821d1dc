//! API errors rendered as `{"error": "..."}` with a matching status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use litscan_tasks::TaskError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 404
    #[error("{0}")]
    NotFound(String),
    /// 400
    #[error("{0}")]
    BadRequest(String),
    /// 409
    #[error("{0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<TaskError> for ApiError {
    fn from(e: TaskError) -> Self {
        let msg = e.to_string();
        match e {
            TaskError::NotFound(_) => ApiError::NotFound(msg),
            TaskError::InvalidParams(_) => ApiError::BadRequest(msg),
            TaskError::InvalidState { .. } | TaskError::NotCompleted(_) => ApiError::Conflict(msg),
            TaskError::Duplicate(_) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
