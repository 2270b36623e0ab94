use axum::response::{IntoResponse, Json};
use http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Batch validation failed: {}", .0.join("; "))]
    InvalidBatch(Vec<String>),
    #[error("Not found")]
    NotFound,
    #[error("Version conflict: expected version {expected}, found {actual}")]
    VersionConflict { expected: i32, actual: i32 },
    #[error("Bulk operation partially failed: {succeeded}/{total} succeeded")]
    PartialBulkFailure { succeeded: usize, total: usize },
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidBatch(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::VersionConflict { .. } => StatusCode::CONFLICT,
            AppError::PartialBulkFailure { .. } | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        match self {
            AppError::NotFound => (status, "Portfolio not found").into_response(),
            AppError::Validation(msg) => (status, msg).into_response(),
            AppError::InvalidBatch(errors) => (
                status,
                Json(json!({ "detail": "Batch validation failed", "errors": errors })),
            )
                .into_response(),
            AppError::VersionConflict { .. } => (status, "Version conflict").into_response(),
            e @ AppError::PartialBulkFailure { .. } => (status, e.to_string()).into_response(),
            AppError::Store(_) => (status, "Internal server error").into_response(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PartialFailure { succeeded, total, .. } => {
                AppError::PartialBulkFailure { succeeded, total }
            }
            other => AppError::Store(other),
        }
    }
}

impl From<String> for AppError {
    fn from(value: String) -> Self {
        AppError::Validation(value)
    }
}
