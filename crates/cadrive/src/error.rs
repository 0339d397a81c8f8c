//! Error types for the drive module

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for drive operations
pub type DriveResult<T> = Result<T, DriveError>;

/// MongoDB server error code for a unique index violation
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Drive module error types
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Folder generation for client {client_id} stopped after {created} folders: {reason}")]
    PartialGeneration {
        client_id: String,
        created: usize,
        reason: String,
    },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DriveError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        DriveError::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Convert to API error code
    pub fn code(&self) -> &'static str {
        match self {
            DriveError::NotFound { .. } => "NOT_FOUND",
            DriveError::Conflict(_) => "CONFLICT",
            DriveError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            DriveError::Validation(_) => "VALIDATION_ERROR",
            DriveError::PartialGeneration { .. } => "PARTIAL_GENERATION",
            DriveError::PermissionDenied(_) => "PERMISSION_DENIED",
            DriveError::Database(_) => "DATABASE_ERROR",
            DriveError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            DriveError::NotFound { .. } => StatusCode::NOT_FOUND,
            DriveError::Conflict(_) => StatusCode::CONFLICT,
            DriveError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DriveError::Validation(_) => StatusCode::BAD_REQUEST,
            DriveError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            DriveError::PartialGeneration { .. }
            | DriveError::Database(_)
            | DriveError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DriveError::NotFound { .. })
    }
}

impl From<mongodb::error::Error> for DriveError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return DriveError::Conflict(err.to_string());
        }
        DriveError::Database(err.to_string())
    }
}

impl From<bson::oid::Error> for DriveError {
    fn from(err: bson::oid::Error) -> Self {
        DriveError::Validation(format!("invalid id: {}", err))
    }
}

impl From<bson::ser::Error> for DriveError {
    fn from(err: bson::ser::Error) -> Self {
        DriveError::Internal(err.to_string())
    }
}

impl From<bson::de::Error> for DriveError {
    fn from(err: bson::de::Error) -> Self {
        DriveError::Internal(err.to_string())
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl IntoResponse for DriveError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
