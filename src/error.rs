use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::StoreError;

/// AppError
///
/// The complete failure taxonomy of the service layer. Every variant is a
/// distinct, named outcome: callers can always tell a 404-class result from a
/// 403-class one, and "already enrolled" from a storage outage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Missing or malformed input. Nothing has been written when this is returned.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    DuplicateEmail,
    /// Same outcome for an unknown email and for a wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Missing, malformed, expired or foreign token, or the token's user is gone.
    #[error("authentication required")]
    Unauthenticated,
    #[error("not permitted")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("already enrolled in this course")]
    AlreadyEnrolled,
    #[error("student is not enrolled in this course")]
    NotEnrolled,
    /// A concurrent request changed the state this request relied on.
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Failure of the hashing or token-signing primitives.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    /// Stable machine-readable code used in the JSON error body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::DuplicateEmail => "duplicate_email",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::Unauthenticated => "unauthenticated",
            AppError::Forbidden => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::AlreadyEnrolled => "already_enrolled",
            AppError::NotEnrolled => "not_enrolled",
            AppError::Conflict(_) => "conflict",
            AppError::StorageUnavailable(_) => "storage_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyEnrolled => StatusCode::CONFLICT,
            AppError::NotEnrolled => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::not_found("record"),
            StoreError::AlreadyExists => AppError::DuplicateEmail,
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Unavailable(msg) => AppError::StorageUnavailable(msg),
            StoreError::Malformed(msg) => AppError::Internal(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// ErrorBody
///
/// JSON envelope for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS)]
#[ts(export)]
pub struct ErrorBody {
    #[schema(example = "forbidden")]
    pub code: String,
    #[schema(example = "not permitted")]
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        // Internal details stay in the log.
        let message = match &self {
            AppError::Internal(_) => "internal error".to_string(),
            AppError::StorageUnavailable(_) => "storage unavailable".to_string(),
            other => other.to_string(),
        };

        let body = ErrorBody {
            code: self.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
