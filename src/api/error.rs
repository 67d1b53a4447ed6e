//! Unified API error handling.
//!
//! Every endpoint returns errors in one JSON envelope with a
//! machine-readable code and an HTTP status derived from it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::captioner::CaptionerError;
use crate::db::StoreError;
use crate::workflow::WorkflowError;

/// Error codes for API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed input: email, URL, password, missing fields.
    ValidationError,
    /// Uniform login failure. Never distinguishes unknown email from a
    /// wrong password, so the endpoint cannot be used to enumerate
    /// accounts.
    AuthFailure,
    DuplicateEmail,
    CodeMismatch,
    UserNotFound,
    MailDispatchFailure,
    /// Captioning or mail collaborator returned non-success or was
    /// unreachable. Surfaced, never retried.
    UpstreamServiceError,
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::AuthFailure => StatusCode::UNAUTHORIZED,
            ErrorCode::DuplicateEmail => StatusCode::CONFLICT,
            ErrorCode::CodeMismatch => StatusCode::BAD_REQUEST,
            ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ErrorCode::MailDispatchFailure => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::UpstreamServiceError => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::AuthFailure => "auth_failure",
            ErrorCode::DuplicateEmail => "duplicate_email",
            ErrorCode::CodeMismatch => "code_mismatch",
            ErrorCode::UserNotFound => "user_not_found",
            ErrorCode::MailDispatchFailure => "mail_dispatch_failure",
            ErrorCode::UpstreamServiceError => "upstream_service_error",
            ErrorCode::DatabaseError => "database_error",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

/// The inner error object in the response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// The full error response envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Unified API error type
#[derive(Debug)]
pub struct ApiError {
    code: ErrorCode,
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status: code.status_code(),
            code,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    // -------------------------------------------------------------------
    // Convenience constructors
    // -------------------------------------------------------------------

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    /// The one and only login failure. Same code, status and message for
    /// every cause.
    pub fn auth_failure() -> Self {
        Self::new(ErrorCode::AuthFailure, "Invalid credentials")
    }

    pub fn duplicate_email() -> Self {
        Self::new(ErrorCode::DuplicateEmail, "An account with this email already exists")
    }

    pub fn code_mismatch() -> Self {
        Self::new(ErrorCode::CodeMismatch, "Invalid verification code")
    }

    pub fn user_not_found() -> Self {
        Self::new(ErrorCode::UserNotFound, "User not found")
    }

    pub fn mail_dispatch(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MailDispatchFailure, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UpstreamServiceError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let response = ErrorResponse {
            error: ErrorBody {
                code: self.code.as_str().to_string(),
                message: self.message,
            },
        };

        (self.status, Json(response)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for ApiError {}

// -------------------------------------------------------------------------
// Conversions from internal error types
// -------------------------------------------------------------------------

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {}", err);
        ApiError::new(ErrorCode::DatabaseError, "A database error occurred")
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => ApiError::duplicate_email(),
            StoreError::Database(e) => e.into(),
        }
    }
}

impl From<CaptionerError> for ApiError {
    fn from(err: CaptionerError) -> Self {
        tracing::error!("Captioning service error: {}", err);
        ApiError::upstream(err.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::InvalidUrl
            | WorkflowError::NoImage
            | WorkflowError::NoCaptions
            | WorkflowError::NoSelection
            | WorkflowError::SelectionOutOfRange { .. } => ApiError::validation(err.to_string()),
            WorkflowError::Service(e) => e.into(),
        }
    }
}
