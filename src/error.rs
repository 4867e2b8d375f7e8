//! Service error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for request handlers. Each variant
//! maps to a specific HTTP status code and structured JSON error response.
//! [`HubError`] and [`ValidationError`] are the narrower errors produced by
//! the hub and by message validation.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::UserId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1002,
///     "message": "message cannot be empty",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`AppError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The hub control loop is no longer running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The mailbox is closed or the control loop dropped a reply.
    #[error("hub is not running")]
    Closed,
}

/// Message content rejected before it reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Content was empty after trimming.
    #[error("message cannot be empty")]
    MessageEmpty,
    /// Content exceeded the character limit.
    #[error("message must be at most {max} characters")]
    MessageTooLong {
        /// Maximum number of characters.
        max: usize,
    },
    /// Sender and recipient are the same user.
    #[error("cannot message yourself")]
    SelfMessage,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Client          | 400 Bad Request / 401        |
/// | 2000–2999 | Not Found       | 404 Not Found                |
/// | 3000–3999 | Server          | 503 Service Unavailable      |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request could not be parsed or is otherwise malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Message content failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No verified identity accompanied the request.
    #[error("unauthorized")]
    Unauthorized,

    /// Referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// The delivery hub is unavailable.
    #[error("realtime hub unavailable: {0}")]
    Hub(#[from] HubError),
}

impl AppError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Validation(_) => 1002,
            Self::Unauthorized => 1401,
            Self::UserNotFound(_) => 2001,
            Self::Hub(_) => 3001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::Hub(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
