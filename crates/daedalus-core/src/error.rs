//! Error types for Daedalus handlers.
//!
//! Errors raised inside a handler chain travel as `Err` through every
//! [`Context::next`](crate::Context::next) call until the nearest
//! [`dispatch_error`](crate::dispatch_error) catches them, or until they reach
//! the processor boundary.
//!
//! There are two kinds:
//!
//! | Kind | Raised by | Rendered as |
//! |---|---|---|
//! | [`HandlerError::Status`] | handlers, intentionally | its own status |
//! | [`HandlerError::Unexpected`] | anything else | generic 500 |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`HandlerError`].
pub type HandlerResult<T> = Result<T, HandlerError>;

/// An error raised while processing a request.
///
/// # Example
///
/// ```
/// use daedalus_core::{HandlerError, HandlerResult, StatusError};
///
/// fn lookup(id: &str) -> HandlerResult<u32> {
///     id.parse()
///         .map_err(|_| StatusError::not_found().with_message(format!("No item '{id}'")).into())
/// }
///
/// assert!(lookup("17").is_ok());
/// assert!(matches!(lookup("x"), Err(HandlerError::Status(_))));
/// ```
#[derive(Error, Debug)]
pub enum HandlerError {
    /// An intentional error carrying an HTTP status.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Any other failure.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl HandlerError {
    /// Wraps an arbitrary error as an unexpected failure.
    pub fn unexpected(error: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(error.into())
    }

    /// Returns the status error, if this is one.
    #[must_use]
    pub const fn as_status(&self) -> Option<&StatusError> {
        match self {
            Self::Status(error) => Some(error),
            Self::Unexpected(_) => None,
        }
    }

    /// Returns the HTTP status this error should be rendered with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Status(error) => error.status(),
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An error carrying an HTTP status, a message, optional details and an
/// optional cause.
#[derive(Error, Debug)]
#[error("{status}: {message}")]
pub struct StatusError {
    status: StatusCode,
    message: String,
    details: Option<String>,
    #[source]
    cause: Option<anyhow::Error>,
}

impl StatusError {
    /// Creates a status error whose message is the canonical reason phrase.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: status.canonical_reason().unwrap_or("Error").to_string(),
            details: None,
            cause: None,
        }
    }

    /// 400 Bad Request.
    #[must_use]
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST)
    }

    /// 404 Not Found.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// 405 Method Not Allowed.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED)
    }

    /// 406 Not Acceptable.
    #[must_use]
    pub fn not_acceptable() -> Self {
        Self::new(StatusCode::NOT_ACCEPTABLE)
    }

    /// 413 Payload Too Large.
    #[must_use]
    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE)
    }

    /// 415 Unsupported Media Type.
    #[must_use]
    pub fn unsupported_media_type() -> Self {
        Self::new(StatusCode::UNSUPPORTED_MEDIA_TYPE)
    }

    /// 500 Internal Server Error.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Replaces the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Attaches the underlying cause. Causes are logged, never rendered.
    pub fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Returns the HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the details, if any.
    #[must_use]
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns the cause, if any.
    #[must_use]
    pub const fn cause(&self) -> Option<&anyhow::Error> {
        self.cause.as_ref()
    }

    /// Converts this error to a serializable envelope.
    #[must_use]
    pub fn to_envelope(&self, request_id: Option<&str>) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: status_to_code(self.status),
                message: self.message.clone(),
                details: self.details.clone(),
            },
            request_id: request_id.map(ToString::to_string),
        }
    }
}

/// Maps an HTTP status to a machine-readable error code.
#[must_use]
pub fn status_to_code(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "BAD_REQUEST".to_string(),
        401 => "UNAUTHORIZED".to_string(),
        403 => "FORBIDDEN".to_string(),
        404 => "NOT_FOUND".to_string(),
        405 => "METHOD_NOT_ALLOWED".to_string(),
        406 => "NOT_ACCEPTABLE".to_string(),
        408 => "REQUEST_TIMEOUT".to_string(),
        409 => "CONFLICT".to_string(),
        413 => "PAYLOAD_TOO_LARGE".to_string(),
        415 => "UNSUPPORTED_MEDIA_TYPE".to_string(),
        422 => "UNPROCESSABLE_ENTITY".to_string(),
        429 => "RATE_LIMITED".to_string(),
        500 => "INTERNAL_ERROR".to_string(),
        502 => "BAD_GATEWAY".to_string(),
        503 => "SERVICE_UNAVAILABLE".to_string(),
        504 => "GATEWAY_TIMEOUT".to_string(),
        other => format!("HTTP_{other}"),
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
    /// The request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
