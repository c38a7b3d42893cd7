//! Error types for the tryout-link client.
//!
//! Every fallible operation returns [`TryoutLinkError`]. Errors are `Clone` so a
//! single in-flight refresh or query can hand the same failure to every waiter.

use crate::models::{ErrorEnvelope, FieldError};
use std::fmt;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, TryoutLinkError>;

/// Errors that can occur while talking to the platform API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TryoutLinkError {
    /// Connection refused, DNS failure, broken pipe, etc.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Invalid client configuration (missing base URL, bad config file, ...).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Response body could not be (de)serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Persisted token storage could not be read or written.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The refresh token was missing, expired or rejected. The session has
    /// been cleared.
    #[error("Session expired")]
    SessionExpired,

    /// Non-success response from the backend.
    #[error("{0}")]
    Api(ApiError),

    /// A background refresh or fetch task stopped before producing a result.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Error reported by the backend through the failure envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status_code: u16,
    pub message: String,
    pub error_code: Option<String>,
    pub errors: Vec<FieldError>,
}

impl ApiError {
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            error_code: None,
            errors: Vec::new(),
        }
    }

    /// Build from a decoded failure envelope.
    pub fn from_envelope(status_code: u16, envelope: ErrorEnvelope) -> Self {
        Self {
            status_code,
            message: envelope
                .message
                .unwrap_or_else(|| default_message(status_code).to_string()),
            error_code: envelope.error_code,
            errors: envelope.errors.unwrap_or_default(),
        }
    }

    /// Build from a raw body that is not a valid envelope.
    pub fn from_body(status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::from_envelope(status_code, envelope),
            Err(_) => {
                let trimmed = body.trim();
                let message = if trimmed.is_empty() {
                    default_message(status_code).to_string()
                } else {
                    trimmed.to_string()
                };
                Self::new(status_code, message)
            },
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Server error ({}): {}", self.status_code, self.message)
    }
}

fn default_message(status_code: u16) -> &'static str {
    match status_code {
        400 => "Bad request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not found",
        409 => "Conflict",
        422 => "Validation failed",
        429 => "Too many requests",
        500..=599 => "Server error",
        _ => "Request failed",
    }
}

/// Coarse classification used by callers to pick a presentation and by the
/// query layer to decide whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Field-level messages to show next to form inputs.
    Validation,
    /// 401 or an expired session.
    Unauthorized,
    /// 403, shown as a permission notice.
    Forbidden,
    /// 409, e.g. duplicate email or title.
    Conflict,
    /// 404, rendered as an empty/absent state.
    NotFound,
    /// 429
    RateLimited,
    /// Network, timeout and 5xx failures.
    Transient,
    Other,
}

impl TryoutLinkError {
    /// HTTP status of the failed response, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => Some(err.status_code),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkError(_) | Self::TimeoutError(_) => ErrorKind::Transient,
            Self::SessionExpired => ErrorKind::Unauthorized,
            Self::Api(err) => match err.status_code {
                401 => ErrorKind::Unauthorized,
                403 => ErrorKind::Forbidden,
                404 => ErrorKind::NotFound,
                409 => ErrorKind::Conflict,
                429 => ErrorKind::RateLimited,
                400 | 422 => ErrorKind::Validation,
                500..=599 => ErrorKind::Transient,
                _ if !err.errors.is_empty() => ErrorKind::Validation,
                _ => ErrorKind::Other,
            },
            Self::ConfigurationError(_)
            | Self::SerializationError(_)
            | Self::StorageError(_)
            | Self::Cancelled => ErrorKind::Other,
        }
    }

    /// Whether the query layer may retry the operation.
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Validation errors returned by the backend, empty for other errors.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Api(err) => &err.errors,
            _ => &[],
        }
    }
}

impl From<ApiError> for TryoutLinkError {
    fn from(err: ApiError) -> Self {
        Self::Api(err)
    }
}

impl From<reqwest::Error> for TryoutLinkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::TimeoutError(err.to_string())
        } else if err.is_decode() {
            Self::SerializationError(err.to_string())
        } else {
            Self::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TryoutLinkError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for TryoutLinkError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
