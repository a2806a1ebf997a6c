//! Normalized error type for backend calls.

use std::fmt;

use crate::transport::TransportError;

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Classification of a failed call.
///
/// Callers branch on this instead of on transport-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// The server answered with a 4xx/5xx status.
    Server {
        /// HTTP status code.
        status: u16,
    },
    /// No response was received (connection refused, timeout, reset).
    Network,
    /// The request could not be constructed or sent, or its response
    /// could not be interpreted.
    Client,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { status } => write!(f, "server error {status}"),
            Self::Network => f.write_str("network error"),
            Self::Client => f.write_str("client error"),
        }
    }
}

/// A normalized API failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Failure classification.
    pub kind: ApiErrorKind,
    /// Human-readable detail (server-provided when available).
    pub message: String,
}

impl ApiError {
    /// Creates a server-kind error.
    #[must_use]
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Server { status },
            message: message.into(),
        }
    }

    /// Creates a network-kind error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: message.into(),
        }
    }

    /// Creates a client-kind error.
    #[must_use]
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Client,
            message: message.into(),
        }
    }

    /// Returns the HTTP status for server-kind errors.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self.kind {
            ApiErrorKind::Server { status } => Some(status),
            ApiErrorKind::Network | ApiErrorKind::Client => None,
        }
    }

    /// Returns true if repeating the same idempotent request may succeed.
    ///
    /// Network failures and 5xx responses are transient; 4xx responses and
    /// client-side failures are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self.kind {
            ApiErrorKind::Network => true,
            ApiErrorKind::Server { status } => status >= 500,
            ApiErrorKind::Client => false,
        }
    }

    /// Returns true if the server rejected the caller's credentials.
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(self.kind, ApiErrorKind::Server { status: 401 | 403 })
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Build(message) => Self::client(message),
            TransportError::NoResponse(message) => Self::network(message),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        Self::client(format!("invalid URL: {err}"))
    }
}
