//! Error types for the core library.

use autoreply_api::{ApiError, ApiErrorKind};
use thiserror::Error;

use crate::session::storage::StorageError;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No response was received from the backend.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The backend answered with an error status.
    #[error("Server rejected request ({status}): {message}")]
    ServerRejected {
        /// HTTP status code.
        status: u16,
        /// Server-provided detail.
        message: String,
    },

    /// The request could not be built, sent, or interpreted.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The OAuth provider reported a failure or no usable user came back.
    #[error("Sign-in failed: {0}")]
    ProviderAuthFailed(String),

    /// An operation was invoked in a state that forbids it.
    ///
    /// This is a caller bug, not a runtime condition.
    #[error("Invalid local state: {0}")]
    InvalidLocalState(String),

    /// Persisted session storage failed.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        match err.kind {
            ApiErrorKind::Network => Self::NetworkUnreachable(err.message),
            ApiErrorKind::Server { status } => Self::ServerRejected {
                status,
                message: err.message,
            },
            ApiErrorKind::Client => Self::RequestFailed(err.message),
        }
    }
}

impl Error {
    /// Returns true if the backend rejected the session (401/403).
    #[must_use]
    pub const fn is_auth_rejection(&self) -> bool {
        matches!(
            self,
            Self::ServerRejected {
                status: 401 | 403,
                ..
            }
        )
    }

    /// Returns true for contract violations by the caller.
    #[must_use]
    pub const fn is_invalid_local_state(&self) -> bool {
        matches!(self, Self::InvalidLocalState(_))
    }

    /// Sentence suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NetworkUnreachable(_) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::ServerRejected { .. } if self.is_auth_rejection() => {
                "Your session has expired. Please sign in again.".to_string()
            }
            Self::ServerRejected { message, .. } => format!("The server rejected the request: {message}"),
            Self::RequestFailed(message) => format!("The request could not be completed: {message}"),
            Self::ProviderAuthFailed(message) => format!("Sign-in with Google failed: {message}"),
            Self::InvalidLocalState(message) => format!("Action not available: {message}"),
            Self::Storage(_) => "Your session could not be saved on this device.".to_string(),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
