//! Error taxonomy shared by the docdesk crates.

use thiserror::Error;

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, DocdeskError>;

/// Top-level error returned by store operations and account flows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocdeskError {
    /// An operation that needs a signed-in user ran without one.
    #[error("User not authenticated")]
    Unauthenticated,

    /// The remote data service rejected or failed the request.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Caller-supplied input failed a precondition.
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl DocdeskError {
    /// Shorthand for building a [`DocdeskError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        DocdeskError::Validation(message.into())
    }

    /// True for errors caused by the remote service rather than the caller.
    pub fn is_service(&self) -> bool {
        matches!(self, DocdeskError::Service(_))
    }
}

/// Failure reported by a remote data service implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request never got a response (connection refused, timeout, ...).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with an error status.
    #[error("Service rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-style status code reported by the service.
        status: u16,
        /// Message body returned by the service.
        message: String,
    },

    /// The response could not be decoded into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A row that had to exist was missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness or conflict-key constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
}
