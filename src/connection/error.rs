//! Error types for connection management operations.
//!
//! Every mutation either succeeds or returns one of the kinds below.
//! The five user-input kinds are recoverable; persistence failures are
//! folded into [`ConnectionError::StorageUnavailable`] and abort the
//! operation that hit them.

use thiserror::Error;

/// Error type for connection operations.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The viewer tried to relate to their own account.
    #[error("Cannot create a relationship with yourself: {0}")]
    SelfRelation(String),

    /// The target account does not exist in the account directory.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// An edge already exists for the pair, pending or connected.
    #[error("Connection already requested between {from} and {to}")]
    DuplicateRequest {
        /// Account that attempted the request.
        from: String,
        /// Account the request was aimed at.
        to: String,
    },

    /// There is no pending request from `from` to `to`.
    #[error("No pending request from {from} to {to}")]
    NoPendingRequest {
        /// Expected requester.
        from: String,
        /// Expected recipient (the viewer).
        to: String,
    },

    /// The pair is not in the state the close friend operation needs.
    #[error("{viewer} is not connected with {other}")]
    NotConnected {
        /// Account performing the operation.
        viewer: String,
        /// Account being annotated.
        other: String,
    },

    /// Storage operation failed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Configuration could not be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Fieldless discriminant of [`ConnectionError`].
///
/// Lets callers map errors to messages without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ConnectionError::SelfRelation`].
    SelfRelation,
    /// See [`ConnectionError::UnknownUser`].
    UnknownUser,
    /// See [`ConnectionError::DuplicateRequest`].
    DuplicateRequest,
    /// See [`ConnectionError::NoPendingRequest`].
    NoPendingRequest,
    /// See [`ConnectionError::NotConnected`].
    NotConnected,
    /// See [`ConnectionError::StorageUnavailable`].
    StorageUnavailable,
    /// See [`ConnectionError::InvalidConfig`].
    InvalidConfig,
}

impl ConnectionError {
    /// Returns the kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SelfRelation(_) => ErrorKind::SelfRelation,
            Self::UnknownUser(_) => ErrorKind::UnknownUser,
            Self::DuplicateRequest { .. } => ErrorKind::DuplicateRequest,
            Self::NoPendingRequest { .. } => ErrorKind::NoPendingRequest,
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Returns whether the error was caused by user input rather than
    /// a storage or setup failure.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::StorageUnavailable(_) | Self::InvalidConfig(_))
    }

    pub(crate) fn duplicate(from: &str, to: &str) -> Self {
        Self::DuplicateRequest {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn no_pending(from: &str, to: &str) -> Self {
        Self::NoPendingRequest {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub(crate) fn not_connected(viewer: &str, other: &str) -> Self {
        Self::NotConnected {
            viewer: viewer.to_string(),
            other: other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for ConnectionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// Result type alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
