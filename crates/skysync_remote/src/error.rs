//! Error types for remote store and gateway operations.

use std::fmt;
use thiserror::Error;

/// Result type for raw store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Classification of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// The store could not be reached.
    Network,
    /// The record does not exist.
    NotFound,
    /// The server copy changed since it was fetched.
    ServerRecordChanged,
    /// The server refused the write.
    Rejected,
    /// A continuation cursor is unknown or expired.
    InvalidCursor,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::Network => "network unavailable",
            StoreErrorKind::NotFound => "record not found",
            StoreErrorKind::ServerRecordChanged => "server record changed",
            StoreErrorKind::Rejected => "rejected",
            StoreErrorKind::InvalidCursor => "invalid cursor",
        };
        f.write_str(name)
    }
}

/// An error reported by a [`crate::RemoteStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    /// What went wrong.
    pub kind: StoreErrorKind,
    /// Human readable detail.
    pub message: String,
}

impl StoreError {
    /// Creates an error of the given kind.
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Network, message)
    }

    /// Creates a not-found error for a record.
    pub fn not_found(id: impl fmt::Display) -> Self {
        Self::new(StoreErrorKind::NotFound, id.to_string())
    }

    /// Creates a stale-version error for a record.
    pub fn server_record_changed(id: impl fmt::Display) -> Self {
        Self::new(StoreErrorKind::ServerRecordChanged, id.to_string())
    }

    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Rejected, message)
    }

    /// Creates an invalid-cursor error.
    pub fn invalid_cursor(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::InvalidCursor, message)
    }

    /// Returns true if repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            StoreErrorKind::Network | StoreErrorKind::ServerRecordChanged
        )
    }
}

/// Errors surfaced by [`crate::RemoteGateway`].
///
/// Connectivity failures wrap the underlying [`StoreError`]. Parse failures
/// name the record type that could not be rebuilt.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Writing a new record failed.
    #[error("could not create record: {0}")]
    CreateFailed(#[source] StoreError),

    /// Deleting a record failed.
    #[error("could not delete record: {0}")]
    DeleteFailed(#[source] StoreError),

    /// Updating a single property failed.
    #[error("could not update record: {0}")]
    UpdateFailed(#[source] Box<GatewayError>),

    /// Saving a record failed.
    #[error("could not save record: {0}")]
    SaveFailed(#[source] StoreError),

    /// A batched write failed, wholesale or for one item.
    #[error("could not save records: {0}")]
    BatchSaveFailed(#[source] StoreError),

    /// The store's response to a create could not be parsed.
    #[error("created record could not be read back as {record_type}")]
    CreatedRecordInvalid {
        /// Expected record type.
        record_type: &'static str,
    },

    /// The store's response to a save could not be parsed.
    #[error("saved record could not be read back as {record_type}")]
    SavedRecordInvalid {
        /// Expected record type.
        record_type: &'static str,
    },

    /// Fetching records failed.
    #[error("could not fetch records: {0}")]
    FetchFailed(#[source] StoreError),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl GatewayError {
    /// Returns the store error at the root of this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            GatewayError::CreateFailed(e)
            | GatewayError::DeleteFailed(e)
            | GatewayError::SaveFailed(e)
            | GatewayError::BatchSaveFailed(e)
            | GatewayError::FetchFailed(e) => Some(e),
            GatewayError::UpdateFailed(inner) => inner.store_error(),
            _ => None,
        }
    }
}
