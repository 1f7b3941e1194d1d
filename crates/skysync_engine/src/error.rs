//! Error types for the engine.

use skysync_remote::GatewayError;
use skysync_storage::CacheError;
use thiserror::Error;

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in pollers and reconciliation engines.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The local cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A remote operation failed.
    #[error("remote error: {0}")]
    Gateway(#[from] GatewayError),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `start` was called outside a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,
}

impl SyncError {
    /// Returns true if the failure came from the remote side.
    pub fn is_remote(&self) -> bool {
        matches!(self, SyncError::Gateway(_))
    }
}
