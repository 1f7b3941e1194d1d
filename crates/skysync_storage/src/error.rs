//! Error types for cache operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process or handle holds the cache directory.
    #[error("cache directory is locked: {}", path.display())]
    Locked {
        /// The locked directory.
        path: PathBuf,
    },

    /// The path exists but is not a directory.
    #[error("not a cache directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// The cache file could not be decoded.
    #[error("cache corrupted: {0}")]
    Corrupted(String),

    /// A model could not be encoded.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The cache file was written by an incompatible version.
    #[error("unsupported cache format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version found on disk.
        found: u16,
        /// Version this build writes.
        expected: u16,
    },
}
