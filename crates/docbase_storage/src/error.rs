//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A key already exists and the write mode forbids overwriting it.
    #[error("key already exists: {key}")]
    KeyExists {
        /// The conflicting key.
        key: String,
    },

    /// The data log is corrupted.
    #[error("data log corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the data directory lock.
    #[error("data directory is locked by another process")]
    DirectoryLocked,

    /// The given path cannot be used as a data directory.
    #[error("invalid data directory: {0}")]
    InvalidDirectory(String),
}

impl StorageError {
    /// Creates a `Corrupted` error.
    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Creates a `KeyExists` error.
    pub fn key_exists(key: impl Into<String>) -> Self {
        Self::KeyExists { key: key.into() }
    }

    /// Creates an `InvalidDirectory` error.
    pub fn invalid_directory(msg: impl Into<String>) -> Self {
        Self::InvalidDirectory(msg.into())
    }
}
