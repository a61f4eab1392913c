//! Error types for the document engine.

use crate::schema::ValidationError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in document engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] docbase_storage::StorageError),

    /// JSON encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The document violates the collection schema.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// A unique-field constraint would be violated by the write.
    #[error("unique constraint violation on field '{field}'")]
    UniqueConstraintViolation {
        /// The field carrying the constraint.
        field: String,
    },

    /// The requested document does not exist.
    #[error("document not found: {key} in collection '{collection}'")]
    NotFound {
        /// The collection searched.
        collection: String,
        /// The key that was not found.
        key: String,
    },

    /// A document with the same key already exists.
    #[error("duplicate key: {key}")]
    DuplicateKey {
        /// The conflicting key.
        key: String,
    },

    /// The request body or parameters are not usable.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// Description of the problem.
        message: String,
    },

    /// The tenant is unknown to the engine or soft-deleted.
    #[error("tenant unavailable: {tenant}")]
    TenantUnavailable {
        /// The tenant id.
        tenant: String,
    },
}

impl EngineError {
    /// Creates a unique constraint violation error.
    pub fn unique_violation(field: impl Into<String>) -> Self {
        Self::UniqueConstraintViolation {
            field: field.into(),
        }
    }

    /// Creates a not-found error.
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(key: impl Into<String>) -> Self {
        Self::DuplicateKey { key: key.into() }
    }

    /// Creates a malformed request error.
    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates a tenant unavailable error.
    pub fn tenant_unavailable(tenant: impl Into<String>) -> Self {
        Self::TenantUnavailable {
            tenant: tenant.into(),
        }
    }
}
