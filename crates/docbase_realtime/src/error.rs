//! Error types for the realtime gateway.

use thiserror::Error;

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur in token handling and fan-out.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The token is malformed, mis-signed, or lacks a permission.
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// Why the token was rejected.
        reason: String,
    },

    /// The token's expiry has passed.
    #[error("token expired")]
    TokenExpired,

    /// Claims encoding or decoding error.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The connection id is not in the table.
    #[error("unknown connection: {id}")]
    UnknownConnection {
        /// The missing connection id.
        id: u64,
    },
}

impl GatewayError {
    /// Creates an invalid-token error.
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }
}
