//! Error classification at the server boundary.

use docbase_core::EngineError;
use docbase_realtime::GatewayError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced to the routing shell.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request body or parameters could not be interpreted.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Token verification or gateway admission failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// An unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Creates an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Engine(engine) => match engine {
                EngineError::Validation(_) | EngineError::MalformedRequest { .. } => 400,
                EngineError::NotFound { .. } => 404,
                EngineError::UniqueConstraintViolation { .. }
                | EngineError::DuplicateKey { .. } => 409,
                EngineError::TenantUnavailable { .. } => 403,
                EngineError::Storage(_) | EngineError::Codec(_) => 500,
            },
            Self::Gateway(gateway) => match gateway {
                GatewayError::InvalidToken { .. } | GatewayError::TokenExpired => 401,
                GatewayError::UnknownConnection { .. } => 400,
                GatewayError::Codec(_) => 500,
            },
            Self::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}
