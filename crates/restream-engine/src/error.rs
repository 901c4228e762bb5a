//! Error types for the engine.

use restream_obs::RpcError;
use thiserror::Error;

/// Errors raised while driving one production-tool instance.
#[derive(Debug, Clone, Error)]
pub enum ControlError {
    /// The remote tool or peer process cannot be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote tool rejected a specific request.
    #[error("{0}")]
    RpcRejected(RpcError),

    /// Malformed or missing required parameter.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Operation invoked before a successful initialize.
    #[error("the server was not initialized yet")]
    NotInitialized,

    /// Referenced media file or feed tag is absent.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<RpcError> for ControlError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Connection(detail) => Self::Connection(detail),
            other => Self::RpcRejected(other),
        }
    }
}

/// Result alias for engine operations.
pub type ControlResult<T> = Result<T, ControlError>;
