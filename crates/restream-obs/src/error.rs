//! Error types for the RPC boundary.

use thiserror::Error;

/// Errors surfaced by the remote production tool's RPC session.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// The tool or its websocket endpoint cannot be reached.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The tool answered a request with a false success flag.
    #[error("request '{request}' rejected: {detail}")]
    Rejected {
        /// Name of the rejected request.
        request: String,

        /// Detail text carried in the response payload.
        detail: String,
    },

    /// The event channel to the tool has closed.
    #[error("event channel disconnected")]
    EventChannelClosed,
}

impl RpcError {
    /// Shorthand for a rejection of the named request.
    pub fn rejected(request: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Rejected {
            request: request.into(),
            detail: detail.into(),
        }
    }
}

/// Result alias for RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;
