//! Dispatch-layer errors.

use thiserror::Error;

/// Errors raised by the dispatcher itself, before or instead of fan-out.
///
/// Per-feed delivery failures are not errors at this level; they are folded
/// into the operation's `ExecutionStatus` or read-result sentinels.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The submitted parameters are invalid; nothing was contacted.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// No successful initialization is in effect.
    #[error("the server was not initialized yet")]
    NotInitialized,

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(String),
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Client(e.to_string())
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;
