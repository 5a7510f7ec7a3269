//! Error types for the eventindex pipeline.

use thiserror::Error;

/// Errors that can occur during indexing.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid sync mode: {0:?}")]
    InvalidSyncMode(String),

    #[error("subscription error for '{kind}': {reason}")]
    Subscription { kind: &'static str, reason: String },

    #[error("indexing cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error came from shutdown, not from a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if retrying the same window can succeed (RPC or
    /// storage hiccups). Configuration errors are not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Storage(_) | Self::Subscription { .. })
    }
}
