//! Transport-level failures

use thiserror::Error;

/// Why a single DNS query or HTTP fetch failed
///
/// Implementations map their library errors onto these kinds; the core
/// never sees library-specific error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer did not answer in time
    #[error("timed out")]
    Timeout,

    /// The connection could not be established or was dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// The peer answered with something unusable
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The query completed but produced no records
    #[error("not found: {0}")]
    NotFound(String),
}

impl TransportError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a malformed response error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
