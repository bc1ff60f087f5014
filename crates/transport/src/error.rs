//! Transport error types

use thiserror::Error;

use crate::Method;

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors produced by a transport send.
///
/// Every variant carries enough request metadata (url, method, status) for
/// the caller to log a useful degradation message. Transport errors are
/// always non-fatal to the SDK.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Server answered with a non-2xx status
    #[error("{method} {url} returned status {status}: {body}")]
    Status {
        /// Request URL
        url: String,
        /// Request method
        method: Method,
        /// HTTP status code
        status: u16,
        /// Response body text, or "network failure" when unreadable
        body: String,
    },

    /// Request never completed (DNS, connect, timeout)
    #[error("{method} {url} failed: {message}")]
    Network {
        /// Request URL
        url: String,
        /// Request method
        method: Method,
        /// Underlying error description
        message: String,
    },
}

impl TransportError {
    /// HTTP status code, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network { .. } => None,
        }
    }

    /// Request URL.
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Network { url, .. } => url,
        }
    }
}
