//! Error types for payload assembly

use thiserror::Error;

/// Result type for payload operations
pub type Result<T> = std::result::Result<T, PayloadError>;

/// Errors that can occur when assembling an event payload
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Caller-supplied timestamp could not be coerced to ISO-8601.
    ///
    /// The track call fails before anything is queued; the common context
    /// is untouched.
    #[error("eventTimestamp is invalid: '{value}' is neither epoch milliseconds nor a date string")]
    InvalidTimestamp {
        /// The rejected input
        value: String,
    },
}

impl PayloadError {
    /// Create an InvalidTimestamp error
    pub fn invalid_timestamp(value: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
        }
    }
}
