//! Configuration error types

use thiserror::Error;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to parse TOML
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Validation failed. Every violation is collected before this is
    /// returned, so integrators fix their config in one pass.
    #[error("invalid configuration provided: {}", violations.join("; "))]
    Validation {
        /// All collected violations
        violations: Vec<String>,
    },

    /// No endpoint is known for the requested service in this environment
    #[error("no {service} endpoint configured for environment '{environment}'")]
    MissingEndpoint {
        /// Service name (locate, flags, identity, idresolve, logs)
        service: &'static str,
        /// Environment name
        environment: String,
    },
}

impl ConfigError {
    /// Create a Validation error from collected violations
    pub fn validation(violations: Vec<String>) -> Self {
        Self::Validation { violations }
    }

    /// Create a MissingEndpoint error
    pub fn missing_endpoint(service: &'static str, environment: impl Into<String>) -> Self {
        Self::MissingEndpoint {
            service,
            environment: environment.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_joins_violations() {
        let err = ConfigError::validation(vec![
            "please specify your environment".to_string(),
            "please specify your brand".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("environment"));
        assert!(msg.contains("brand"));
        assert!(msg.contains("; "));
    }

    #[test]
    fn test_missing_endpoint_error() {
        let err = ConfigError::missing_endpoint("locate", "DEV");
        assert!(err.to_string().contains("locate"));
        assert!(err.to_string().contains("DEV"));
    }
}
