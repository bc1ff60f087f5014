//! SDK initialization errors

use thiserror::Error;

/// Result type for SDK initialization
pub type Result<T> = std::result::Result<T, InitError>;

/// Errors that reject initialization outright.
///
/// Everything else (geolocation, flag fetch, identity, consent
/// frameworks) degrades with a log line instead of failing init.
#[derive(Debug, Error)]
pub enum InitError {
    /// The supplied configuration is unusable
    #[error(transparent)]
    Config(#[from] beacon_config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_passes_through() {
        let err: InitError =
            beacon_config::ConfigError::validation(vec!["please specify your brand".to_string()])
                .into();
        assert!(err.to_string().contains("brand"));
    }
}
