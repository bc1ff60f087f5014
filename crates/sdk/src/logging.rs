//! Tracing setup
//!
//! Installs a global subscriber honoring the configured level and
//! format. `BEACON_LOG` overrides the configured level with a full
//! EnvFilter directive. Installing twice is a no-op, so embedders that
//! bring their own subscriber keep it.

use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

use beacon_config::{LogConfig, LogFormat};

/// Environment variable overriding the configured filter.
const LOG_ENV_VAR: &str = "BEACON_LOG";

/// Install the global tracing subscriber for the SDK.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let installed = match config.format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Console => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    if installed.is_err() {
        debug!("a tracing subscriber is already installed");
    }
}
