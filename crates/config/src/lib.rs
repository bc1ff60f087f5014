//! Beacon SDK configuration
//!
//! A flat options object supplied by the integrator, plus the
//! per-environment endpoint table and logging settings. Two fields are
//! required: the deployment environment and the brand identifier.
//! Validation collects every violation before failing so a misconfigured
//! integration is fixed in one pass.
//!
//! Configuration can be built programmatically or parsed from TOML:
//!
//! ```
//! use beacon_config::SdkConfig;
//! use std::str::FromStr;
//!
//! let config = SdkConfig::from_str(r#"
//! environment = "PROD"
//! brand = "example-news"
//! sub_brand = "sports"
//! "#).unwrap();
//! assert_eq!(config.brand, "example-news");
//! ```

mod endpoints;
mod environment;
mod error;
mod logging;

pub use endpoints::{Endpoints, ServiceUrls};
pub use environment::Environment;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One year in milliseconds, the default cookie lifetime.
const DEFAULT_COOKIE_EXPIRES_MS: u64 = 31_536_000_000;

/// One content metadata descriptor: where to find a named property on the
/// host page, statically and per pubsub topic payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct MetadataDescriptor {
    /// Property name in the emitted metadata object
    pub name: String,
    /// Dotted lookup paths into the host's static page data
    pub static_locations: Vec<String>,
    /// Dotted lookup paths into dynamic (pubsub-fed) data
    pub dynamic_locations: Vec<String>,
}

/// Content metadata descriptors, split by content type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContentMetadataConfig {
    /// Page-level descriptors
    pub page: Vec<MetadataDescriptor>,
    /// Video-level descriptors
    pub video: Vec<MetadataDescriptor>,
}

/// Pubsub topics to subscribe to, split by content type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Topics {
    /// Page topics
    pub page: Vec<String>,
    /// Video topics
    pub video: Vec<String>,
}

/// SDK configuration.
///
/// `environment` and `brand` are required; everything else has documented
/// defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Deployment environment (required)
    pub environment: Option<Environment>,

    /// Brand identifier (required)
    pub brand: String,

    /// Platform the events originate from. Default: "web"
    pub platform: String,

    /// Sub-brand identifier
    pub sub_brand: String,

    /// Product name
    pub product_name: String,

    /// Cookie domain for persisted identifiers
    pub cookie_domain: Option<String>,

    /// Cookie SameSite attribute. Default: "Lax"
    pub cookie_same_site: String,

    /// Cookie Secure attribute. Default: false
    pub cookie_secure: bool,

    /// Cookie lifetime in milliseconds. Default: one year
    pub cookie_expires_ms: u64,

    /// Country code override; skips geolocation when set to a non-CCPA code
    pub country_code: Option<String>,

    /// Content metadata descriptors
    pub content_metadata: ContentMetadataConfig,

    /// Pubsub topics to track
    pub topics: Topics,

    /// Whether telemetry events are emitted at all. Default: true
    pub telemetry_enabled: bool,

    /// Telemetry schema version reported in payloads
    pub telemetry_schema_version: Option<String>,

    /// Player name reported for video telemetry
    pub telemetry_player_name: Option<String>,

    /// Endpoint table
    pub endpoints: Endpoints,

    /// Logging settings
    pub log: LogConfig,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            environment: None,
            brand: String::new(),
            platform: "web".to_string(),
            sub_brand: String::new(),
            product_name: String::new(),
            cookie_domain: None,
            cookie_same_site: "Lax".to_string(),
            cookie_secure: false,
            cookie_expires_ms: DEFAULT_COOKIE_EXPIRES_MS,
            country_code: None,
            content_metadata: ContentMetadataConfig::default(),
            topics: Topics::default(),
            telemetry_enabled: true,
            telemetry_schema_version: None,
            telemetry_player_name: None,
            endpoints: Endpoints::default(),
            log: LogConfig::default(),
        }
    }
}

impl SdkConfig {
    /// Create a config with the two required fields set.
    pub fn new(environment: Environment, brand: impl Into<String>) -> Self {
        Self {
            environment: Some(environment),
            brand: brand.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::Validation`] carrying every
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.environment.is_none() {
            violations.push("please specify your environment".to_string());
        }
        if self.brand.trim().is_empty() {
            violations.push("please specify your brand".to_string());
        }
        if let Some(ref code) = self.country_code {
            if !code.is_empty() && code.len() != 2 {
                violations.push(format!(
                    "country_code must be a 2-letter ISO code, got '{code}'"
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::validation(violations))
        }
    }

    /// The validated environment.
    ///
    /// Call after [`validate`](Self::validate); an unset environment reads
    /// as a one-violation validation error.
    pub fn environment(&self) -> Result<Environment> {
        self.environment
            .ok_or_else(|| ConfigError::validation(vec![
                "please specify your environment".to_string(),
            ]))
    }

    /// Country code override, upper-cased, or empty when unset.
    pub fn normalized_country_code(&self) -> String {
        self.country_code
            .as_deref()
            .unwrap_or("")
            .to_ascii_uppercase()
    }
}

impl FromStr for SdkConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
