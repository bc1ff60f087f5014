//! Deployment environment identifier

use serde::{Deserialize, Serialize};

/// Deployment environment the SDK is initialized against.
///
/// Serialized in upper case to match the collection endpoint's naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Environment {
    /// Development
    Dev,
    /// Test
    Test,
    /// Production
    Prod,
    /// Integration
    Integration,
    /// Automated browser tests; payloads are mirrored for assertions
    AutomatedTest,
}

impl Environment {
    /// Environment name as the endpoint table and logs spell it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dev => "DEV",
            Self::Test => "TEST",
            Self::Prod => "PROD",
            Self::Integration => "INTEGRATION",
            Self::AutomatedTest => "AUTOMATED_TEST",
        }
    }

    /// Parse a case-insensitive environment name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "DEV" => Some(Self::Dev),
            "TEST" => Some(Self::Test),
            "PROD" => Some(Self::Prod),
            "INTEGRATION" => Some(Self::Integration),
            "AUTOMATED_TEST" => Some(Self::AutomatedTest),
            _ => None,
        }
    }
}
