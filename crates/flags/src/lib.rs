//! Feature flag gate
//!
//! Every optional behavior in the SDK sits behind a flag. Flags come
//! from the flag service at init; when the fetch fails or a flag is
//! absent, a built-in default answers instead. Querying a flag never
//! errors: unknown flags read as disabled.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use beacon_transport::{Request, SharedTransport};

/// Result type for flag operations
pub type Result<T> = std::result::Result<T, FlagError>;

/// Errors from the flag fetch.
///
/// Fetch failures are non-fatal: the gate keeps answering from
/// defaults.
#[derive(Debug, Error)]
pub enum FlagError {
    /// Flag service request failed
    #[error(transparent)]
    Transport(#[from] beacon_transport::TransportError),

    /// Flag service answered with a body that does not parse
    #[error("flag service response is malformed: {message}")]
    Malformed {
        /// Parse failure description
        message: String,
    },
}

/// One flag as reported by the flag service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRecord {
    pub enabled: bool,
    pub flag_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flag_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_since_last_query: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id_type: Option<String>,
}

/// The flag service response envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAllResponse {
    #[serde(default)]
    pub any_flags_updated_since_last_query: bool,
    pub results: Vec<FlagRecord>,
}

/// Built-in answers used when the live list has no entry for a flag.
const FLAG_DEFAULTS: &[(&str, bool)] = &[
    ("identity-onstart", true),
    ("identity-oncomplete", true),
    ("session", true),
    ("privacy", true),
    ("telemetry", true),
    ("consent-update", true),
    ("heartbeat-event", false),
    ("pubsub-event", false),
    ("outside-us-location-check", false),
    ("send-logs", true),
    ("idresolve", false),
    ("promo", false),
];

/// The default answer for a flag id.
pub fn default_for(flag_id: &str) -> bool {
    FLAG_DEFAULTS
        .iter()
        .find(|(id, _)| *id == flag_id)
        .map(|(_, enabled)| *enabled)
        .unwrap_or(false)
}

/// Holds the live flag list and answers queries.
#[derive(Debug, Default)]
pub struct FlagGate {
    flags: RwLock<Vec<FlagRecord>>,
}

impl FlagGate {
    /// A gate answering purely from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the live flag list.
    pub fn set_flags(&self, flags: Vec<FlagRecord>) {
        *self.flags.write() = flags;
    }

    /// The live flag list.
    pub fn flags(&self) -> Vec<FlagRecord> {
        self.flags.read().clone()
    }

    /// Answer a flag query: the live list wins, then the built-in
    /// default, then disabled. Never errors.
    pub fn is_enabled(&self, flag_id: &str) -> bool {
        let flags = self.flags.read();
        match flags.iter().find(|flag| flag.flag_id == flag_id) {
            Some(flag) => flag.enabled,
            None => default_for(flag_id),
        }
    }

    /// Fetch the live list from the flag service and install it.
    ///
    /// # Errors
    ///
    /// [`FlagError::Transport`] when the request fails,
    /// [`FlagError::Malformed`] when the response does not parse. The
    /// gate keeps its previous list in both cases.
    pub async fn fetch(&self, transport: &SharedTransport, url: &str) -> Result<()> {
        let response = transport.send(url, Request::get()).await?;
        let value = response.as_json().ok_or_else(|| FlagError::Malformed {
            message: "response body is not JSON".to_string(),
        })?;

        let parsed: QueryAllResponse =
            serde_json::from_value(value.clone()).map_err(|e| FlagError::Malformed {
                message: e.to_string(),
            })?;

        if parsed.any_flags_updated_since_last_query {
            debug!("flag service reports updates since last query");
        }
        self.set_flags(parsed.results);
        Ok(())
    }
}

#[cfg(test)]
mod lib_test;
