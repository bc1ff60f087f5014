//! Identity resolution service call
//!
//! Exchanges the visitor's first-party and vendor ids for household
//! identifiers. Rate-limited to one attempt per day; the attempt
//! timestamp is recorded whether or not the service answered, so a
//! failing service is not hammered on every page load.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use beacon_flags::FlagGate;
use beacon_transport::{Request, SharedTransport};

use crate::ids::{get_conviva_id, get_ecid, get_krux_id};
use crate::IdentityManager;

/// Store key for the last resolution attempt.
pub const IDR_TIMESTAMP_KEY: &str = "idrTimestamp";
/// Store key for the household id.
pub const HHID_KEY: &str = "hhid";
/// Store key for the individual id.
pub const INID_KEY: &str = "inid";
/// Store key for the household id schema version.
pub const HHID_VERSION_KEY: &str = "hhidVersion";
/// Store key for audience segments.
pub const SEGS_KEY: &str = "wmsegs";

/// Minimum gap between resolution attempts, in hours.
const IDR_RATE_LIMIT_HOURS: i64 = 24;

/// The identity resolution service response.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdResolveResponse {
    #[serde(default)]
    pub hhid: Option<String>,
    #[serde(default)]
    pub inid: Option<String>,
    #[serde(default)]
    pub segs: Option<String>,
    #[serde(default)]
    pub hhid_version: Option<i64>,
}

impl IdentityManager {
    /// Attempt identity resolution. Returns whether an attempt was
    /// made: the `idresolve` flag and the daily rate limit can both
    /// decline it. A transport or parse failure still counts as an
    /// attempt and still stamps the rate limit.
    pub async fn resolve_ids(
        &self,
        gate: &FlagGate,
        transport: &SharedTransport,
        url: &str,
    ) -> bool {
        if !gate.is_enabled("idresolve") {
            debug!("idresolve flag is disabled");
            return false;
        }

        if let Some(last_attempt) = self
            .store
            .get(IDR_TIMESTAMP_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
        {
            let age_hours =
                (Utc::now().timestamp_millis() - last_attempt.timestamp_millis()) / 3_600_000;
            if age_hours < IDR_RATE_LIMIT_HOURS {
                info!(age_hours, "identity resolution attempted within the last day");
                return false;
            }
        }

        let body = json!({
            "ukid": self.ukid(),
            "ids": {
                "csid": self.csid(),
                "convivaid": get_conviva_id(self.store.as_ref()),
                "ecid": get_ecid(self.store.as_ref()),
                "kruxid": get_krux_id(self.store.as_ref()),
            },
        });

        match transport.send(url, Request::post_json(&body)).await {
            Ok(response) => {
                let parsed = response
                    .as_json()
                    .and_then(|value| {
                        serde_json::from_value::<IdResolveResponse>(value.clone()).ok()
                    })
                    .unwrap_or_default();
                self.apply_resolution(&parsed);
            }
            Err(e) => {
                debug!(error = %e, "identity resolution request failed");
            }
        }

        self.store.set(
            IDR_TIMESTAMP_KEY,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            &self.options,
        );
        true
    }

    /// Install resolved ids; ids absent from the response are cleared
    /// so stale household data never outlives its resolution.
    fn apply_resolution(&self, response: &IdResolveResponse) {
        match &response.hhid {
            Some(hhid) => self.store.set(HHID_KEY, hhid, &self.options),
            None => self.store.remove(HHID_KEY),
        }
        match &response.segs {
            Some(segs) => self.store.set(SEGS_KEY, segs, &self.options),
            None => self.store.remove(SEGS_KEY),
        }
        if let Some(inid) = &response.inid {
            self.store.set(INID_KEY, inid, &self.options);
        }
        if let Some(version) = response.hhid_version {
            self.store
                .set(HHID_VERSION_KEY, &version.to_string(), &self.options);
        }
    }
}
