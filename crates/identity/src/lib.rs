//! Identity resolution
//!
//! Owns the visitor's first-party identifiers: the UKID (a durable
//! per-device UUID), the CSID pairing shared with the cross-site frame,
//! and the vendor identifiers read from their own storage keys. Also
//! drives the identity-resolution service call that exchanges those ids
//! for household-level ones.

mod ids;
mod resolve;

pub use ids::{get_conviva_id, get_ecid, get_krux_id, LIVERAMP_KEY, TRADEDESK_KEY};
pub use resolve::{
    IdResolveResponse, HHID_KEY, HHID_VERSION_KEY, IDR_TIMESTAMP_KEY, INID_KEY, SEGS_KEY,
};

use std::sync::OnceLock;

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use beacon_core::context::Ids;
use beacon_store::{KeyValueStoreExt, SharedStore, StoreOptions};

/// Store key for the UKID.
pub const UKID_KEY: &str = "UKID";
/// Store key for the CSID pairing record.
pub const CSID_KEY: &str = "csid";
/// Sentinel returned when no UKID is readable.
pub const UKID_UNKNOWN: &str = "Unknown";

/// Whether `id` is a well-formed v4 UUID.
pub fn is_uuid(id: &str) -> bool {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    let re = UUID_RE.get_or_init(|| {
        Regex::new(
            r"^(?i)[0-9A-F]{8}-[0-9A-F]{4}-4[0-9A-F]{3}-[89AB][0-9A-F]{3}-[0-9A-F]{12}$",
        )
        .unwrap()
    });
    re.is_match(id)
}

/// Extract a CSID carried in a `utm_term` query value as
/// `csid_<uuid>`.
pub fn extract_csid_from_utm_term(utm_term: &str) -> Option<String> {
    static CSID_RE: OnceLock<Regex> = OnceLock::new();
    let re = CSID_RE.get_or_init(|| {
        Regex::new(
            r"(?i)csid_([0-9A-F]{8}-[0-9A-F]{4}-4[0-9A-F]{3}-[89AB][0-9A-F]{3}-[0-9A-F]{12})",
        )
        .unwrap()
    });
    re.captures(utm_term)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// The CSID record persisted with the UKID it was paired against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossSitePairing {
    pub csid: String,
    pub ukid: String,
}

/// What the cross-site frame reported when asked for an id.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrossSiteReport {
    /// Whether third-party cookies work in this embedding, if the frame
    /// could tell.
    pub third_party_cookies_supported: Option<bool>,
    /// The cross-site id, if one came back in time.
    pub csid: Option<String>,
}

/// Host capability for talking to the cross-site frame.
///
/// Implementations own their transport and timeout; the manager asks
/// once and takes whatever arrived.
#[async_trait]
pub trait CrossSiteChannel: Send + Sync {
    async fn request_cross_site_id(&self) -> CrossSiteReport;
}

/// Manages the visitor's identifiers over the key-value store.
pub struct IdentityManager {
    store: SharedStore,
    options: StoreOptions,
    ukid: RwLock<String>,
    third_party_cookies: RwLock<Option<bool>>,
}

impl IdentityManager {
    pub fn new(store: SharedStore, options: StoreOptions) -> Self {
        Self {
            store,
            options,
            ukid: RwLock::new(String::new()),
            third_party_cookies: RwLock::new(None),
        }
    }

    /// Establish the UKID: reuse the stored one or mint a fresh UUID.
    /// Returns the id and whether it was newly created. With no usable
    /// store the id stays empty and nothing is persisted.
    pub fn init_ukid(&self) -> (String, bool) {
        if !self.store.is_available() {
            return (String::new(), false);
        }

        let (ukid, created) = match self.store.get(UKID_KEY) {
            Some(existing) => (existing, false),
            None => {
                let fresh = Uuid::new_v4().to_string();
                debug!(ukid = %fresh, "no stored UKID, generating one");
                (fresh, true)
            }
        };

        self.store.set(UKID_KEY, &ukid, &self.options);
        *self.ukid.write() = ukid.clone();
        (ukid, created)
    }

    /// The current UKID, falling back to the stored one, then to the
    /// `Unknown` sentinel.
    pub fn ukid(&self) -> String {
        let current = self.ukid.read().clone();
        if !current.is_empty() {
            return current;
        }
        self.store
            .get(UKID_KEY)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| UKID_UNKNOWN.to_string())
    }

    /// The current CSID, if a readable record exists.
    pub fn csid(&self) -> Option<String> {
        let raw = self.store.get(CSID_KEY)?;
        match serde_json::from_str::<CrossSitePairing>(&raw) {
            Ok(pairing) => Some(pairing.csid),
            Err(_) if !raw.is_empty() => Some(raw),
            Err(_) => None,
        }
    }

    /// Whether third-party cookies work, as last reported by the
    /// cross-site frame.
    pub fn third_party_cookies_enabled(&self) -> Option<bool> {
        *self.third_party_cookies.read()
    }

    /// Establish the CSID: adopt a valid stored pairing (re-pairing it
    /// with the current UKID when stale), otherwise ask the cross-site
    /// frame. `url_csid` is an id carried in the landing URL and wins
    /// over whatever would be persisted.
    pub async fn init_cross_site_id(
        &self,
        channel: Option<&dyn CrossSiteChannel>,
        url_csid: Option<&str>,
    ) -> Option<String> {
        if !self.store.is_available() {
            return None;
        }

        let stored: Option<CrossSitePairing> = self.store.get_json(CSID_KEY);
        if let Some(pairing) = stored.filter(|p| is_uuid(&p.csid)) {
            let ukid = self.ukid.read().clone();
            if pairing.ukid != ukid {
                debug!(csid = %pairing.csid, "re-pairing stored CSID with current UKID");
                self.update_cs_data(&pairing.csid, url_csid);
            }
            return Some(pairing.csid);
        }

        let report = match channel {
            Some(channel) => channel.request_cross_site_id().await,
            None => CrossSiteReport::default(),
        };

        if let Some(supported) = report.third_party_cookies_supported {
            *self.third_party_cookies.write() = Some(supported);
        }

        match report.csid {
            Some(csid) if is_uuid(&csid) => {
                self.update_cs_data(&csid, url_csid);
                Some(csid)
            }
            _ => None,
        }
    }

    /// Persist a CSID paired with the current UKID. Invalid ids are
    /// dropped; an id carried in the landing URL takes precedence.
    pub fn update_cs_data(&self, csid: &str, url_csid: Option<&str>) {
        if !is_uuid(csid) {
            debug!(csid, "cross-site id is invalid, not updating");
            return;
        }

        let effective = url_csid.filter(|candidate| is_uuid(candidate)).unwrap_or(csid);
        let pairing = CrossSitePairing {
            csid: effective.to_string(),
            ukid: self.ukid.read().clone(),
        };

        if let Ok(raw) = serde_json::to_string(&pairing) {
            // Cross-site reads require SameSite=None; Secure
            let mut options = self.options.clone();
            options.same_site = Some("None".to_string());
            options.secure = true;
            self.store.set(CSID_KEY, &raw, &options);
        }
    }

    /// A full identifier snapshot from the store.
    pub fn get_ids(&self) -> Ids {
        Ids {
            csid: self.csid(),
            convivaid: get_conviva_id(self.store.as_ref()),
            ecid: get_ecid(self.store.as_ref()),
            kruxid: get_krux_id(self.store.as_ref()),
            liverampatsid: self.store.get(LIVERAMP_KEY),
            tradedeskuid: self.store.get(TRADEDESK_KEY),
            hhid: self.store.get(HHID_KEY),
            inid: self.store.get(INID_KEY),
            hhid_version: self.store.get(HHID_VERSION_KEY),
        }
    }
}
