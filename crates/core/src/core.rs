//! Payload core
//!
//! Holds the persistent key-value entries common to every event and stamps
//! out complete payloads on each track call. One instance lives for the
//! lifetime of the SDK; the orchestrator refreshes the common entries
//! before every track and receives each finished payload through the
//! construction hook.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::context::{
    AdsProperties, ConsentProperties, ContentMetadata, Device, EventProperties,
    IabConsentCategories, Ids, Library, LocationProperties, NavigationProperties,
    SessionProperties, UserConsentEventDetails,
};
use crate::error::Result;
use crate::payload::{strip_empty_properties, PayloadBuilder};
use crate::timestamp::{now_iso8601, EventTimestamp};

/// A finished event payload.
pub type Payload = Map<String, Value>;

/// Outcome of a caller-supplied per-event callback.
///
/// A failing callback is logged and swallowed; it never fails the track
/// call or reaches the queue.
pub type CallbackResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Per-event callback, run after the payload is assembled.
pub type TrackCallback = Box<dyn FnOnce(&Payload) -> CallbackResult + Send>;

/// Hook applied to every assembled payload.
pub type PayloadHook = Box<dyn Fn(&Payload) + Send + Sync>;

/// Assembles event payloads from persistent context entries.
pub struct PayloadCore {
    common: RwLock<Map<String, Value>>,
    hook: Option<PayloadHook>,
}

impl Default for PayloadCore {
    fn default() -> Self {
        Self::new()
    }
}

impl PayloadCore {
    /// A core with no construction hook.
    #[must_use]
    pub fn new() -> Self {
        Self {
            common: RwLock::new(Map::new()),
            hook: None,
        }
    }

    /// A core that passes every assembled payload to `hook`.
    #[must_use]
    pub fn with_hook(hook: PayloadHook) -> Self {
        Self {
            common: RwLock::new(Map::new()),
            hook: Some(hook),
        }
    }

    /// Set a persistent entry added to every payload. Re-setting a key
    /// overwrites the previous value.
    pub fn add_entry(&self, key: impl Into<String>, value: Value) {
        self.common.write().insert(key.into(), value);
    }

    fn set_serialized<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(value) => self.add_entry(key, value),
            Err(e) => warn!(key, error = %e, "context entry failed to serialize, skipping"),
        }
    }

    /// Platform the events originate from.
    pub fn set_platform(&self, platform: &str) {
        self.add_entry("platform", json!(platform));
    }

    /// Brand name.
    pub fn set_brand(&self, brand: &str) {
        self.add_entry("brand", json!(brand));
    }

    /// Sub-brand name.
    pub fn set_sub_brand(&self, sub_brand: &str) {
        self.add_entry("subBrand", json!(sub_brand));
    }

    /// Product name.
    pub fn set_product_name(&self, product_name: &str) {
        self.add_entry("productName", json!(product_name));
    }

    /// User key identifier for the current visitor.
    pub fn set_ukid(&self, ukid: &str) {
        self.add_entry("ukid", json!(ukid));
    }

    /// Third-party and resolved identifiers.
    pub fn set_third_party_ids(&self, ids: &Ids) {
        self.set_serialized("ids", ids);
    }

    /// Device details.
    pub fn set_device(&self, device: &Device) {
        self.set_serialized("device", device);
    }

    /// Page location details.
    pub fn set_navigation_properties(&self, props: &NavigationProperties) {
        self.set_serialized("navigationProperties", props);
    }

    /// IP address resolved by the geolocation call.
    pub fn set_client_resolved_ip(&self, ip: &str) {
        self.add_entry("clientResolvedIp", json!(ip));
    }

    /// Geolocation details.
    pub fn set_location(&self, location: &LocationProperties) {
        self.set_serialized("location", location);
    }

    /// Consent snapshot.
    pub fn set_consent_properties(&self, props: &ConsentProperties) {
        self.set_serialized("consentProperties", props);
    }

    /// IAB consent categories.
    pub fn set_iab_categories(&self, props: &IabConsentCategories) {
        self.set_serialized("iabConsentCategories", props);
    }

    /// SDK self-description.
    pub fn set_library(&self, library: &Library) {
        self.set_serialized("library", library);
    }

    /// Per-event properties.
    pub fn set_event_properties(&self, props: &EventProperties) {
        self.set_serialized("eventProperties", props);
    }

    /// Session snapshot.
    pub fn set_session_properties(&self, props: &SessionProperties) {
        self.set_serialized("session", props);
    }

    /// Ad slot state.
    pub fn set_ads_properties(&self, props: &AdsProperties) {
        self.set_serialized("adsProperties", props);
    }

    /// Page and video metadata.
    pub fn set_content_metadata(&self, metadata: &ContentMetadata) {
        self.set_serialized("contentMetadata", metadata);
    }

    /// Assemble one payload: common entries (nulls stripped), the event
    /// fields, a normalized timestamp, and a fresh event id.
    fn track(
        &self,
        mut data: PayloadBuilder,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let event_timestamp = match timestamp {
            Some(ts) => ts.resolve()?,
            None => now_iso8601(),
        };

        let common = Value::Object(self.common.read().clone());
        data.add_map(strip_empty_properties(common));
        data.add("eventTimestamp", json!(event_timestamp));
        data.add("eventId", json!(Uuid::new_v4().to_string()));

        let payload = data.build();

        if let Some(hook) = &self.hook {
            hook(&payload);
        }

        if let Some(callback) = callback {
            if let Err(e) = callback(&payload) {
                warn!(error = %e, "event callback failed");
            }
        }

        Ok(payload)
    }

    /// A page view / visit.
    pub fn track_app_load(
        &self,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("telemetry"));
        data.add("eventName", json!("appLoad"));
        self.track(data, timestamp, callback)
    }

    /// The visitor is still viewing the current page.
    pub fn track_heartbeat(
        &self,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("telemetry"));
        data.add("eventName", json!("heartbeat"));
        self.track(data, timestamp, callback)
    }

    /// An event relayed from a pub/sub subscription.
    pub fn track_pub_sub(
        &self,
        event_name: &str,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("telemetry"));
        data.add("eventName", json!(event_name));
        self.add_entry("eventProperties", json!({"eventTrigger": "pubsub"}));
        self.track(data, timestamp, callback)
    }

    /// A new identity was generated for the visitor.
    pub fn track_identity_registration(
        &self,
        event_name: &str,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("identity"));
        data.add("eventName", json!(event_name));
        self.track(data, timestamp, callback)
    }

    /// The auth token changed.
    pub fn track_token_event(
        &self,
        event_name: &str,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("token"));
        data.add("eventName", json!(event_name));
        self.track(data, timestamp, callback)
    }

    /// The visitor exited the page.
    pub fn track_page_exit(
        &self,
        event_trigger: &str,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("telemetry"));
        data.add("eventName", json!("pageExit"));
        data.add("eventTrigger", json!(event_trigger));
        self.track(data, timestamp, callback)
    }

    /// The visitor updated privacy consent.
    pub fn track_consent_updated(
        &self,
        event_trigger: &str,
        details: Option<&UserConsentEventDetails>,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("privacy"));
        data.add("eventName", json!("consent update"));
        self.add_entry(
            "eventProperties",
            json!({
                "eventTrigger": event_trigger,
                "uspString": details.and_then(|d| d.usp.clone()),
                "region": details.and_then(|d| d.region.clone()),
            }),
        );
        self.track(data, timestamp, callback)
    }

    /// The visitor granted privacy consent.
    pub fn track_consent_granted(
        &self,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("privacy"));
        data.add("eventName", json!("ccpaShareData"));
        self.track(data, timestamp, callback)
    }

    /// The visitor withdrew privacy consent.
    pub fn track_consent_withdrawn(
        &self,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("privacy"));
        data.add("eventName", json!("ccpaDoNotShare"));
        self.track(data, timestamp, callback)
    }

    /// A promo placement event.
    pub fn track_promo(
        &self,
        event_name: &str,
        timestamp: Option<EventTimestamp>,
        callback: Option<TrackCallback>,
    ) -> Result<Payload> {
        let mut data = PayloadBuilder::new();
        data.add("eventType", json!("telemetry"));
        data.add("eventName", json!(event_name));
        self.track(data, timestamp, callback)
    }
}

#[cfg(test)]
#[path = "core_test.rs"]
mod core_test;
