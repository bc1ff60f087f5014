//! Public SDK surface
//!
//! A cheap-clone handle over the initialized SDK. Getters answer from
//! the current state; notification methods feed host events (page
//! lifecycle, consent changes, pubsub data, engagement signals) into
//! the pipeline. A suppressed handle answers with sentinels and
//! swallows everything else.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use beacon_config::SdkConfig;
use beacon_core::context::{
    AdsProperties, ConsentProperties, Device, Ids, Library, LocationProperties,
    NavigationProperties, PromoMetrics, SessionProperties, UserConsentEventDetails,
};
use beacon_flags::FlagRecord;
use beacon_identity::UKID_UNKNOWN;

use crate::{SdkInner, SdkState};

/// Handle to an initialized SDK.
#[derive(Clone)]
pub struct SdkHandle {
    inner: Arc<SdkInner>,
}

impl std::fmt::Debug for SdkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SdkHandle")
            .field("state", &self.inner.state)
            .finish_non_exhaustive()
    }
}

impl SdkHandle {
    pub(crate) fn new(inner: Arc<SdkInner>) -> Self {
        Self { inner }
    }

    /// Where initialization landed.
    pub fn state(&self) -> SdkState {
        self.inner.state
    }

    /// SDK version.
    pub fn get_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// The configuration the SDK was initialized with.
    pub fn get_config(&self) -> SdkConfig {
        self.inner.config.clone()
    }

    /// The live feature flag list.
    pub fn get_flags(&self) -> Vec<FlagRecord> {
        self.inner.flags.flags()
    }

    /// The visitor id, or `Unknown` when suppressed or unresolved.
    pub fn get_ukid(&self) -> String {
        if self.inner.is_active() {
            self.inner.identity.ukid()
        } else {
            UKID_UNKNOWN.to_string()
        }
    }

    /// The cross-site id, if one resolved.
    pub fn get_csid(&self) -> Option<String> {
        if self.inner.is_active() {
            self.inner.identity.csid()
        } else {
            None
        }
    }

    /// A full identifier snapshot.
    pub fn get_ids(&self) -> Ids {
        self.inner.identity.get_ids()
    }

    /// The current session snapshot.
    pub fn get_session_properties(&self) -> SessionProperties {
        self.inner.session.current()
    }

    /// Brand identifier.
    pub fn get_brand(&self) -> String {
        self.inner.config.brand.clone()
    }

    /// Sub-brand identifier.
    pub fn get_sub_brand(&self) -> String {
        self.inner.config.sub_brand.clone()
    }

    /// The current consent snapshot.
    pub fn get_consent_properties(&self) -> ConsentProperties {
        self.inner.consent_properties()
    }

    /// Device details derived from the page environment.
    pub fn get_device_properties(&self) -> Device {
        self.inner.page.device()
    }

    /// Resolved geolocation details.
    pub fn get_location_properties(&self) -> LocationProperties {
        self.inner.geo.location_properties(&self.inner.page)
    }

    /// Page location details.
    pub fn get_navigation_properties(&self) -> NavigationProperties {
        self.inner.page.navigation_properties()
    }

    /// Ad slot state.
    pub fn get_ads_properties(&self) -> AdsProperties {
        self.inner.ads_properties()
    }

    /// The SDK's self-description.
    pub fn get_library(&self) -> Library {
        self.inner.library()
    }

    /// Whether the page-start identity event is enabled.
    pub fn is_identity_on_start_enabled(&self) -> bool {
        self.inner.flags.is_enabled("identity-onstart")
    }

    /// Whether the page-complete identity event is enabled.
    pub fn is_identity_on_complete_enabled(&self) -> bool {
        self.inner.flags.is_enabled("identity-oncomplete")
    }

    /// Whether privacy handling is enabled.
    pub fn is_privacy_enabled(&self) -> bool {
        self.inner.consent.is_privacy_enabled()
    }

    /// Whether telemetry events are emitted.
    pub fn is_telemetry_enabled(&self) -> bool {
        self.inner.config.telemetry_enabled && self.inner.flags.is_enabled("telemetry")
    }

    fn telemetry_allowed(&self) -> bool {
        self.inner.is_active() && self.is_telemetry_enabled()
    }

    /// Track a page view.
    pub fn track_app_load(&self) {
        if !self.telemetry_allowed() {
            return;
        }
        self.inner.hydrate();
        self.inner.emit(self.inner.core.track_app_load(None, None));
    }

    /// Track an auth token change.
    pub fn track_token_event(&self, event_name: &str) {
        if !self.inner.is_active() {
            return;
        }
        self.inner.hydrate();
        self.inner
            .emit(self.inner.core.track_token_event(event_name, None, None));
    }

    /// Track a promo placement event. Gated by the `promo` flag.
    pub fn track_promo(&self, event_name: &str, metrics: PromoMetrics) {
        if !self.telemetry_allowed() || !self.inner.flags.is_enabled("promo") {
            return;
        }
        self.inner.hydrate_with(None, Some(metrics));
        self.inner
            .emit(self.inner.core.track_promo(event_name, None, None));
    }

    /// The host finished loading the page. Emits the page-complete
    /// identity event when enabled.
    pub fn page_load_complete(&self) {
        if !self.inner.is_active() || !self.is_identity_on_complete_enabled() {
            return;
        }
        self.inner.hydrate();
        self.inner.emit(self.inner.core.track_identity_registration(
            "identity on page complete",
            None,
            None,
        ));
    }

    /// The visitor changed consent. Adopts a carried privacy string and
    /// emits a consent-update event when enabled.
    pub fn consent_changed(&self, details: UserConsentEventDetails) {
        if let Some(usp) = &details.usp {
            if !self.inner.consent.set_usp_string(usp) {
                warn!(usp = %usp, "rejected malformed privacy string");
            }
        }

        if !self.inner.is_active() || !self.inner.flags.is_enabled("consent-update") {
            return;
        }
        self.inner.hydrate();
        self.inner.emit(self.inner.core.track_consent_updated(
            "consentChanged",
            Some(&details),
            None,
            None,
        ));
    }

    /// The visitor permits data sharing. Returns the resulting privacy
    /// string.
    pub fn ccpa_share_data(&self) -> Option<String> {
        let usp = self.inner.consent.ccpa_share_data();
        if self.inner.is_active() {
            self.inner.hydrate();
            self.inner
                .emit(self.inner.core.track_consent_granted(None, None));
        }
        usp
    }

    /// The visitor opted out of data sharing. Returns the resulting
    /// privacy string.
    pub fn ccpa_do_not_share(&self) -> Option<String> {
        let usp = self.inner.consent.ccpa_do_not_share();
        if self.inner.is_active() {
            self.inner.hydrate();
            self.inner
                .emit(self.inner.core.track_consent_withdrawn(None, None));
        }
        usp
    }

    /// Static page data for content metadata extraction.
    pub fn set_page_data(&self, data: Value) {
        *self.inner.page_data.write() = data;
    }

    /// A pubsub message from the host. Payloads on configured topics
    /// feed content metadata; the event itself is tracked when the
    /// `pubsub-event` flag allows.
    pub fn publish(&self, topic: &str, data: Value) {
        let topics = &self.inner.config.topics;
        if topics.page.iter().any(|t| t == topic) {
            *self.inner.page_dynamic.write() = data.clone();
        }
        if topics.video.iter().any(|t| t == topic) {
            *self.inner.video_dynamic.write() = data;
        }

        if !self.telemetry_allowed() || !self.inner.flags.is_enabled("pubsub-event") {
            return;
        }
        self.inner.hydrate();
        self.inner
            .emit(self.inner.core.track_pub_sub(topic, None, None));
    }

    /// An activity signal: scroll, pointer, or key.
    pub fn record_engagement(&self, scroll_position: f64, document_height: f64) {
        self.inner
            .engagement
            .lock()
            .record_activity(scroll_position, document_height);
    }

    /// Register an ad slot for viewability tracking.
    pub fn register_ad_slot(&self, slot_id: &str, slot_size: &str, ad_unit_path: Option<&str>) {
        self.inner.slots.register(slot_id, slot_size, ad_unit_path);
    }

    /// A slot crossed into view (at least half on screen).
    pub fn slot_in_view(&self, slot_id: &str, slot_size: Option<&str>) {
        self.inner.slots.slot_in_view(slot_id, slot_size);
    }

    /// A slot left view.
    pub fn slot_out_of_view(&self, slot_id: &str) {
        self.inner.slots.slot_out_of_view(slot_id);
    }

    /// The page went hidden: pause the heartbeat, stop slot timers, and
    /// flush a page-exit beacon.
    pub fn page_hidden(&self) {
        self.inner.slots.on_hidden();
        let heartbeat = self.inner.heartbeat.lock().clone();
        if let Some(heartbeat) = heartbeat {
            heartbeat.pause();
            self.page_exit("visibilitychange");
        }
    }

    /// The page became visible again: resume the heartbeat and restart
    /// the accumulators.
    pub fn page_visible(&self) {
        self.inner.slots.on_visible();
        let heartbeat = self.inner.heartbeat.lock().clone();
        if let Some(heartbeat) = heartbeat {
            heartbeat.resume();
        }
        let scroll = self.inner.engagement.lock().snapshot().current_scroll_position;
        self.inner.engagement.lock().reset(scroll);
    }

    /// The visitor is leaving. Sends a page-exit event as a
    /// fire-and-forget beacon so it survives teardown.
    pub fn page_exit(&self, event_trigger: &str) {
        if !self.telemetry_allowed() {
            return;
        }
        self.inner.hydrate();
        match self.inner.core.track_page_exit(event_trigger, None, None) {
            Ok(payload) => {
                if let Some(url) = &self.inner.exit_url {
                    self.inner
                        .transport
                        .send_beacon(url, Value::Object(payload).to_string());
                }
                self.inner.session.reset_new_session_fields();
            }
            Err(e) => warn!(error = %e, "page exit assembly failed"),
        }
    }

    /// Stop background tasks. Queued events stay persisted for the next
    /// page load.
    pub async fn shutdown(&self) {
        if let Some(queue) = &self.inner.queue {
            queue.shutdown().await;
        }
        let heartbeat = self.inner.heartbeat.lock().clone();
        if let Some(heartbeat) = heartbeat {
            heartbeat.shutdown().await;
        }
    }
}
