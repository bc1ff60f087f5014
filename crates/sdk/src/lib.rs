//! Beacon SDK orchestrator
//!
//! Drives initialization end to end: configuration validation,
//! geolocation, the jurisdiction gate, flag fetch, identity and session
//! establishment, and the background heartbeat and retry queue. Hosts
//! receive a cheap-clone [`SdkHandle`] and feed the SDK page events;
//! the SDK never reaches into the host environment itself.
//!
//! Initialization flows through one path:
//! validate, resolve location, check consent, fetch flags, gate, then
//! active init. Only configuration problems reject init; every other
//! failure degrades with a log line.

mod api;
mod engagement;
mod error;
mod geo;
mod heartbeat;
mod hydrate;
mod logging;
mod page;
mod viewability;

pub use api::SdkHandle;
pub use engagement::{EngagementTracker, HEARTBEAT_INTERVAL_MS};
pub use error::{InitError, Result};
pub use geo::{GeoState, Geolocation};
pub use logging::init_logging;
pub use page::PageEnvironment;
pub use viewability::{SlotRegistry, AD_IN_VIEW_PERCENTAGE};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use beacon_config::{Environment, SdkConfig};
use beacon_consent::{
    check_outside_us, is_ccpa_location, ConsentFramework, ConsentManager, ConsentRule,
};
use beacon_core::{Payload, PayloadCore};
use beacon_flags::FlagGate;
use beacon_identity::{extract_csid_from_utm_term, CrossSiteChannel, IdentityManager, UKID_UNKNOWN};
use beacon_queue::{QueueHandle, QueueOptions, RetryQueue};
use beacon_session::SessionEngine;
use beacon_store::{SharedStore, StoreOptions};
use beacon_transport::SharedTransport;

use heartbeat::HeartbeatHandle;

/// Where initialization landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkState {
    /// Active: events flow, identifiers resolve.
    Ready,
    /// Inert: the jurisdiction gate or an embedded frame declined
    /// activation. The handle answers getters with sentinels and
    /// swallows track calls.
    Suppressed,
}

/// Shared state behind every [`SdkHandle`].
pub(crate) struct SdkInner {
    pub(crate) config: SdkConfig,
    pub(crate) environment: Environment,
    pub(crate) state: SdkState,
    pub(crate) page: PageEnvironment,
    pub(crate) geo: Geolocation,
    pub(crate) consent_rule: ConsentRule,
    pub(crate) consent_categories: Vec<(String, bool)>,
    pub(crate) store: SharedStore,
    pub(crate) transport: SharedTransport,
    pub(crate) core: PayloadCore,
    pub(crate) flags: FlagGate,
    pub(crate) consent: ConsentManager,
    pub(crate) identity: IdentityManager,
    pub(crate) session: SessionEngine,
    pub(crate) engagement: Mutex<EngagementTracker>,
    pub(crate) slots: SlotRegistry,
    pub(crate) queue: Option<QueueHandle>,
    pub(crate) heartbeat: Mutex<Option<HeartbeatHandle>>,
    pub(crate) exit_url: Option<String>,
    pub(crate) page_data: RwLock<Value>,
    pub(crate) page_dynamic: RwLock<Value>,
    pub(crate) video_dynamic: RwLock<Value>,
}

impl SdkInner {
    pub(crate) fn is_active(&self) -> bool {
        self.state == SdkState::Ready
    }

    /// Hand a payload to the retry queue. Without a configured
    /// collection endpoint the payload is dropped.
    pub(crate) fn submit(&self, payload: Payload) {
        if let Some(queue) = &self.queue {
            queue.add_item(payload);
        }
    }

    /// Queue an assembled payload and clear the one-batch session
    /// fields.
    pub(crate) fn emit(&self, result: beacon_core::Result<Payload>) {
        match result {
            Ok(payload) => {
                self.submit(payload);
                self.session.reset_new_session_fields();
            }
            Err(e) => warn!(error = %e, "event assembly failed"),
        }
    }

    /// One heartbeat: fold accumulators into the payload, emit, reset
    /// the interval.
    pub(crate) fn heartbeat_tick(&self) {
        self.slots.update_timers();
        let metrics = self.engagement.lock().snapshot();
        let scroll = metrics.current_scroll_position;

        self.session.establish(false);
        self.hydrate_with(Some(metrics), None);
        self.emit(self.core.track_heartbeat(None, None));

        self.engagement.lock().reset(scroll);
        self.slots.reset_metrics();
    }
}

/// Cookie scoping for persisted identifiers, from the configuration.
fn store_options_from(config: &SdkConfig) -> StoreOptions {
    StoreOptions {
        domain: config.cookie_domain.clone(),
        path: Some("/".to_string()),
        max_age_ms: Some(config.cookie_expires_ms),
        same_site: Some(config.cookie_same_site.clone()),
        secure: config.cookie_secure,
    }
}

/// SDK entry point.
pub struct Sdk;

impl Sdk {
    /// Initialize the SDK against the host's page and capabilities.
    ///
    /// Geolocation, consent frameworks, flag fetches, and identity
    /// services may all be absent or failing; init degrades through all
    /// of them. A visitor outside the supported jurisdictions receives a
    /// suppressed (inert) handle rather than an error.
    ///
    /// # Errors
    ///
    /// [`InitError::Config`] when the configuration fails validation,
    /// carrying every violation at once.
    pub async fn init(
        config: SdkConfig,
        page: PageEnvironment,
        store: SharedStore,
        transport: SharedTransport,
        channel: Option<Arc<dyn CrossSiteChannel>>,
        framework: Option<Arc<dyn ConsentFramework>>,
    ) -> Result<SdkHandle> {
        logging::init_logging(&config.log);
        config.validate()?;
        let environment = config.environment()?;

        let country_override = config.normalized_country_code();

        // Geolocate only when the override is absent or CCPA-scoped; a
        // definitive non-US override answers the jurisdiction question
        // by itself.
        let geo = if is_ccpa_location(&country_override) {
            match config.endpoints.locate() {
                Ok(url) => Geolocation::fetch(&transport, url).await,
                Err(e) => {
                    debug!(error = %e, "no locate endpoint configured");
                    Geolocation::default()
                }
            }
        } else {
            Geolocation::default()
        };

        let country = if country_override.is_empty() {
            geo.country_alpha2.to_ascii_uppercase()
        } else {
            country_override
        };

        let outside_us = check_outside_us(framework.as_deref(), &HashMap::new());
        let consent_rule = if is_ccpa_location(&country) {
            ConsentRule::Us
        } else if outside_us.should_load && !outside_us.categories.is_empty() {
            ConsentRule::Gdpr
        } else {
            ConsentRule::Other
        };

        let flags = FlagGate::new();
        match config.endpoints.feature_flags(environment) {
            Ok(url) => {
                // fail-open: defaults answer when the service does not
                if let Err(e) = flags.fetch(&transport, url).await {
                    warn!(error = %e, "flag fetch failed, using defaults");
                }
            }
            Err(e) => debug!(error = %e, "no flag endpoint configured, using defaults"),
        }

        let proceed = match consent_rule {
            ConsentRule::Us => true,
            ConsentRule::Gdpr => flags.is_enabled("outside-us-location-check"),
            ConsentRule::Other => false,
        };

        let store_options = store_options_from(&config);
        let collect_url = config
            .endpoints
            .identity(environment)
            .map(str::to_string)
            .ok();
        let resolve_url = config
            .endpoints
            .id_resolve(environment)
            .map(str::to_string)
            .ok();

        if !proceed {
            info!(
                rule = consent_rule.as_str(),
                country = %country,
                "initialization suppressed by jurisdiction gate"
            );
            return Ok(Self::suppressed(
                config,
                environment,
                page,
                geo,
                consent_rule,
                outside_us.categories,
                store,
                store_options,
                transport,
            ));
        }

        if page.in_iframe {
            info!("running in an embedded frame, staying inert");
            return Ok(Self::suppressed(
                config,
                environment,
                page,
                geo,
                consent_rule,
                outside_us.categories,
                store,
                store_options,
                transport,
            ));
        }

        let consent = ConsentManager::init(
            flags.is_enabled("privacy"),
            &country,
            store.clone(),
            store_options.clone(),
        );

        let identity = IdentityManager::new(store.clone(), store_options.clone());
        let (ukid, created) = identity.init_ukid();
        if created {
            debug!(ukid = %ukid, "registered a new visitor id");
        }

        let url_csid = page.utm_term().and_then(|t| extract_csid_from_utm_term(&t));
        identity
            .init_cross_site_id(channel.as_deref(), url_csid.as_deref())
            .await;

        let session = SessionEngine::new(store.clone(), store_options.clone());
        session.establish(true);

        if let Some(url) = &resolve_url {
            identity.resolve_ids(&flags, &transport, url).await;
        }

        let queue = match &collect_url {
            Some(url) => Some(RetryQueue::spawn(
                store.clone(),
                store_options.clone(),
                QueueOptions::default(),
                transport.clone(),
                url.clone(),
                page.user_agent.clone(),
            )),
            None => {
                warn!("no collection endpoint configured, events will be dropped");
                None
            }
        };

        let inner = Arc::new(SdkInner {
            config,
            environment,
            state: SdkState::Ready,
            page,
            geo,
            consent_rule,
            consent_categories: outside_us.categories,
            store,
            transport,
            core: PayloadCore::new(),
            flags,
            consent,
            identity,
            session,
            engagement: Mutex::new(EngagementTracker::new(0.0)),
            slots: SlotRegistry::new(),
            queue,
            heartbeat: Mutex::new(None),
            exit_url: collect_url,
            page_data: RwLock::new(Value::Null),
            page_dynamic: RwLock::new(Value::Null),
            video_dynamic: RwLock::new(Value::Null),
        });

        inner.hydrate();
        if inner.flags.is_enabled("identity-onstart") {
            inner.emit(
                inner
                    .core
                    .track_identity_registration("identity on page start", None, None),
            );
        }

        if inner.flags.is_enabled("heartbeat-event") && inner.identity.ukid() != UKID_UNKNOWN {
            let weak = Arc::downgrade(&inner);
            let handle = HeartbeatHandle::spawn(
                Duration::from_millis(HEARTBEAT_INTERVAL_MS),
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.heartbeat_tick();
                    }
                }),
            );
            *inner.heartbeat.lock() = Some(handle);
        }

        info!(ukid = %inner.identity.ukid(), "SDK initialized");
        Ok(SdkHandle::new(inner))
    }

    #[allow(clippy::too_many_arguments)]
    fn suppressed(
        config: SdkConfig,
        environment: Environment,
        page: PageEnvironment,
        geo: Geolocation,
        consent_rule: ConsentRule,
        consent_categories: Vec<(String, bool)>,
        store: SharedStore,
        store_options: StoreOptions,
        transport: SharedTransport,
    ) -> SdkHandle {
        let consent = ConsentManager::init(false, "", store.clone(), store_options.clone());
        let identity = IdentityManager::new(store.clone(), store_options.clone());
        let session = SessionEngine::new(store.clone(), store_options);

        SdkHandle::new(Arc::new(SdkInner {
            config,
            environment,
            state: SdkState::Suppressed,
            page,
            geo,
            consent_rule,
            consent_categories,
            store,
            transport,
            core: PayloadCore::new(),
            flags: FlagGate::new(),
            consent,
            identity,
            session,
            engagement: Mutex::new(EngagementTracker::new(0.0)),
            slots: SlotRegistry::new(),
            queue: None,
            heartbeat: Mutex::new(None),
            exit_url: None,
            page_data: RwLock::new(Value::Null),
            page_dynamic: RwLock::new(Value::Null),
            video_dynamic: RwLock::new(Value::Null),
        }))
    }
}

#[cfg(test)]
mod lib_test;
