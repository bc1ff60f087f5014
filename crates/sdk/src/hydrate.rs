//! Payload hydration
//!
//! Before every track call the orchestrator pushes fresh snapshots of
//! every common context entry into the payload core, so each event
//! carries the state of the world at emission time. Hydration is
//! last-write-wins per field.

use serde_json::{Map, Value};

use beacon_core::context::{
    AdsProperties, ConsentProperties, ContentMetadata, EngagementMetrics, EventProperties,
    IabConsentCategories, Library, PromoMetrics,
};
use beacon_config::{Environment, MetadataDescriptor};

use crate::SdkInner;

/// Company name stamped on every payload.
const COMPANY_NAME: &str = "Beacon";

/// Store key for the ads GUID.
const AD_GUID_KEY: &str = "ug";

impl SdkInner {
    /// Refresh every common context entry.
    pub(crate) fn hydrate(&self) {
        self.hydrate_with(None, None);
    }

    /// Refresh every common context entry, attaching interval metrics to
    /// the event properties when the caller has them.
    pub(crate) fn hydrate_with(
        &self,
        heartbeat: Option<EngagementMetrics>,
        promo: Option<PromoMetrics>,
    ) {
        let core = &self.core;

        core.set_platform(&self.config.platform);
        core.add_entry("companyName", Value::String(COMPANY_NAME.to_string()));
        core.set_brand(&self.config.brand);
        core.set_sub_brand(&self.config.sub_brand);
        core.set_product_name(&self.config.product_name);
        core.set_library(&self.library());

        core.set_device(&self.page.device());
        core.set_navigation_properties(&self.page.navigation_properties());
        core.set_client_resolved_ip(&self.geo.ip_address);
        core.set_location(&self.geo.location_properties(&self.page));

        core.set_consent_properties(&self.consent_properties());
        core.set_iab_categories(&self.iab_categories());

        core.set_ukid(&self.identity.ukid());
        core.set_third_party_ids(&self.identity.get_ids());

        core.set_event_properties(&self.event_properties(heartbeat, promo));
        core.set_session_properties(&self.session.current());
        core.set_ads_properties(&self.ads_properties());
        core.set_content_metadata(&self.content_metadata());
    }

    /// The SDK's self-description.
    pub(crate) fn library(&self) -> Library {
        Library {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            init_config: serde_json::to_value(&self.config).unwrap_or(Value::Null),
            consent_library: None,
        }
    }

    /// The consent snapshot for the current rule and privacy string.
    pub(crate) fn consent_properties(&self) -> ConsentProperties {
        ConsentProperties {
            usp_string: self.consent.usp_string().unwrap_or_default(),
            consent_rule: self.consent_rule.as_str().to_string(),
            optanon_consent: self.store.get("OptanonConsent"),
        }
    }

    fn iab_categories(&self) -> IabConsentCategories {
        if self.consent_categories.is_empty() {
            return IabConsentCategories::default();
        }
        let categories = self
            .consent_categories
            .iter()
            .map(|(name, granted)| (name.clone(), Value::Bool(*granted)))
            .collect();
        IabConsentCategories {
            consent_categories: Some(categories),
        }
    }

    fn event_properties(
        &self,
        heartbeat: Option<EngagementMetrics>,
        promo: Option<PromoMetrics>,
    ) -> EventProperties {
        let flags = self.flags.flags();
        let flag_values = if flags.is_empty() {
            Value::Null
        } else {
            Value::Object(
                flags
                    .into_iter()
                    .map(|flag| (flag.flag_id, Value::Bool(flag.enabled)))
                    .collect(),
            )
        };

        EventProperties {
            do_not_track: Some(self.page.do_not_track),
            cookies_enabled: Some(self.page.cookies_enabled),
            third_party_cookies_enabled: self.identity.third_party_cookies_enabled(),
            feature_flag_values: flag_values,
            automated_test: (self.environment == Environment::AutomatedTest).then_some(true),
            heartbeat,
            promo,
            ..EventProperties::default()
        }
    }

    /// Ad slot state for the payload.
    pub(crate) fn ads_properties(&self) -> AdsProperties {
        let slots = self.slots.snapshot();
        AdsProperties {
            guid: self.store.get(AD_GUID_KEY),
            transid: None,
            ads: (!slots.is_empty()).then_some(slots),
        }
    }

    fn content_metadata(&self) -> ContentMetadata {
        ContentMetadata {
            page: resolve_descriptors(
                &self.config.content_metadata.page,
                &self.page_data.read(),
                &self.page_dynamic.read(),
            ),
            video: resolve_descriptors(
                &self.config.content_metadata.video,
                &self.page_data.read(),
                &self.video_dynamic.read(),
            ),
        }
    }
}

/// Resolve configured descriptors against the host's static page data
/// and the latest published dynamic data. Static locations win; an
/// unresolved descriptor emits null, which the snapshot strips.
fn resolve_descriptors(
    descriptors: &[MetadataDescriptor],
    static_root: &Value,
    dynamic_root: &Value,
) -> Option<Value> {
    if descriptors.is_empty() {
        return None;
    }

    let mut resolved = Map::new();
    for descriptor in descriptors {
        let value = descriptor
            .static_locations
            .iter()
            .find_map(|path| lookup_path(static_root, path))
            .or_else(|| {
                descriptor
                    .dynamic_locations
                    .iter()
                    .find_map(|path| lookup_path(dynamic_root, path))
            })
            .unwrap_or(Value::Null);
        resolved.insert(descriptor.name.clone(), value);
    }
    Some(Value::Object(resolved))
}

/// Follow a dotted path into a JSON value.
fn lookup_path(root: &Value, path: &str) -> Option<Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current.clone())
    }
}
