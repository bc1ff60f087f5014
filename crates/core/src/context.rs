//! Common context types merged into every payload
//!
//! Each type here maps to one persistent entry in the payload core; the
//! orchestrator refreshes them before every track call. Serialized field
//! names follow the collection schema, so several carry explicit renames.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Third-party and resolved identifiers attached under `ids`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ids {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub convivaid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kruxid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liverampatsid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tradedeskuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hhid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hhid_version: Option<String>,
}

/// Device details captured from the host environment.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport_size: Option<String>,
}

/// Version metadata for a co-resident consent management library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentLibraryInfo {
    pub version: String,
    pub using_sdk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub init_config: Option<Value>,
}

/// SDK self-description attached under `library`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub name: String,
    pub version: String,
    pub init_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_library: Option<ConsentLibraryInfo>,
}

/// Page location details attached under `navigationProperties`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationProperties {
    pub url: String,
    pub root_domain: String,
    pub referrer: String,
    pub path: String,
    pub search: String,
    pub title: String,
}

/// Geolocation details attached under `location`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationProperties {
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
    pub timezone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub language: String,
}

/// Consent snapshot attached under `consentProperties`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentProperties {
    pub usp_string: String,
    pub consent_rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optanon_consent: Option<String>,
}

/// IAB consent category map attached under `iabConsentCategories`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IabConsentCategories {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_categories: Option<HashMap<String, Value>>,
}

/// Scroll and dwell metrics accumulated between heartbeats.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_time: Option<u64>,
    pub engaged_time: u64,
    pub interval: u64,
    pub max_scroll_depth: f64,
    pub current_scroll_position: f64,
    pub did_scroll_up_during_interval: bool,
}

/// Promo placement metrics attached inside `eventProperties`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromoMetrics {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_position: Option<String>,
    #[serde(rename = "destinationURL", skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    pub feature_flag_values: Value,
}

/// Per-event properties attached under `eventProperties`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opt_out: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_not_sell: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_not_track: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub third_party_cookies_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_private_browsing: Option<bool>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub feature_flag_values: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub cookies: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automated_test: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat: Option<EngagementMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo: Option<PromoMetrics>,
}

/// The session that ended when a rollover created the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousSession {
    pub sessionid: String,
    pub session_duration: i64,
    #[serde(rename = "psmLastActiveTimestamp")]
    pub last_active_timestamp: String,
    #[serde(rename = "psmSessionStart")]
    pub session_start: String,
}

/// Session snapshot attached under `session`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionProperties {
    pub is_session_start: bool,
    pub pageloadid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_session: Option<PreviousSession>,
    #[serde(rename = "psmLastActiveTimestamp")]
    pub last_active_timestamp: String,
    #[serde(rename = "psmSessionStart")]
    pub session_start: String,
    pub session_duration: i64,
    pub sessionid: String,
}

/// Details delivered with a consent-change notification.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConsentEventDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcf: Option<String>,
    #[serde(rename = "new", skip_serializing_if = "Option::is_none")]
    pub new_categories: Option<HashMap<String, bool>>,
    #[serde(rename = "old", skip_serializing_if = "Option::is_none")]
    pub old_categories: Option<HashMap<String, bool>>,
}

/// Viewability metrics for a single ad slot.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMetrics {
    pub slot_id: String,
    pub slot_size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ad_unit_path: Option<String>,
    pub total_view_time: u64,
    pub last_view_started: u64,
    pub visible_on_start: bool,
    pub ad_was_viewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rfv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_item_id: Option<String>,
    pub total_hover_time: u64,
    pub last_hover_started: u64,
}

/// Ad slot state attached under `adsProperties`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdsProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ads: Option<Vec<SlotMetrics>>,
}

/// Page and video metadata attached under `contentMetadata`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_properties_wire_names() {
        let props = SessionProperties {
            is_session_start: true,
            pageloadid: 1_704_099_549_000,
            previous_session: None,
            last_active_timestamp: "2024-01-01T09:09:09.000Z".to_string(),
            session_start: "2024-01-01T09:09:09.000Z".to_string(),
            session_duration: 0,
            sessionid: "s-1".to_string(),
        };
        let value = serde_json::to_value(&props).unwrap();
        assert_eq!(value["isSessionStart"], json!(true));
        assert_eq!(value["pageloadid"], json!(1_704_099_549_000i64));
        assert!(value["psmSessionStart"].is_string());
        assert!(value["psmLastActiveTimestamp"].is_string());
        assert_eq!(value["sessionid"], json!("s-1"));
        assert!(value.get("previousSession").is_none());
    }

    #[test]
    fn test_ids_skips_absent_fields() {
        let ids = Ids {
            csid: Some("c-1".to_string()),
            hhid_version: Some("2".to_string()),
            ..Ids::default()
        };
        let value = serde_json::to_value(&ids).unwrap();
        assert_eq!(value, json!({"csid": "c-1", "hhidVersion": "2"}));
    }

    #[test]
    fn test_device_type_wire_name() {
        let device = Device {
            device_type: "desktop".to_string(),
            user_agent: "agent".to_string(),
            ..Device::default()
        };
        let value = serde_json::to_value(&device).unwrap();
        assert_eq!(value["type"], json!("desktop"));
        assert_eq!(value["userAgent"], json!("agent"));
    }

    #[test]
    fn test_promo_destination_url_casing() {
        let promo = PromoMetrics {
            id: json!(7),
            destination_url: Some("https://example.com".to_string()),
            ..PromoMetrics::default()
        };
        let value = serde_json::to_value(&promo).unwrap();
        assert!(value.get("destinationURL").is_some());
    }

    #[test]
    fn test_consent_details_category_renames() {
        let details = UserConsentEventDetails {
            usp: Some("1YNN".to_string()),
            new_categories: Some(HashMap::from([("C0001".to_string(), true)])),
            ..UserConsentEventDetails::default()
        };
        let value = serde_json::to_value(&details).unwrap();
        assert!(value.get("new").is_some());
        assert!(value.get("newCategories").is_none());
    }
}
