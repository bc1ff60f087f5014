use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use beacon_config::{Environment, MetadataDescriptor, SdkConfig};
use beacon_consent::ConsentFramework;
use beacon_core::context::UserConsentEventDetails;
use beacon_identity::is_uuid;
use beacon_store::MemoryStore;
use beacon_transport::{Method, Request, Response, Transport, TransportError};

use super::*;

/// Canned transport: US geolocation, a configurable flag response, and
/// empty acknowledgements for everything else.
struct FakeTransport {
    flag_response: Option<Value>,
    sent: Mutex<Vec<(String, Request)>>,
    beacons: Mutex<Vec<(String, String)>>,
}

impl FakeTransport {
    fn new(flag_response: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            flag_response,
            sent: Mutex::new(Vec::new()),
            beacons: Mutex::new(Vec::new()),
        })
    }

    fn posts_to(&self, fragment: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(url, req)| url.contains(fragment) && req.method == Method::Post)
            .filter_map(|(_, req)| req.body.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, url: &str, request: Request) -> beacon_transport::Result<Response> {
        self.sent.lock().push((url.to_string(), request));

        if url.contains("locate") {
            return Ok(Response::Json(json!({
                "country": "United States",
                "country_alpha2": "US",
                "ip_address": "203.0.113.9",
                "states": [{"state": "GA", "cities": ["Atlanta"], "zipcodes": ["30303"]}]
            })));
        }
        if url.contains("flags") {
            return match &self.flag_response {
                Some(value) => Ok(Response::Json(value.clone())),
                None => Err(TransportError::Network {
                    url: url.to_string(),
                    method: Method::Get,
                    message: "connect timeout".to_string(),
                }),
            };
        }
        Ok(Response::Text(String::new()))
    }

    fn send_beacon(&self, url: &str, body: String) {
        self.beacons.lock().push((url.to_string(), body));
    }
}

struct AllGranted;

impl ConsentFramework for AllGranted {
    fn combined_purpose_grants(&self) -> Option<HashMap<String, bool>> {
        Some(
            ["1", "3", "5", "6", "8", "9", "10"]
                .into_iter()
                .map(|id| (id.to_string(), true))
                .collect(),
        )
    }
}

fn flag_list(entries: &[(&str, bool)]) -> Value {
    json!({
        "anyFlagsUpdatedSinceLastQuery": false,
        "results": entries
            .iter()
            .map(|(id, enabled)| json!({"flagId": id, "enabled": enabled}))
            .collect::<Vec<_>>()
    })
}

fn test_config(country: Option<&str>) -> SdkConfig {
    let mut config = SdkConfig::new(Environment::Prod, "example-news");
    config.country_code = country.map(str::to_string);
    config.endpoints.locate = Some("https://geo.test/locate".to_string());
    let _ = config
        .endpoints
        .feature_flags
        .insert(Environment::Prod, "https://flags.test/all".to_string());
    let _ = config
        .endpoints
        .identity
        .insert(Environment::Prod, "https://collect.test/v1".to_string());
    config
}

async fn init_with(
    config: SdkConfig,
    page: PageEnvironment,
    transport: Arc<FakeTransport>,
    framework: Option<Arc<dyn ConsentFramework>>,
) -> SdkHandle {
    Sdk::init(
        config,
        page,
        MemoryStore::shared(),
        transport,
        None,
        framework,
    )
    .await
    .unwrap()
}

/// Let the paused clock drive the queue through its delivery cycle.
async fn settle() {
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let err = Sdk::init(
        SdkConfig::default(),
        PageEnvironment::default(),
        MemoryStore::shared(),
        transport,
        None,
        None,
    )
    .await
    .unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("environment"));
    assert!(msg.contains("brand"));
}

#[tokio::test(start_paused = true)]
async fn test_us_visitor_initializes_and_registers() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport.clone(),
        None,
    )
    .await;

    assert_eq!(handle.state(), SdkState::Ready);
    assert!(is_uuid(&handle.get_ukid()));
    assert_eq!(handle.get_consent_properties().usp_string, "1YNN");
    assert_eq!(handle.get_consent_properties().consent_rule, "US");

    settle().await;
    let bodies = transport.posts_to("collect.test");
    assert_eq!(bodies.len(), 1);
    assert!(bodies[0].contains("identity on page start"));
    // one-batch session fields clear after the submission
    assert!(!handle.get_session_properties().is_session_start);
}

#[tokio::test]
async fn test_unresolved_location_is_treated_as_us() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let mut config = test_config(None);
    config.endpoints.locate = None;

    let handle = init_with(config, PageEnvironment::default(), transport, None).await;
    assert_eq!(handle.state(), SdkState::Ready);
}

#[tokio::test]
async fn test_gdpr_without_check_flag_is_suppressed() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let handle = init_with(
        test_config(Some("DE")),
        PageEnvironment::default(),
        transport,
        Some(Arc::new(AllGranted)),
    )
    .await;

    assert_eq!(handle.state(), SdkState::Suppressed);
    assert_eq!(handle.get_ukid(), "Unknown");
    assert_eq!(handle.get_csid(), None);
}

#[tokio::test]
async fn test_gdpr_with_check_flag_proceeds() {
    let transport = FakeTransport::new(Some(flag_list(&[("outside-us-location-check", true)])));
    let handle = init_with(
        test_config(Some("DE")),
        PageEnvironment::default(),
        transport,
        Some(Arc::new(AllGranted)),
    )
    .await;

    assert_eq!(handle.state(), SdkState::Ready);
    assert!(is_uuid(&handle.get_ukid()));
    assert_eq!(handle.get_consent_properties().consent_rule, "GDPR");
}

#[tokio::test]
async fn test_no_framework_outside_us_is_suppressed() {
    // even with the check flag, no framework answer means no loading
    let transport = FakeTransport::new(Some(flag_list(&[("outside-us-location-check", true)])));
    let handle = init_with(
        test_config(Some("DE")),
        PageEnvironment::default(),
        transport,
        None,
    )
    .await;

    assert_eq!(handle.state(), SdkState::Suppressed);
}

#[tokio::test(start_paused = true)]
async fn test_embedded_frame_stays_inert() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let page = PageEnvironment {
        in_iframe: true,
        ..PageEnvironment::default()
    };
    let handle = init_with(test_config(Some("US")), page, transport.clone(), None).await;

    assert_eq!(handle.state(), SdkState::Suppressed);
    handle.track_app_load();
    settle().await;
    assert!(transport.posts_to("collect.test").is_empty());
}

#[tokio::test]
async fn test_flag_fetch_failure_proceeds_with_defaults() {
    let transport = FakeTransport::new(None);
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport,
        None,
    )
    .await;

    assert_eq!(handle.state(), SdkState::Ready);
    assert!(handle.get_flags().is_empty());
    assert!(handle.is_identity_on_start_enabled());
    assert!(handle.is_telemetry_enabled());
}

#[tokio::test(start_paused = true)]
async fn test_page_exit_goes_out_as_beacon() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport.clone(),
        None,
    )
    .await;

    handle.page_exit("pagehide");

    let beacons = transport.beacons.lock().clone();
    assert_eq!(beacons.len(), 1);
    assert!(beacons[0].0.contains("collect.test"));
    assert!(beacons[0].1.contains("pageExit"));
    assert!(beacons[0].1.contains("pagehide"));
}

#[tokio::test(start_paused = true)]
async fn test_consent_change_updates_string_and_tracks() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport.clone(),
        None,
    )
    .await;

    handle.consent_changed(UserConsentEventDetails {
        usp: Some("1YYN".to_string()),
        region: Some("CA".to_string()),
        ..UserConsentEventDetails::default()
    });

    assert_eq!(handle.get_consent_properties().usp_string, "1YYN");

    settle().await;
    let bodies = transport.posts_to("collect.test");
    assert!(bodies.iter().any(|b| b.contains("consent update")));
}

#[tokio::test(start_paused = true)]
async fn test_ccpa_opt_out_emits_do_not_share() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport.clone(),
        None,
    )
    .await;

    assert_eq!(handle.ccpa_do_not_share(), Some("1YYN".to_string()));

    settle().await;
    let bodies = transport.posts_to("collect.test");
    assert!(bodies.iter().any(|b| b.contains("ccpaDoNotShare")));
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_emits_on_interval() {
    let transport = FakeTransport::new(Some(flag_list(&[("heartbeat-event", true)])));
    let handle = init_with(
        test_config(Some("US")),
        PageEnvironment::default(),
        transport.clone(),
        None,
    )
    .await;
    assert_eq!(handle.state(), SdkState::Ready);

    tokio::time::sleep(Duration::from_millis(HEARTBEAT_INTERVAL_MS + 1_000)).await;
    settle().await;

    let bodies = transport.posts_to("collect.test");
    assert!(bodies.iter().any(|b| b.contains("heartbeat")));

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_published_data_feeds_content_metadata() {
    let transport = FakeTransport::new(Some(flag_list(&[])));
    let mut config = test_config(Some("US"));
    config.topics.page = vec!["page.update".to_string()];
    config.content_metadata.page = vec![MetadataDescriptor {
        name: "section".to_string(),
        static_locations: vec![],
        dynamic_locations: vec!["detail.section".to_string()],
    }];

    let handle = init_with(config, PageEnvironment::default(), transport.clone(), None).await;
    handle.publish("page.update", json!({"detail": {"section": "sports"}}));
    handle.track_app_load();

    settle().await;
    let bodies = transport.posts_to("collect.test");
    let app_load = bodies.iter().find(|b| b.contains("appLoad")).unwrap();
    assert!(app_load.contains(r#""section":"sports""#));
}
