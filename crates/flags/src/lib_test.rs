use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use beacon_transport::{Method, Request, Response, Transport, TransportError};

use super::*;

fn record(flag_id: &str, enabled: bool) -> FlagRecord {
    FlagRecord {
        enabled,
        flag_id: flag_id.to_string(),
        flag_name: None,
        updated_since_last_query: None,
        user_id: None,
        user_id_type: None,
    }
}

struct FixedTransport(serde_json::Value);

#[async_trait]
impl Transport for FixedTransport {
    async fn send(
        &self,
        _url: &str,
        _request: Request,
    ) -> beacon_transport::Result<Response> {
        Ok(Response::Json(self.0.clone()))
    }

    fn send_beacon(&self, _url: &str, _body: String) {}
}

struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(
        &self,
        url: &str,
        _request: Request,
    ) -> beacon_transport::Result<Response> {
        Err(TransportError::Network {
            url: url.to_string(),
            method: Method::Get,
            message: "connect refused".to_string(),
        })
    }

    fn send_beacon(&self, _url: &str, _body: String) {}
}

#[test]
fn test_defaults_answer_when_list_empty() {
    let gate = FlagGate::new();
    assert!(gate.is_enabled("identity-onstart"));
    assert!(gate.is_enabled("telemetry"));
    assert!(gate.is_enabled("send-logs"));
    assert!(!gate.is_enabled("heartbeat-event"));
    assert!(!gate.is_enabled("idresolve"));
    assert!(!gate.is_enabled("promo"));
}

#[test]
fn test_live_list_answers_for_ids_without_defaults() {
    let gate = FlagGate::new();
    // absent from both the live list and the default table
    assert!(!gate.is_enabled("rollout-candidate"));

    gate.set_flags(vec![record("rollout-candidate", true)]);
    assert!(gate.is_enabled("rollout-candidate"));

    gate.set_flags(vec![record("rollout-candidate", false)]);
    assert!(!gate.is_enabled("rollout-candidate"));
}

#[test]
fn test_unknown_flag_reads_disabled() {
    let gate = FlagGate::new();
    assert!(!gate.is_enabled("no-such-flag"));
}

#[test]
fn test_live_list_overrides_default() {
    let gate = FlagGate::new();
    gate.set_flags(vec![
        record("telemetry", false),
        record("heartbeat-event", true),
    ]);
    assert!(!gate.is_enabled("telemetry"));
    assert!(gate.is_enabled("heartbeat-event"));
    // untouched flags still answer from defaults
    assert!(gate.is_enabled("session"));
}

#[tokio::test]
async fn test_fetch_installs_results() {
    let gate = FlagGate::new();
    let transport: beacon_transport::SharedTransport = Arc::new(FixedTransport(json!({
        "anyFlagsUpdatedSinceLastQuery": false,
        "results": [
            {"flagId": "telemetry", "enabled": false},
            {"flagId": "promo", "enabled": true, "flagName": "Promo placements"}
        ]
    })));

    gate.fetch(&transport, "https://flags.example.com/queryAll")
        .await
        .unwrap();

    assert!(!gate.is_enabled("telemetry"));
    assert!(gate.is_enabled("promo"));
    assert_eq!(gate.flags().len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_keeps_previous_list() {
    let gate = FlagGate::new();
    gate.set_flags(vec![record("telemetry", false)]);

    let transport: beacon_transport::SharedTransport = Arc::new(FailingTransport);
    let err = gate
        .fetch(&transport, "https://flags.example.com/queryAll")
        .await
        .unwrap_err();

    assert!(matches!(err, FlagError::Transport(_)));
    assert!(!gate.is_enabled("telemetry"));
}

#[tokio::test]
async fn test_fetch_malformed_body_errors() {
    let gate = FlagGate::new();
    let transport: beacon_transport::SharedTransport =
        Arc::new(FixedTransport(json!({"unexpected": true})));

    let err = gate
        .fetch(&transport, "https://flags.example.com/queryAll")
        .await
        .unwrap_err();
    assert!(matches!(err, FlagError::Malformed { .. }));
}
