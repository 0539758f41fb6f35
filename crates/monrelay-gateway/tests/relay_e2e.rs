//! Reply relay: envelope building and delivery semantics.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::{json, Value};

use monrelay_core::envelope::Envelope;
use monrelay_core::model::ModelResponse;
use monrelay_gateway::app_state::AppState;
use monrelay_gateway::config::RelayFailureMode;
use monrelay_gateway::model::ScoreModel;
use monrelay_gateway::relay::{build_outbound, EventRelay, RelayTarget};

use common::{scrape, spawn_app, spawn_receiver, test_config, unreachable_url, FixedModel};

fn event_body() -> String {
    json!({ "predicted": [1, 0, 1], "actual": [1, 1, 1], "task_type": "classification" }).to_string()
}

fn header<'a>(h: &'a axum::http::HeaderMap, name: &str) -> &'a str {
    h.get(name).and_then(|v| v.to_str().ok()).unwrap_or("")
}

#[test]
fn outbound_mints_id_and_copies_extensions() {
    let mut inbound = Envelope::default();
    inbound.extensions.insert("a".into(), "1".into());
    inbound.extensions.insert("b".into(), "2".into());

    let out = build_outbound(json!({ "x": 1 }), &inbound, "reply.type", "reply.source");
    assert!(!out.id.is_empty());
    assert_eq!(out.extensions, inbound.extensions);
    assert_eq!(out.event_type, "reply.type");
    assert_eq!(out.source, "reply.source");
    assert_eq!(out.data_content_type.as_deref(), Some("application/json"));
    assert!(chrono::DateTime::parse_from_rfc3339(out.time.as_deref().unwrap()).is_ok());

    let again = build_outbound(json!({ "x": 1 }), &inbound, "reply.type", "reply.source");
    assert_ne!(out.id, again.id);
}

#[test]
fn outbound_inherits_id_but_not_time() {
    let inbound = Envelope {
        id: "evt-7".into(),
        time: Some("2001-01-01T00:00:00Z".into()),
        ..Default::default()
    };
    let out = build_outbound(json!(null), &inbound, "t", "s");
    assert_eq!(out.id, "evt-7");
    assert_ne!(out.time.as_deref(), Some("2001-01-01T00:00:00Z"));
}

#[tokio::test]
async fn relays_reply_with_extensions_and_fresh_id() {
    let receiver = spawn_receiver(StatusCode::OK).await;
    let mut cfg = test_config();
    cfg.events.reply_url = receiver.url.clone();
    cfg.events.event_type = "io.monrelay.test.reply".into();
    cfg.events.event_source = "relay-e2e".into();

    let state = AppState::new(cfg, Arc::new(ScoreModel::new())).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .header("content-type", "application/json")
        .header("ce-specversion", "1.0")
        .header("ce-id", "")
        .header("ce-source", "caller")
        .header("ce-type", "io.monrelay.request")
        .header("ce-a", "1")
        .header("ce-b", "2")
        .body(event_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let data: Value = resp.json().await.unwrap();

    let got = receiver.received();
    assert_eq!(got.len(), 1);
    let r = &got[0];
    assert_eq!(header(&r.headers, "ce-a"), "1");
    assert_eq!(header(&r.headers, "ce-b"), "2");
    assert!(!header(&r.headers, "ce-id").is_empty());
    assert_eq!(header(&r.headers, "ce-type"), "io.monrelay.test.reply");
    assert_eq!(header(&r.headers, "ce-source"), "relay-e2e");
    assert_eq!(header(&r.headers, "ce-specversion"), "1.0");
    assert_eq!(header(&r.headers, "content-type"), "application/json");
    assert!(!header(&r.headers, "ce-time").is_empty());
    assert_eq!(r.body, data);

    assert!(scrape(&base).await.contains("monrelay_relay_total{result=\"ok\"} 1"));
}

#[tokio::test]
async fn relay_keeps_inbound_id() {
    let receiver = spawn_receiver(StatusCode::ACCEPTED).await;
    let mut cfg = test_config();
    cfg.events.reply_url = receiver.url.clone();

    let state = AppState::new(cfg, Arc::new(ScoreModel::new())).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .header("content-type", "application/json")
        .header("ce-id", "evt-42")
        .body(event_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&receiver.received()[0].headers, "ce-id"), "evt-42");
}

#[tokio::test]
async fn no_data_means_no_relay() {
    let receiver = spawn_receiver(StatusCode::OK).await;
    let mut cfg = test_config();
    cfg.events.reply_url = receiver.url.clone();

    let state = AppState::new(cfg, FixedModel::new("fixed", ModelResponse::default())).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .body(event_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(receiver.received().is_empty());
}

#[tokio::test]
async fn unreachable_destination_fails_closed_by_default() {
    let model = FixedModel::new("fixed", ModelResponse::with_data(json!({ "score": 1 })));
    let mut cfg = test_config();
    cfg.events.reply_url = unreachable_url().await;
    cfg.events.relay_timeout_ms = 2_000;

    let state = AppState::new(cfg, model.clone()).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .body(event_body())
        .send()
        .await
        .unwrap();

    assert_eq!(model.calls(), 1);
    assert_eq!(resp.status(), 500);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "DELIVERY_FAILED");
    assert!(err.get("score").is_none());
}

#[tokio::test]
async fn non_2xx_destination_is_a_delivery_error() {
    let receiver = spawn_receiver(StatusCode::SERVICE_UNAVAILABLE).await;
    let mut cfg = test_config();
    cfg.events.reply_url = receiver.url.clone();

    let state = AppState::new(cfg, Arc::new(ScoreModel::new())).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .body(event_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    assert_eq!(receiver.received().len(), 1);
    assert!(scrape(&base).await.contains("monrelay_relay_total{result=\"error\"} 1"));
}

#[tokio::test]
async fn decoupled_mode_still_answers_the_caller() {
    let model = FixedModel::new("fixed", ModelResponse::with_data(json!({ "score": 1 })));
    let mut cfg = test_config();
    cfg.events.reply_url = unreachable_url().await;
    cfg.events.on_relay_failure = RelayFailureMode::Decoupled;

    let state = AppState::new(cfg, model).unwrap();
    let base = spawn_app(state).await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .body(event_body())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "score": 1 }));
}

#[tokio::test]
async fn send_reports_transport_errors() {
    let relay = EventRelay::new(
        RelayTarget {
            url: unreachable_url().await,
            event_type: "t".into(),
            event_source: "s".into(),
        },
        Duration::from_millis(500),
    )
    .unwrap();

    let event = relay.build(json!(1), &Envelope::default());
    let err = relay.send(&event).await.unwrap_err();
    assert_eq!(err.client_code().as_str(), "DELIVERY_FAILED");
}

#[tokio::test]
async fn unrelayable_extension_is_rejected_as_bad_input() {
    let receiver = spawn_receiver(StatusCode::OK).await;
    let model = FixedModel::new("fixed", ModelResponse::with_data(json!({ "score": 1 })));
    let mut cfg = test_config();
    cfg.events.reply_url = receiver.url.clone();

    let state = AppState::new(cfg, model.clone()).unwrap();
    let base = spawn_app(state).await;

    let body = json!({
        "specversion": "1.0",
        "id": "s-1",
        "source": "e2e",
        "type": "io.monrelay.request",
        "Trace-Id": "abc",
        "data": { "predicted": [1], "actual": [1], "task_type": "classification" }
    });
    let resp = reqwest::Client::new()
        .post(format!("{base}/"))
        .header("content-type", "application/cloudevents+json")
        .body(body.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let err: Value = resp.json().await.unwrap();
    assert_eq!(err["code"], "BAD_REQUEST");
    assert_eq!(model.calls(), 0);
    assert!(receiver.received().is_empty());
}
