//! Shared fixtures for gateway integration tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Router};
use bytes::Bytes;
use serde_json::Value;
use tokio::net::TcpListener;

use monrelay_core::error::Result;
use monrelay_core::model::{ModelResponse, RequestContext};
use monrelay_core::protocol::ExtractedPayload;
use monrelay_gateway::app_state::AppState;
use monrelay_gateway::config::RelayConfig;
use monrelay_gateway::model::MonitorModel;
use monrelay_gateway::router::build_router;

/// Model answering with a fixed response and counting calls.
pub struct FixedModel {
    name: String,
    response: ModelResponse,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_ctx: Mutex<Option<RequestContext>>,
}

impl FixedModel {
    pub fn new(name: &str, response: ModelResponse) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            response,
            delay: None,
            calls: AtomicUsize::new(0),
            last_ctx: Mutex::new(None),
        })
    }

    pub fn slow(name: &str, response: ModelResponse, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            response,
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            last_ctx: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_ctx(&self) -> Option<RequestContext> {
        self.last_ctx.lock().unwrap().clone()
    }
}

#[async_trait]
impl MonitorModel for FixedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, _payload: ExtractedPayload, ctx: RequestContext) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_ctx.lock().unwrap() = Some(ctx);
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(self.response.clone())
    }
}

pub fn test_config() -> RelayConfig {
    let mut cfg = RelayConfig::default();
    cfg.metrics.deployment_namespace = "test-ns".into();
    cfg
}

/// Serve the relay on an ephemeral port; returns its base URL.
pub async fn spawn_app(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    format!("http://{addr}")
}

/// One request seen by a [`Receiver`].
#[derive(Debug, Clone)]
pub struct Received {
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone)]
struct ReceiverState {
    status: StatusCode,
    seen: Arc<Mutex<Vec<Received>>>,
}

/// Downstream consumer standing in for the reply destination.
pub struct Receiver {
    pub url: String,
    seen: Arc<Mutex<Vec<Received>>>,
}

impl Receiver {
    pub fn received(&self) -> Vec<Received> {
        self.seen.lock().unwrap().clone()
    }
}

async fn record(State(st): State<ReceiverState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    st.seen.lock().unwrap().push(Received { headers, body });
    st.status
}

pub async fn spawn_receiver(status: StatusCode) -> Receiver {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().route("/", post(record)).with_state(ReceiverState {
        status,
        seen: Arc::clone(&seen),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Receiver {
        url: format!("http://{addr}/"),
        seen,
    }
}

/// A URL nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}

pub async fn scrape(base: &str) -> String {
    reqwest::get(format!("{base}/v1/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap()
}
