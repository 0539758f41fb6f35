//! Outbound event relay.
//!
//! Builds the reply CloudEvent from a model's output and posts it once, in
//! binary mode, to the configured destination. No retry, no backoff: a non-2xx
//! answer or a transport error is a `Delivery` error.

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use monrelay_core::envelope::{Envelope, JSON_CONTENT_TYPE, SPEC_VERSION};
use monrelay_core::error::{RelayError, Result};

/// Where replies go and how they are labelled.
#[derive(Debug, Clone)]
pub struct RelayTarget {
    pub url: String,
    pub event_type: String,
    pub event_source: String,
}

/// Build the reply event for `data`.
///
/// The inbound id is inherited when present, otherwise a fresh one is minted.
/// Extensions are copied verbatim; the timestamp is always taken now.
pub fn build_outbound(data: Value, inbound: &Envelope, event_type: &str, event_source: &str) -> Envelope {
    let id = if inbound.id.is_empty() {
        uuid::Uuid::new_v4().simple().to_string()
    } else {
        inbound.id.clone()
    };

    Envelope {
        id,
        source: event_source.to_string(),
        spec_version: SPEC_VERSION.to_string(),
        event_type: event_type.to_string(),
        data_content_type: Some(JSON_CONTENT_TYPE.to_string()),
        data_schema: None,
        subject: None,
        time: Some(Utc::now().to_rfc3339()),
        extensions: inbound.extensions.clone(),
        data: Some(data),
    }
}

/// HTTP sender for reply events.
pub struct EventRelay {
    client: Client,
    target: RelayTarget,
}

impl std::fmt::Debug for EventRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRelay")
            .field("url", &self.target.url)
            .field("event_type", &self.target.event_type)
            .field("event_source", &self.target.event_source)
            .finish()
    }
}

impl EventRelay {
    pub fn new(target: RelayTarget, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("monrelay/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Config(format!("failed to create relay client: {e}")))?;

        info!(
            url = %target.url,
            timeout_ms = timeout.as_millis() as u64,
            "reply relay enabled"
        );

        Ok(Self { client, target })
    }

    pub fn build(&self, data: Value, inbound: &Envelope) -> Envelope {
        build_outbound(data, inbound, &self.target.event_type, &self.target.event_source)
    }

    /// Post `event` once in binary mode.
    pub async fn send(&self, event: &Envelope) -> Result<()> {
        let (headers, body) = event.to_binary()?;
        let url = &self.target.url;

        debug!(event = %event.to_structured(), "binary CloudEvent");
        for (k, v) in &headers {
            debug!(header = %k, value = %v, "outbound header");
        }

        let mut req = self.client.post(url);
        for (k, v) in headers {
            req = req.header(k, v);
        }

        let response = req
            .body(body)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("POST {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Delivery(format!("{url} answered {status}")));
        }

        debug!(event_id = %event.id, %status, "reply event delivered");
        Ok(())
    }
}
