//! Event pipeline.
//!
//! One linear pass per request, no loops, no retries:
//! parse JSON -> validate -> extract -> parse envelope -> build context ->
//! invoke model -> aggregate metrics -> optional relay -> respond.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, error, warn};

use monrelay_core::envelope::{Envelope, Headers};
use monrelay_core::error::{RelayError, Result};
use monrelay_core::model::RequestContext;
use monrelay_core::protocol::Extractor;

use crate::config::RelayFailureMode;
use crate::model::RegisteredModel;
use crate::obs::{MetricsHandle, RelayMetrics};
use crate::relay::EventRelay;

/// Knobs taken from configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Event type label for model metrics.
    pub event_type: String,
    pub model_timeout: Option<Duration>,
    pub on_relay_failure: RelayFailureMode,
}

pub struct EventPipeline {
    extractor: Arc<dyn Extractor>,
    model: RegisteredModel,
    metrics: MetricsHandle,
    relay: Option<EventRelay>,
    stats: Arc<RelayMetrics>,
    opts: PipelineOptions,
}

impl EventPipeline {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        model: RegisteredModel,
        metrics: MetricsHandle,
        relay: Option<EventRelay>,
        stats: Arc<RelayMetrics>,
        opts: PipelineOptions,
    ) -> Self {
        Self {
            extractor,
            model,
            metrics,
            relay,
            stats,
            opts,
        }
    }

    pub fn model(&self) -> &RegisteredModel {
        &self.model
    }

    /// Run one inbound event through the pipeline. `Ok(data)` is the model's
    /// output to echo back to the caller.
    pub async fn handle(&self, headers: &Headers, body: &[u8]) -> Result<Option<Value>> {
        let res = self.run(headers, body).await;
        let outcome = match &res {
            Ok(_) => "ok",
            Err(e) if e.is_client_error() => "bad_request",
            Err(_) => "error",
        };
        self.stats.events.inc(&[("outcome", outcome)]);
        res
    }

    async fn run(&self, headers: &Headers, body: &[u8]) -> Result<Option<Value>> {
        // 1) parse
        let json: Value = serde_json::from_slice(body)
            .map_err(|e| RelayError::BadRequest(format!("unrecognized request format: {e}")))?;

        // 2) validate, 3) extract
        self.extractor.validate(&json)?;
        let payload = self.extractor.extract(&json)?;

        // 4) envelope
        let inbound = Envelope::from_request(headers, &json)?;
        debug!(event = %inbound.to_structured(), "inbound CloudEvent");

        // 5) context
        let ctx = RequestContext::new(headers.clone(), payload.task_type.clone());

        // 6) model
        let started = Instant::now();
        let response = self
            .model
            .process(payload, ctx, self.opts.model_timeout)
            .await;
        self.stats
            .model_duration
            .observe(&[("model", self.model.name())], started.elapsed());
        let response = response?;

        // 7) metrics: never fails the request
        if let Some(batch) = &response.metrics {
            match self.metrics.submit(batch, &self.opts.event_type).await {
                Ok(n) => {
                    self.stats.metric_batches.inc(&[("result", "accepted")]);
                    debug!(records = n, "model metrics aggregated");
                }
                Err(e) => {
                    self.stats.metric_batches.inc(&[("result", "rejected")]);
                    error!(error = %e, metrics = %batch, "metrics returned are invalid");
                }
            }
        }

        // 8) relay
        if let (Some(data), Some(relay)) = (&response.data, &self.relay) {
            let reply = relay.build(data.clone(), &inbound);
            match relay.send(&reply).await {
                Ok(()) => self.stats.deliveries.inc(&[("result", "ok")]),
                Err(e) => {
                    self.stats.deliveries.inc(&[("result", "error")]);
                    match self.opts.on_relay_failure {
                        RelayFailureMode::FailClosed => return Err(e),
                        RelayFailureMode::Decoupled => {
                            warn!(error = %e, event_id = %reply.id, "reply relay failed, responding anyway");
                        }
                    }
                }
            }
        }

        // 9) respond
        Ok(response.data)
    }
}
