//! Shared application state for the relay server.
//!
//! Built once at startup. Every startup failure (unknown protocol, empty model
//! name, bad relay client) is returned as an error instead of panicking.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use monrelay_core::error::Result;
use monrelay_core::protocol::{ProtocolRegistry, WireProtocol};

use crate::config::RelayConfig;
use crate::model::{MonitorModel, RegisteredModel};
use crate::obs::{MetricsHandle, MetricsRegistry, RelayMetrics};
use crate::pipeline::{EventPipeline, PipelineOptions};
use crate::relay::{EventRelay, RelayTarget};

/// Default label injected into every model metric.
pub const NAMESPACE_LABEL: &str = "deployment_namespace";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: RelayConfig,
    protocol: WireProtocol,
    pipeline: EventPipeline,
    metrics: MetricsHandle,
    stats: Arc<RelayMetrics>,
}

impl AppState {
    /// Build state with the built-in protocol extractors.
    /// Must be called inside a tokio runtime (spawns the metrics aggregator).
    pub fn new(cfg: RelayConfig, model: Arc<dyn MonitorModel>) -> Result<Self> {
        Self::with_protocols(cfg, model, ProtocolRegistry::with_builtin())
    }

    pub fn with_protocols(
        cfg: RelayConfig,
        model: Arc<dyn MonitorModel>,
        protocols: ProtocolRegistry,
    ) -> Result<Self> {
        // 1) Fail fast on configuration problems
        let protocol: WireProtocol = cfg.protocol.parse()?;
        let extractor = protocols.resolve(&cfg.protocol)?;
        let model = RegisteredModel::register(model)?;

        // 2) Metrics: default labels + single owning aggregator
        let mut default_labels = BTreeMap::new();
        default_labels.insert(
            NAMESPACE_LABEL.to_string(),
            cfg.metrics.deployment_namespace.clone(),
        );
        let metrics = MetricsHandle::spawn(MetricsRegistry::new(default_labels));
        let stats = Arc::new(RelayMetrics::default());

        // 3) Optional reply relay
        let relay = if cfg.events.relay_enabled() {
            Some(EventRelay::new(
                RelayTarget {
                    url: cfg.events.reply_url.clone(),
                    event_type: cfg.events.event_type.clone(),
                    event_source: cfg.events.event_source.clone(),
                },
                Duration::from_millis(cfg.events.relay_timeout_ms),
            )?)
        } else {
            tracing::info!("reply relay disabled (empty reply url)");
            None
        };

        let opts = PipelineOptions {
            event_type: cfg.events.event_type.clone(),
            model_timeout: (cfg.model.timeout_ms > 0)
                .then(|| Duration::from_millis(cfg.model.timeout_ms)),
            on_relay_failure: cfg.events.on_relay_failure,
        };

        let pipeline = EventPipeline::new(
            extractor,
            model,
            metrics.clone(),
            relay,
            Arc::clone(&stats),
            opts,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                protocol,
                pipeline,
                metrics,
                stats,
            }),
        })
    }

    pub fn cfg(&self) -> &RelayConfig {
        &self.inner.cfg
    }

    pub fn protocol(&self) -> WireProtocol {
        self.inner.protocol
    }

    pub fn pipeline(&self) -> &EventPipeline {
        &self.inner.pipeline
    }

    pub fn metrics(&self) -> &MetricsHandle {
        &self.inner.metrics
    }

    pub fn stats(&self) -> Arc<RelayMetrics> {
        Arc::clone(&self.inner.stats)
    }

    pub fn model_name(&self) -> &str {
        self.inner.pipeline.model().name()
    }
}
