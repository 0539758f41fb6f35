//! Observability.
//!
//! - `metrics`: lock-free self-metrics of the relay (events, batches, deliveries).
//! - `registry`: model-reported metrics, owned by a single aggregator task.
//!
//! Both render Prometheus text and are served together on `/v1/metrics`.

pub mod metrics;
pub mod registry;

pub use metrics::RelayMetrics;
pub use registry::{MetricsHandle, MetricsRegistry, EXPOSITION_CONTENT_TYPE};
