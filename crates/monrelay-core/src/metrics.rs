//! Model-reported metric records and batch validation.
//!
//! Batch wire shape (a JSON array):
//!
//! ```json
//! [{ "key": "accuracy", "type": "GAUGE", "value": 0.66, "tags": { "model": "a" } }]
//! ```
//!
//! `name`/`labels` are accepted for `key`/`tags`. A batch is parsed
//! all-or-nothing: one bad record rejects the whole batch.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::error::{RelayError, Result};

/// Prefix of the relay's own metric families; models may not use it.
pub const RESERVED_METRIC_PREFIX: &str = "monrelay_";

/// Histogram bucket bound label, set by the exposition of timers.
pub const BUCKET_LABEL: &str = "le";

/// Merge policy of a metric, taken from its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    /// Last value wins.
    Gauge,
    /// Values accumulate; must be non-negative.
    Counter,
    /// Durations in milliseconds, observed into a histogram.
    Timer,
}

impl MetricKind {
    fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "GAUGE" => Some(MetricKind::Gauge),
            "COUNTER" => Some(MetricKind::Counter),
            "TIMER" => Some(MetricKind::Timer),
            _ => None,
        }
    }

    /// Prometheus `# TYPE` keyword.
    pub fn exposition_type(self) -> &'static str {
        match self {
            MetricKind::Gauge => "gauge",
            MetricKind::Counter => "counter",
            MetricKind::Timer => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MetricKind::Gauge => "GAUGE",
            MetricKind::Counter => "COUNTER",
            MetricKind::Timer => "TIMER",
        };
        f.write_str(s)
    }
}

/// One validated metric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub labels: BTreeMap<String, String>,
}

/// `true` when every record in the batch is well formed.
pub fn validate_metrics(batch: &Value) -> bool {
    parse_batch(batch).is_ok()
}

/// Parse a model's `metrics` value into typed records, all-or-nothing.
pub fn parse_batch(batch: &Value) -> Result<Vec<MetricRecord>> {
    let items = batch
        .as_array()
        .ok_or_else(|| RelayError::InvalidMetrics("metrics must be an array".into()))?;

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            parse_record(item).map_err(|reason| {
                RelayError::InvalidMetrics(format!("record {i}: {reason}"))
            })
        })
        .collect()
}

fn parse_record(item: &Value) -> std::result::Result<MetricRecord, String> {
    let obj = item.as_object().ok_or("not an object")?;

    let name = obj
        .get("key")
        .or_else(|| obj.get("name"))
        .and_then(Value::as_str)
        .ok_or("missing `key`")?;
    if !is_metric_name(name) {
        return Err(format!("invalid metric name {name:?}"));
    }
    if name.starts_with(RESERVED_METRIC_PREFIX) {
        return Err(format!(
            "metric name {name:?} uses the reserved prefix {RESERVED_METRIC_PREFIX:?}"
        ));
    }

    let tag = obj.get("type").and_then(Value::as_str).ok_or("missing `type`")?;
    let kind = MetricKind::parse(tag).ok_or_else(|| format!("unknown metric type {tag:?}"))?;

    let value = obj
        .get("value")
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .ok_or("`value` must be a finite number")?;
    if kind != MetricKind::Gauge && value < 0.0 {
        return Err(format!("{kind} value must not be negative"));
    }

    let mut labels = BTreeMap::new();
    if let Some(raw) = obj.get("tags").or_else(|| obj.get("labels")) {
        let raw = raw.as_object().ok_or("`tags` must be an object")?;
        for (k, v) in raw {
            if !is_label_name(k) {
                return Err(format!("invalid label name {k:?}"));
            }
            if kind == MetricKind::Timer && k == BUCKET_LABEL {
                return Err(format!("label {k:?} is reserved on {kind} metrics"));
            }
            let v = v
                .as_str()
                .ok_or_else(|| format!("label {k:?} must be a string"))?;
            labels.insert(k.clone(), v.to_string());
        }
    }

    Ok(MetricRecord {
        name: name.to_string(),
        kind,
        value,
        labels,
    })
}

/// `[a-zA-Z_:][a-zA-Z0-9_:]*`
pub fn is_metric_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// `[a-zA-Z_][a-zA-Z0-9_]*`, `__` prefix reserved.
pub fn is_label_name(s: &str) -> bool {
    if s.starts_with("__") {
        return false;
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
