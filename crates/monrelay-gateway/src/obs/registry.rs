//! Model-reported metrics: registry plus its owning aggregator task.
//!
//! `MetricsRegistry` is plain data with no interior locking. Exactly one
//! aggregator task owns it; everything else talks to that task through a
//! cloneable [`MetricsHandle`]. A batch travels as one message and is applied
//! in one step, so a scrape can never observe half of a batch.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use monrelay_core::error::{RelayError, Result};
use monrelay_core::metrics::{parse_batch, MetricKind, MetricRecord};

use super::metrics::escape_label;

/// Prometheus text exposition content type.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Label added to every model metric with the configured event type.
pub const EVENT_TYPE_LABEL: &str = "event_type";

// Timer buckets in seconds (timers arrive in milliseconds).
const TIMER_BUCKETS_SECS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

type LabelKey = Vec<(String, String)>;

#[derive(Debug, Clone, Default)]
struct TimerState {
    count: u64,
    sum: f64,
    buckets: [u64; 11],
}

#[derive(Debug, Clone)]
enum Series {
    Scalar(f64),
    Timer(TimerState),
}

#[derive(Debug)]
struct Family {
    kind: MetricKind,
    series: BTreeMap<LabelKey, Series>,
}

/// Last known value per `(name, labels ∪ default labels)`.
#[derive(Debug)]
pub struct MetricsRegistry {
    default_labels: BTreeMap<String, String>,
    families: BTreeMap<String, Family>,
}

impl MetricsRegistry {
    pub fn new(default_labels: BTreeMap<String, String>) -> Self {
        Self {
            default_labels,
            families: BTreeMap::new(),
        }
    }

    pub fn default_labels(&self) -> &BTreeMap<String, String> {
        &self.default_labels
    }

    /// Merge a validated batch. Gauges overwrite, counters accumulate, timers
    /// observe. The whole batch is checked first and applied only if every
    /// record fits: no kind conflicts, no clash with the series a histogram
    /// exposes, no running total leaving the finite range.
    pub fn update(&mut self, batch: &[MetricRecord], event_type: &str) -> Result<()> {
        self.check(batch, event_type)?;

        for rec in batch {
            let key = self.key_for(&rec.labels, event_type);
            let family = self
                .families
                .entry(rec.name.clone())
                .or_insert_with(|| Family {
                    kind: rec.kind,
                    series: BTreeMap::new(),
                });

            match rec.kind {
                MetricKind::Gauge => {
                    family.series.insert(key, Series::Scalar(rec.value));
                }
                MetricKind::Counter => {
                    let slot = family.series.entry(key).or_insert(Series::Scalar(0.0));
                    if let Series::Scalar(v) = slot {
                        *v += rec.value;
                    }
                }
                MetricKind::Timer => {
                    let slot = family
                        .series
                        .entry(key)
                        .or_insert_with(|| Series::Timer(TimerState::default()));
                    if let Series::Timer(t) = slot {
                        let secs = rec.value / 1000.0;
                        t.count += 1;
                        t.sum += secs;
                        for (i, &b) in TIMER_BUCKETS_SECS.iter().enumerate() {
                            if secs <= b {
                                t.buckets[i] += 1;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check(&self, batch: &[MetricRecord], event_type: &str) -> Result<()> {
        let mut kinds: BTreeMap<&str, MetricKind> =
            self.families.iter().map(|(n, f)| (n.as_str(), f.kind)).collect();
        let mut owners: BTreeMap<String, &str> = BTreeMap::new();
        for (name, family) in &self.families {
            for series in series_names(name, family.kind) {
                owners.insert(series, name.as_str());
            }
        }
        let mut totals: BTreeMap<(&str, LabelKey), f64> = BTreeMap::new();

        for rec in batch {
            match kinds.get(rec.name.as_str()) {
                Some(&kind) if kind != rec.kind => {
                    return Err(RelayError::InvalidMetrics(format!(
                        "metric {} is already a {kind}, got {}",
                        rec.name, rec.kind
                    )));
                }
                Some(_) => {}
                None => {
                    kinds.insert(rec.name.as_str(), rec.kind);
                }
            }

            for series in series_names(&rec.name, rec.kind) {
                match owners.get(&series) {
                    Some(&owner) if owner != rec.name => {
                        return Err(RelayError::InvalidMetrics(format!(
                            "metric {} clashes with series {series} of {owner}",
                            rec.name
                        )));
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(series, rec.name.as_str());
                    }
                }
            }

            let added = match rec.kind {
                MetricKind::Gauge => continue,
                MetricKind::Counter => rec.value,
                MetricKind::Timer => rec.value / 1000.0,
            };
            let key = self.key_for(&rec.labels, event_type);
            let total = totals
                .entry((rec.name.as_str(), key))
                .or_insert_with_key(|(name, key)| self.total(name, key));
            *total += added;
            if !total.is_finite() {
                return Err(RelayError::InvalidMetrics(format!(
                    "metric {} would overflow",
                    rec.name
                )));
            }
        }
        Ok(())
    }

    // Counter value or timer sum currently stored for a series.
    fn total(&self, name: &str, key: &LabelKey) -> f64 {
        match self.families.get(name).and_then(|f| f.series.get(key)) {
            Some(Series::Scalar(v)) => *v,
            Some(Series::Timer(t)) => t.sum,
            None => 0.0,
        }
    }

    /// Gauge/counter value for the labels a model reported under `event_type`.
    pub fn value(&self, name: &str, labels: &BTreeMap<String, String>, event_type: &str) -> Option<f64> {
        let key = self.key_for(labels, event_type);
        match self.families.get(name)?.series.get(&key)? {
            Series::Scalar(v) => Some(*v),
            Series::Timer(t) => Some(t.count as f64),
        }
    }

    /// Number of distinct series.
    pub fn len(&self) -> usize {
        self.families.values().map(|f| f.series.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, family) in &self.families {
            let _ = writeln!(out, "# TYPE {} {}", name, family.kind.exposition_type());
            for (key, series) in &family.series {
                let labels = key
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                match series {
                    Series::Scalar(v) => {
                        let _ = writeln!(out, "{}{{{}}} {}", name, labels, sample(*v));
                    }
                    Series::Timer(t) => {
                        let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };
                        for (i, le) in TIMER_BUCKETS_SECS.iter().enumerate() {
                            let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, t.buckets[i]);
                        }
                        let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, t.count);
                        let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sample(t.sum));
                        let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, t.count);
                    }
                }
            }
        }
        out
    }

    // Default labels win over model-supplied ones with the same name.
    fn key_for(&self, labels: &BTreeMap<String, String>, event_type: &str) -> LabelKey {
        let mut merged = labels.clone();
        if !event_type.is_empty() {
            merged.insert(EVENT_TYPE_LABEL.to_string(), event_type.to_string());
        }
        for (k, v) in &self.default_labels {
            merged.insert(k.clone(), v.clone());
        }
        merged.into_iter().collect()
    }
}

/// Names a family occupies in the exposition.
fn series_names(name: &str, kind: MetricKind) -> Vec<String> {
    match kind {
        MetricKind::Timer => ["", "_bucket", "_sum", "_count"]
            .iter()
            .map(|suffix| format!("{name}{suffix}"))
            .collect(),
        _ => vec![name.to_string()],
    }
}

/// Sample value in text-format spelling (`+Inf`, `-Inf`, `NaN`).
fn sample(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

enum Command {
    Update {
        records: Vec<MetricRecord>,
        event_type: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Render {
        reply: oneshot::Sender<String>,
    },
}

/// Cloneable handle to the aggregator task owning the registry.
#[derive(Clone)]
pub struct MetricsHandle {
    tx: mpsc::Sender<Command>,
}

impl MetricsHandle {
    /// Move `registry` into a new aggregator task. Must be called inside a
    /// tokio runtime.
    pub fn spawn(registry: MetricsRegistry) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(run_aggregator(registry, rx));
        Self { tx }
    }

    /// Validate a raw model batch and merge it. Returns the number of records
    /// applied; an invalid batch changes nothing.
    pub async fn submit(&self, batch: &Value, event_type: &str) -> Result<usize> {
        let records = parse_batch(batch)?;
        let n = records.len();
        self.update(records, event_type).await?;
        Ok(n)
    }

    pub async fn update(&self, records: Vec<MetricRecord>, event_type: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Update {
                records,
                event_type: event_type.to_string(),
                reply,
            })
            .await
            .map_err(|_| RelayError::Internal("metrics aggregator stopped".into()))?;
        rx.await
            .map_err(|_| RelayError::Internal("metrics aggregator dropped reply".into()))?
    }

    /// Exposition body and its content type.
    pub async fn exposition(&self) -> Result<(String, &'static str)> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Render { reply })
            .await
            .map_err(|_| RelayError::Internal("metrics aggregator stopped".into()))?;
        let body = rx
            .await
            .map_err(|_| RelayError::Internal("metrics aggregator dropped reply".into()))?;
        Ok((body, EXPOSITION_CONTENT_TYPE))
    }
}

async fn run_aggregator(mut registry: MetricsRegistry, mut rx: mpsc::Receiver<Command>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Update {
                records,
                event_type,
                reply,
            } => {
                let res = registry.update(&records, &event_type);
                if res.is_ok() {
                    tracing::debug!(records = records.len(), series = registry.len(), "metrics batch applied");
                }
                let _ = reply.send(res);
            }
            Command::Render { reply } => {
                let _ = reply.send(registry.render());
            }
        }
    }
    tracing::debug!("metrics aggregator stopped");
}
