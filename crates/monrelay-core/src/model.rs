//! Types crossing the model boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Headers;

/// Call metadata handed to the model alongside the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// All inbound transport headers, names lower-cased.
    pub headers: Headers,
    pub task_type: String,
}

impl RequestContext {
    pub fn new(headers: Headers, task_type: impl Into<String>) -> Self {
        Self {
            headers,
            task_type: task_type.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// What a model returns for one event.
///
/// `metrics` stays untyped on purpose: it is model output and must pass
/// [`crate::metrics::parse_batch`] before it touches any registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub metrics: Option<Value>,
}

impl ModelResponse {
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            metrics: None,
        }
    }

    pub fn metrics(mut self, metrics: Value) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
