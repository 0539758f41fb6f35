//! Wire protocols.
//!
//! A wire protocol decides how the data of an inbound event is turned into an
//! [`ExtractedPayload`]. Protocol selection is a plain mapping from
//! [`WireProtocol`] to an [`Extractor`]; the event pipeline only ever talks to
//! the `Extractor` it resolved at startup, so a new wire format is one new
//! extractor plus one `register` call.
//!
//! Extractors are panic-free: malformed bodies are reported as `RelayError`.

pub mod common_http;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{RelayError, Result};

pub use common_http::CommonHttpExtractor;

/// Identifier of a supported wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireProtocol {
    /// Plain JSON carrying `predicted`, `actual`, and `task_type`.
    CommonHttp,
}

impl WireProtocol {
    /// Every protocol this build knows about.
    pub const ALL: [WireProtocol; 1] = [WireProtocol::CommonHttp];

    /// Identifier used in config and on `/protocol`.
    pub fn as_str(self) -> &'static str {
        match self {
            WireProtocol::CommonHttp => "common_http",
        }
    }
}

impl fmt::Display for WireProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WireProtocol {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        WireProtocol::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| RelayError::UnsupportedProtocol(s.to_string()))
    }
}

/// Typed payload pulled out of an event body.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPayload {
    /// Model predictions.
    pub predicted: Vec<f64>,
    /// Ground truth, same length as `predicted`.
    pub actual: Vec<f64>,
    /// Caller supplied task classification (e.g. "classification").
    pub task_type: String,
}

/// Protocol-specific validation and extraction.
pub trait Extractor: Send + Sync {
    fn protocol(&self) -> WireProtocol;

    /// Structural check only: required fields present with the right JSON
    /// shapes. Values are not interpreted. Failures are `BadRequest`.
    fn validate(&self, body: &Value) -> Result<()>;

    /// Pull the typed payload. Failures are `Extraction` and name the field.
    fn extract(&self, body: &Value) -> Result<ExtractedPayload>;
}

/// Registry of extractors keyed by protocol.
#[derive(Default)]
pub struct ProtocolRegistry {
    extractors: HashMap<WireProtocol, Arc<dyn Extractor>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registry with every built-in extractor registered.
    pub fn with_builtin() -> Self {
        let mut reg = Self::new();
        reg.register(Arc::new(CommonHttpExtractor::new()));
        reg
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(extractor.protocol(), extractor);
    }

    pub fn registered(&self) -> Vec<WireProtocol> {
        self.extractors.keys().copied().collect()
    }

    /// Resolve a protocol identifier to its extractor.
    pub fn resolve(&self, protocol_id: &str) -> Result<Arc<dyn Extractor>> {
        let protocol: WireProtocol = protocol_id.parse()?;
        self.extractors
            .get(&protocol)
            .cloned()
            .ok_or_else(|| RelayError::UnsupportedProtocol(protocol_id.to_string()))
    }
}
