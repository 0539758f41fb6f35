use std::str::FromStr;

use serde::Deserialize;
use monrelay_core::error::{RelayError, Result};
use monrelay_core::protocol::WireProtocol;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub events: EventsSection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub model: ModelSection,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            protocol: default_protocol(),
            events: EventsSection::default(),
            metrics: MetricsSection::default(),
            model: ModelSection::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(RelayError::Config(format!(
                "unsupported config version: {}",
                self.version
            )));
        }
        // unknown ids are fatal at startup, not per request
        WireProtocol::from_str(&self.protocol)?;

        self.server.validate()?;
        self.events.validate()?;
        self.model.validate()?;

        Ok(())
    }

    /// Overlay environment-style settings. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MONRELAY_LOGLEVEL") {
            self.server.log_level = v.to_lowercase();
        }
        if let Some(v) = lookup("MONRELAY_HTTP_PORT") {
            self.server.http_port = parse_env("MONRELAY_HTTP_PORT", &v)?;
        }
        if let Some(v) = lookup("MONRELAY_PROTOCOL") {
            self.protocol = v;
        }
        if let Some(v) = lookup("MONRELAY_REPLY_URL") {
            self.events.reply_url = v;
        }
        if let Some(v) = lookup("MONRELAY_EVENT_TYPE") {
            self.events.event_type = v;
        }
        if let Some(v) = lookup("MONRELAY_EVENT_SOURCE") {
            self.events.event_source = v;
        }
        if let Some(v) = lookup("MONRELAY_RELAY_FAILURE_MODE") {
            self.events.on_relay_failure = v.parse()?;
        }
        if let Some(v) = lookup("DEPLOYMENT_NAMESPACE") {
            self.metrics.deployment_namespace = v;
        }
        if let Some(v) = lookup("MONRELAY_MODEL_TIMEOUT_MS") {
            self.model.timeout_ms = parse_env("MONRELAY_MODEL_TIMEOUT_MS", &v)?;
        }
        Ok(())
    }
}

fn parse_env<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| RelayError::Config(format!("{name} has an invalid value: {raw:?}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_host: default_listen_host(),
            http_port: default_http_port(),
            log_level: default_log_level(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.http_port == 0 {
            return Err(RelayError::Config("server.http_port must not be 0".into()));
        }
        if self.listen_host.trim().is_empty() {
            return Err(RelayError::Config("server.listen_host must not be empty".into()));
        }
        Ok(())
    }

    pub fn listen(&self) -> String {
        format!("{}:{}", self.listen_host, self.http_port)
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".into()
}
fn default_http_port() -> u16 {
    8080
}
fn default_log_level() -> String {
    "info".into()
}
fn default_protocol() -> String {
    WireProtocol::CommonHttp.as_str().into()
}

/// What a relay failure does to the caller's response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelayFailureMode {
    /// Relay failure fails the request; the model output is not returned.
    #[default]
    FailClosed,
    /// Relay failure is logged and counted; the caller still gets the output.
    Decoupled,
}

impl FromStr for RelayFailureMode {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_closed" => Ok(RelayFailureMode::FailClosed),
            "decoupled" => Ok(RelayFailureMode::Decoupled),
            other => Err(RelayError::Config(format!(
                "relay failure mode must be fail_closed or decoupled, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsSection {
    #[serde(default = "default_event_type")]
    pub event_type: String,

    #[serde(default = "default_event_source")]
    pub event_source: String,

    /// Empty disables the relay.
    #[serde(default)]
    pub reply_url: String,

    #[serde(default = "default_relay_timeout_ms")]
    pub relay_timeout_ms: u64,

    #[serde(default)]
    pub on_relay_failure: RelayFailureMode,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            event_type: default_event_type(),
            event_source: default_event_source(),
            reply_url: String::new(),
            relay_timeout_ms: default_relay_timeout_ms(),
            on_relay_failure: RelayFailureMode::default(),
        }
    }
}

impl EventsSection {
    pub fn validate(&self) -> Result<()> {
        if self.event_type.trim().is_empty() {
            return Err(RelayError::Config("events.event_type must not be empty".into()));
        }
        if self.event_source.trim().is_empty() {
            return Err(RelayError::Config("events.event_source must not be empty".into()));
        }
        if !self.reply_url.is_empty()
            && !self.reply_url.starts_with("http://")
            && !self.reply_url.starts_with("https://")
        {
            return Err(RelayError::Config(
                "events.reply_url must be empty or start with http:// or https://".into(),
            ));
        }
        if !(100..=600_000).contains(&self.relay_timeout_ms) {
            return Err(RelayError::Config(
                "events.relay_timeout_ms must be between 100 and 600000".into(),
            ));
        }
        Ok(())
    }

    pub fn relay_enabled(&self) -> bool {
        !self.reply_url.is_empty()
    }
}

fn default_event_type() -> String {
    "io.monrelay.model.response".into()
}
fn default_event_source() -> String {
    "io.monrelay.server".into()
}
fn default_relay_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Injected as `deployment_namespace` into every model metric.
    #[serde(default = "default_deployment_namespace")]
    pub deployment_namespace: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            deployment_namespace: default_deployment_namespace(),
        }
    }
}

fn default_deployment_namespace() -> String {
    "NOT_IMPLEMENTED".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSection {
    /// 0 disables the bound.
    #[serde(default = "default_model_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_model_timeout_ms(),
        }
    }
}

impl ModelSection {
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms > 600_000 {
            return Err(RelayError::Config(
                "model.timeout_ms must be between 0 and 600000".into(),
            ));
        }
        Ok(())
    }
}

fn default_model_timeout_ms() -> u64 {
    30_000
}
