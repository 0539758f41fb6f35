//! Relay config loader: strict YAML plus an environment overlay.

pub mod schema;

use std::fs;

use monrelay_core::error::{RelayError, Result};

pub use schema::{
    EventsSection, MetricsSection, ModelSection, RelayConfig, RelayFailureMode, ServerSection,
};

/// Names an optional YAML file read before the environment overlay.
pub const CONFIG_PATH_ENV: &str = "MONRELAY_CONFIG";

pub fn load_from_file(path: &str) -> Result<RelayConfig> {
    let cfg = read_file(path)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<RelayConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Process configuration: `$MONRELAY_CONFIG` (if set) overlaid with the
/// environment, then validated.
pub fn load_from_env() -> Result<RelayConfig> {
    let mut cfg = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) => read_file(&path)?,
        Err(_) => RelayConfig::default(),
    };
    cfg.apply_env(|k| std::env::var(k).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

// Parse only; validation waits for the environment overlay.
fn read_file(path: &str) -> Result<RelayConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| RelayError::Config(format!("read config failed ({path}): {e}")))?;
    parse_str(&s)
}

fn parse_str(s: &str) -> Result<RelayConfig> {
    serde_yaml::from_str(s).map_err(|e| RelayError::Config(format!("invalid yaml: {e}")))
}
