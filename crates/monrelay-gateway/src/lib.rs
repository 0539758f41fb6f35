//! monrelay gateway library entry.
//!
//! This crate wires the HTTP transport, event pipeline, metrics aggregation,
//! and reply relay into the relay server. It is consumed by the binary
//! (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod model;
pub mod obs;
pub mod ops;
pub mod pipeline;
pub mod relay;
pub mod router;
pub mod transport;
