//! monrelay core: transport-agnostic event contracts, error types, and
//! extractors.
//!
//! This crate defines the wire-level contracts shared by the gateway and by
//! model implementations: the CloudEvents envelope, the pluggable wire
//! protocols that turn an event body into an [`protocol::ExtractedPayload`],
//! the model request/response types, and the metric records a model may
//! report. It carries no HTTP server or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed events
//! and malformed model output surface as `RelayError`/`Result` so the relay
//! process never crashes on bad traffic.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod envelope;
pub mod error;
pub mod metrics;
pub mod model;
pub mod protocol;

/// Shared result type.
pub use error::{Result, RelayError};
