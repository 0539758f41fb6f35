//! Per-request event pipeline.
//!
//! Re-exports the orchestrator so the transport layer can depend on this
//! module directly.

pub mod orchestrator;

pub use orchestrator::{EventPipeline, PipelineOptions};
