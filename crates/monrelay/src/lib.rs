//! Top-level facade crate for monrelay.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use monrelay_core::*;
}

pub mod gateway {
    pub use monrelay_gateway::*;
}
