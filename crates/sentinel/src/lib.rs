//! Top-level facade crate for Sentinel.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use sentinel_core::*;
}

pub mod gateway {
    pub use sentinel_gateway::*;
}
