//! Sentinel gateway library entry.
//!
//! Wires limits, policy, audit, and storage into the decision engine, and
//! exposes it over HTTP. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod audit;
pub mod config;
pub mod engine;
pub mod limits;
pub mod obs;
pub mod ops;
pub mod policy;
pub mod router;
pub mod storage;
pub mod transport;
