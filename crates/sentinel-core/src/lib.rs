//! Sentinel core: transport-agnostic governance primitives and error types.
//!
//! This crate defines the decision and audit contracts shared by the gateway,
//! storage adapters, and any embedding host. It intentionally carries no
//! transport or runtime dependencies so it can be reused in multiple contexts.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths must surface as `SentinelError`/`Result` so the sidecar
//! never crashes on malformed policies or hostile input.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod audit;
pub mod decision;
pub mod error;
pub mod glob;

/// Shared result type.
pub use error::{Result, SentinelError};

pub use audit::{AuditFilter, AuditKind, AuditRecord, InferenceReport, InferenceStatus};
pub use decision::{Decision, DefaultEffect, Effect};
pub use glob::Glob;
