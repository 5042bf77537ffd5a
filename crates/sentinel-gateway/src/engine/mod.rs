//! Decision engine: rate limit → spend → policy → commit, per identity.
//!
//! Re-exports the engine and its request/settings types so the transport and
//! host process can depend on this module directly.

pub mod identity_lock;
pub mod pipeline;

pub use identity_lock::IdentityLocks;
pub use pipeline::{BudgetStats, CheckRequest, DecisionEngine, EngineLimits, IdentityStats};
