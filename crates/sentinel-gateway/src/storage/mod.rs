//! Durable state outside the decision path: spend snapshots and the
//! periodic save task.

pub mod persist;
pub mod snapshot;

pub use persist::Persistence;
pub use snapshot::{restore_usage, JsonFileSnapshotStore, SpendSnapshotStore};
