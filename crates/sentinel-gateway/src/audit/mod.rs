//! Audit trail: in-memory tail plus an optional persistent sink.
//!
//! The recorder never blocks the decision path on the sink. Records are
//! handed to a dedicated writer thread through a bounded queue; a full queue
//! drops the record (counted) instead of waiting.

pub mod recorder;
pub mod sink;
pub mod sqlite;

pub use recorder::AuditRecorder;
pub use sink::{AuditSink, MemoryAuditSink};
pub use sqlite::SqliteAuditStore;
