use std::sync::{Mutex, PoisonError};

use sentinel_core::error::Result;
use sentinel_core::{AuditFilter, AuditRecord};

/// Persistent destination for audit records.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditRecord) -> Result<()>;

    /// Read-side query. Not used by the decision path.
    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>>;

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String;
}

/// Unbounded in-memory sink.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Everything recorded so far, oldest first.
    pub fn entries(&self) -> Vec<AuditRecord> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: &AuditRecord) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(filter.select(entries.iter()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
