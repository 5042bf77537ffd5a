use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::{AuditFilter, AuditRecord};

use super::sink::AuditSink;

struct AuditWriter {
    tx: SyncSender<AuditRecord>,
    handle: JoinHandle<()>,
}

/// Append-only audit recorder.
///
/// Keeps the newest `retain` records in memory and forwards every record to
/// the optional sink on a background writer thread.
pub struct AuditRecorder {
    tail: Mutex<VecDeque<AuditRecord>>,
    retain: usize,
    sink: Option<Arc<dyn AuditSink>>,
    writer: Mutex<Option<AuditWriter>>,
    dropped: AtomicU64,
}

impl AuditRecorder {
    /// Recorder with no persistent sink.
    pub fn in_memory(retain: usize) -> Self {
        Self {
            tail: Mutex::new(VecDeque::with_capacity(retain.min(4096))),
            retain: retain.max(1),
            sink: None,
            writer: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    /// Recorder that forwards to `sink` through a queue of `queue_capacity`.
    pub fn with_sink(retain: usize, queue_capacity: usize, sink: Arc<dyn AuditSink>) -> Result<Self> {
        let (tx, rx) = mpsc::sync_channel(queue_capacity.max(1));
        let writer_sink = Arc::clone(&sink);
        let handle = thread::Builder::new()
            .name("sentinel-audit-writer".into())
            .spawn(move || writer_loop(rx, writer_sink))
            .map_err(|e| SentinelError::Internal(format!("spawn audit writer failed: {e}")))?;

        let mut recorder = Self::in_memory(retain);
        recorder.sink = Some(sink);
        recorder.writer = Mutex::new(Some(AuditWriter { tx, handle }));
        Ok(recorder)
    }

    /// Append one record. Never fails and never waits on the sink.
    pub fn record(&self, entry: AuditRecord) {
        tracing::debug!(
            target: "sentinel::audit",
            kind = %entry.kind,
            identity = %entry.identity,
            action = entry.action.as_deref().unwrap_or(""),
            reason = entry.reason.as_deref().unwrap_or(""),
            "audit"
        );

        {
            let writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(w) = writer.as_ref() {
                match w.tx.try_send(entry.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(identity = %entry.identity, "audit queue full, record not persisted");
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }

        let mut tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
        if tail.len() >= self.retain {
            tail.pop_front();
        }
        tail.push_back(entry);
    }

    /// Newest `limit` records from the in-memory tail, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.iter().rev().take(limit).cloned().collect()
    }

    /// Query the sink when there is one, else the in-memory tail.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditRecord> {
        if let Some(sink) = &self.sink {
            match sink.query(filter) {
                Ok(rows) => return rows,
                Err(e) => {
                    tracing::warn!(sink = %sink.describe(), error = %e, "audit query failed, serving in-memory tail");
                }
            }
        }
        let tail = self.tail.lock().unwrap_or_else(PoisonError::into_inner);
        filter.select(tail.iter())
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Records that could not be handed to the sink.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting sink writes, drain the queue, and flush the sink.
    /// Later records still reach the in-memory tail.
    pub fn shutdown(&self) {
        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(AuditWriter { tx, handle }) = writer else {
            return;
        };
        drop(tx);
        if handle.join().is_err() {
            tracing::error!("audit writer thread panicked");
        }
    }
}

fn writer_loop(rx: Receiver<AuditRecord>, sink: Arc<dyn AuditSink>) {
    for entry in rx {
        if let Err(e) = sink.record(&entry) {
            tracing::warn!(sink = %sink.describe(), identity = %entry.identity, error = %e, "audit sink write failed");
        }
    }
    if let Err(e) = sink.flush() {
        tracing::warn!(sink = %sink.describe(), error = %e, "audit sink flush failed");
    }
}
