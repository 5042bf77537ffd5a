use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use sentinel_core::error::{Result, SentinelError};

use crate::engine::DecisionEngine;

use super::snapshot::SpendSnapshotStore;

/// Periodic spend snapshots plus the shutdown sequence.
///
/// Must be started inside a tokio runtime. Dropping the handle without
/// `close` leaves the last interval's spend unsaved.
pub struct Persistence {
    engine: Arc<DecisionEngine>,
    store: Arc<dyn SpendSnapshotStore>,
    shutdown: watch::Sender<bool>,
    ticker: JoinHandle<()>,
}

impl Persistence {
    pub fn start(
        engine: Arc<DecisionEngine>,
        store: Arc<dyn SpendSnapshotStore>,
        interval: Duration,
    ) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let ticker = {
            let engine = Arc::clone(&engine);
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(interval);
                tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // first tick fires immediately; nothing to save yet
                tick.tick().await;
                loop {
                    tokio::select! {
                        _ = tick.tick() => {
                            let _ = save_blocking(Arc::clone(&engine), Arc::clone(&store)).await;
                        }
                        changed = stop.changed() => {
                            if changed.is_err() || *stop.borrow() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        tracing::info!(every_secs = interval.as_secs(), store = %store.describe(), "spend snapshots scheduled");
        Self {
            engine,
            store,
            shutdown,
            ticker,
        }
    }

    /// Save the current usage now, off the async executor.
    pub async fn flush_now(&self) -> Result<()> {
        save_blocking(Arc::clone(&self.engine), Arc::clone(&self.store)).await
    }

    /// Stop the periodic task, write the final snapshot, and drain the audit
    /// writer. Consumes the handle.
    pub async fn close(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.ticker.await {
            tracing::warn!(error = %e, "snapshot task ended abnormally");
        }

        let _ = save_blocking(Arc::clone(&self.engine), Arc::clone(&self.store)).await;

        let audit = Arc::clone(self.engine.audit());
        if let Err(e) = tokio::task::spawn_blocking(move || audit.shutdown()).await {
            tracing::warn!(error = %e, "audit shutdown task failed");
        }
        tracing::info!("persistence closed");
    }
}

async fn save_blocking(engine: Arc<DecisionEngine>, store: Arc<dyn SpendSnapshotStore>) -> Result<()> {
    let metrics = Arc::clone(engine.metrics());
    let res = tokio::task::spawn_blocking(move || {
        let usage = engine.usage_snapshot();
        store.save(&usage)
    })
    .await
    .map_err(|e| SentinelError::Internal(format!("snapshot task: {e}")))
    .and_then(|r| r);

    match &res {
        Ok(()) => {
            metrics.snapshot_saves.inc(&[("result", "ok")]);
            tracing::debug!("spend snapshot saved");
        }
        Err(e) => {
            metrics.snapshot_saves.inc(&[("result", "error")]);
            tracing::warn!(error = %e, "spend snapshot save failed");
        }
    }
    res
}
