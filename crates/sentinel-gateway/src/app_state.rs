//! Shared application state for the sidecar.
//!
//! `bootstrap` turns a validated config into a running engine: policy
//! source, audit sink, spend snapshot restore, and the persistence task.

use std::sync::Arc;
use std::time::Duration;

use sentinel_core::error::Result;

use crate::audit::{AuditRecorder, AuditSink, SqliteAuditStore};
use crate::config::SentinelConfig;
use crate::engine::{DecisionEngine, EngineLimits};
use crate::obs::SentinelMetrics;
use crate::policy::{default_policy, load_or_default, FilePolicySource, PolicySource, StaticPolicySource};
use crate::storage::{restore_usage, JsonFileSnapshotStore, Persistence, SpendSnapshotStore};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: SentinelConfig,
    engine: Arc<DecisionEngine>,
    policy_source: Arc<dyn PolicySource>,
}

impl AppState {
    pub fn new(cfg: SentinelConfig, engine: Arc<DecisionEngine>, policy_source: Arc<dyn PolicySource>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                engine,
                policy_source,
            }),
        }
    }

    pub fn cfg(&self) -> &SentinelConfig {
        &self.inner.cfg
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.inner.engine
    }

    pub fn policy_source(&self) -> Arc<dyn PolicySource> {
        Arc::clone(&self.inner.policy_source)
    }

    pub fn metrics(&self) -> &Arc<SentinelMetrics> {
        self.inner.engine.metrics()
    }

    pub fn is_draining(&self) -> bool {
        self.metrics().is_draining()
    }

    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let tracked = u64::try_from(self.engine().tracked_identities()).unwrap_or(u64::MAX);
        vec![
            ("sentinel_tracked_identities", tracked),
            ("sentinel_audit_dropped_total", self.engine().audit().dropped()),
        ]
    }
}

/// Build the engine and its persistence from `cfg`.
///
/// Must run inside a tokio runtime. Storage problems degrade (memory-only
/// audit, empty spend state) instead of failing startup; only an invalid
/// built-in configuration is an error.
pub async fn bootstrap(cfg: SentinelConfig) -> Result<(AppState, Persistence)> {
    let policy_source: Arc<dyn PolicySource> = match &cfg.policy.path {
        Some(path) => Arc::new(FilePolicySource::new(path)),
        None => Arc::new(StaticPolicySource::new(default_policy())),
    };
    let policy = load_or_default(policy_source.as_ref()).await;

    let audit = Arc::new(open_audit(&cfg));
    let engine = Arc::new(DecisionEngine::new(EngineLimits::from(&cfg), policy, audit)?);

    let store: Arc<dyn SpendSnapshotStore> =
        Arc::new(JsonFileSnapshotStore::new(&cfg.persistence.snapshot_path));
    {
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        if let Err(e) = tokio::task::spawn_blocking(move || restore_usage(&engine, store.as_ref())).await {
            tracing::warn!(error = %e, "spend snapshot restore task failed; starting empty");
        }
    }

    let persistence = Persistence::start(
        Arc::clone(&engine),
        store,
        Duration::from_secs(cfg.persistence.snapshot_interval_secs),
    );

    tracing::info!(
        default_budget = cfg.budget.default_limit,
        capacity = cfg.rate_limit.capacity,
        refill_per_sec = cfg.rate_limit.refill_per_sec,
        rules = engine.policy().rule_count(),
        "engine ready"
    );
    Ok((AppState::new(cfg, engine, policy_source), persistence))
}

fn open_audit(cfg: &SentinelConfig) -> AuditRecorder {
    let retain = cfg.audit.retain;
    let Some(path) = &cfg.persistence.audit_db_path else {
        return AuditRecorder::in_memory(retain);
    };
    let opened = SqliteAuditStore::open(path).and_then(|store| {
        let sink: Arc<dyn AuditSink> = Arc::new(store);
        AuditRecorder::with_sink(retain, cfg.audit.queue_capacity, sink)
    });
    match opened {
        Ok(recorder) => {
            tracing::info!(%path, "audit store opened");
            recorder
        }
        Err(e) => {
            tracing::warn!(%path, error = %e, "audit store unavailable; keeping audit in memory only");
            AuditRecorder::in_memory(retain)
        }
    }
}
