#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use sentinel_core::AuditFilter;
use sentinel_gateway::app_state;
use sentinel_gateway::audit::{AuditSink, SqliteAuditStore};
use sentinel_gateway::config::SentinelConfig;
use sentinel_gateway::engine::CheckRequest;
use sentinel_gateway::storage::{JsonFileSnapshotStore, SpendSnapshotStore};

fn config_in(dir: &std::path::Path) -> SentinelConfig {
    let mut cfg = SentinelConfig::default();
    cfg.persistence.snapshot_path = dir.join("budget.json").display().to_string();
    cfg.persistence.audit_db_path = Some(dir.join("audit.db").display().to_string());
    cfg
}

#[tokio::test]
async fn close_after_bootstrap_flushes_spend_and_audit() {
    let dir = tempfile::tempdir().unwrap();
    let (state, persistence) = app_state::bootstrap(config_in(dir.path())).await.unwrap();
    assert!(state.engine().audit().has_sink());

    state
        .engine()
        .evaluate(&CheckRequest::new("alice", "llm_call").with_cost(1.5))
        .unwrap();
    persistence.close().await;

    let saved = JsonFileSnapshotStore::new(dir.path().join("budget.json")).load().unwrap();
    assert_eq!(saved["alice"], 1.5);

    let store = SqliteAuditStore::open(dir.path().join("audit.db")).unwrap();
    let rows = store.query(&AuditFilter::for_identity("alice")).unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn bootstrap_restores_previous_usage_and_survives_corruption() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("budget.json");
    std::fs::write(&path, r#"{"alice": 4.0}"#).unwrap();

    let (state, persistence) = app_state::bootstrap(config_in(dir.path())).await.unwrap();
    assert_eq!(state.engine().spend().usage("alice"), 4.0);
    persistence.close().await;

    std::fs::write(&path, "{ not json").unwrap();
    let (state, persistence) = app_state::bootstrap(config_in(dir.path())).await.unwrap();
    assert!(state.engine().usage_snapshot().is_empty());
    persistence.close().await;
}
