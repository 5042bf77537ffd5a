#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::json;

use sentinel_core::{AuditFilter, AuditKind, AuditRecord};
use sentinel_gateway::audit::{AuditRecorder, AuditSink, MemoryAuditSink, SqliteAuditStore};

fn rec(kind: AuditKind, identity: &str, action: &str, ts: i64) -> AuditRecord {
    AuditRecord::new(kind, identity).with_action(action).at(ts)
}

fn seed(sink: &dyn AuditSink) {
    sink.record(&rec(AuditKind::GovernanceAllow, "alice", "read", 1_000)).unwrap();
    sink.record(
        &rec(AuditKind::GovernanceBlock, "alice", "delete_file", 2_000)
            .with_reason("policy_violation")
            .with_details(json!({"matchedRule": "block_system_files"})),
    )
    .unwrap();
    sink.record(&rec(AuditKind::GovernanceAllow, "bob", "read", 3_000)).unwrap();
    sink.record(&rec(AuditKind::GovernanceWarning, "alice", "execute_shell", 4_000)).unwrap();
}

#[test]
fn sqlite_roundtrip_newest_first() {
    let store = SqliteAuditStore::open_in_memory().unwrap();
    seed(&store);
    assert_eq!(store.count().unwrap(), 4);

    let all = store.query(&AuditFilter::default()).unwrap();
    let stamps: Vec<i64> = all.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![4_000, 3_000, 2_000, 1_000]);

    let blocked = &all[2];
    assert_eq!(blocked.kind, AuditKind::GovernanceBlock);
    assert_eq!(blocked.reason.as_deref(), Some("policy_violation"));
    assert_eq!(blocked.details.as_ref().unwrap()["matchedRule"], json!("block_system_files"));
    assert!(all[0].details.is_none());
}

#[test]
fn sqlite_and_memory_filters_agree() {
    let sqlite = SqliteAuditStore::open_in_memory().unwrap();
    let memory = MemoryAuditSink::new();
    seed(&sqlite);
    seed(&memory);

    let filters = [
        AuditFilter::for_identity("alice"),
        AuditFilter {
            kind: Some(AuditKind::GovernanceAllow),
            ..AuditFilter::default()
        },
        AuditFilter {
            action: Some("read".into()),
            ..AuditFilter::default()
        },
        AuditFilter {
            since: Some(2_000),
            until: Some(3_000),
            ..AuditFilter::default()
        },
        AuditFilter {
            offset: 1,
            ..AuditFilter::for_identity("alice").limit(1)
        },
    ];
    for f in &filters {
        assert_eq!(sqlite.query(f).unwrap(), memory.query(f).unwrap(), "{f:?}");
    }

    let paged = sqlite
        .query(&AuditFilter {
            offset: 1,
            ..AuditFilter::for_identity("alice").limit(1)
        })
        .unwrap();
    assert_eq!(paged.len(), 1);
    assert_eq!(paged[0].timestamp, 2_000);
}

#[test]
fn sqlite_file_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("audit.db");
    {
        let store = SqliteAuditStore::open(&path).unwrap();
        seed(&store);
        store.flush().unwrap();
    }
    let store = SqliteAuditStore::open(&path).unwrap();
    assert_eq!(store.count().unwrap(), 4);
    assert!(store.describe().starts_with("sqlite:"));
}

#[test]
fn recorder_tail_is_bounded_and_newest_first() {
    let recorder = AuditRecorder::in_memory(3);
    for i in 0..5 {
        recorder.record(rec(AuditKind::GovernanceAllow, "u", "a", i));
    }
    let recent = recorder.recent(10);
    let stamps: Vec<i64> = recent.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![4, 3, 2]);
    assert_eq!(recorder.recent(1)[0].timestamp, 4);
    assert!(!recorder.has_sink());

    let only_u = recorder.query(&AuditFilter::for_identity("u").limit(2));
    assert_eq!(only_u.len(), 2);
}

#[test]
fn recorder_forwards_to_sink_and_drains_on_shutdown() {
    let sink = Arc::new(MemoryAuditSink::new());
    let recorder = AuditRecorder::with_sink(10, 64, sink.clone()).unwrap();
    for i in 0..20 {
        recorder.record(rec(AuditKind::GovernanceAllow, "u", "a", i));
    }
    recorder.shutdown();

    // every record reached the sink, tail keeps only the newest 10
    assert_eq!(sink.len(), 20);
    assert_eq!(recorder.dropped(), 0);
    assert_eq!(recorder.recent(100).len(), 10);
    assert_eq!(recorder.query(&AuditFilter::default()).len(), 20);

    // after shutdown records stay in memory only
    recorder.record(rec(AuditKind::GovernanceAllow, "u", "late", 99));
    assert_eq!(sink.len(), 20);
    assert_eq!(recorder.recent(1)[0].action.as_deref(), Some("late"));
    assert_eq!(recorder.dropped(), 0);

    // idempotent
    recorder.shutdown();
}

#[test]
fn recorder_with_sqlite_sink() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteAuditStore::open(dir.path().join("audit.db")).unwrap());
    let recorder = AuditRecorder::with_sink(100, 16, store.clone()).unwrap();

    recorder.record(rec(AuditKind::GovernanceBlock, "a", "x", 10).with_reason("rate_limit"));
    recorder.record(rec(AuditKind::Inference, "a", "y", 20));
    recorder.shutdown();

    assert_eq!(store.count().unwrap(), 2);
    let blocks = recorder.query(&AuditFilter {
        kind: Some(AuditKind::GovernanceBlock),
        ..AuditFilter::default()
    });
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].reason.as_deref(), Some("rate_limit"));
}
