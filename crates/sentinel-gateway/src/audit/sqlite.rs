//! SQLite-backed audit store.
//!
//! One row per record. Indexed by timestamp (descending) for recent-N reads
//! and by identity for per-agent history.

use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::{AuditFilter, AuditKind, AuditRecord};

use super::sink::AuditSink;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS audit_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    identity TEXT NOT NULL,
    type TEXT NOT NULL,
    action TEXT,
    reason TEXT,
    details TEXT
);
CREATE INDEX IF NOT EXISTS idx_audit_logs_timestamp ON audit_logs (timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_audit_logs_identity ON audit_logs (identity);
";

pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
    location: String,
}

type Row = (i64, String, String, Option<String>, Option<String>, Option<String>);

impl SqliteAuditStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        ensure_parent_dir(path)?;
        let conn = Connection::open(path).map_err(db_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_err)?;
        conn.pragma_update_and_check(None, "journal_mode", "wal", |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        Self::init(conn, path.display().to_string())
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn, ":memory:".to_string())
    }

    fn init(conn: Connection, location: String) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM audit_logs", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

impl AuditSink for SqliteAuditStore {
    fn record(&self, entry: &AuditRecord) -> Result<()> {
        let details = entry
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| SentinelError::Internal(format!("encode audit details: {e}")))?;

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.prepare_cached(
            "INSERT INTO audit_logs (timestamp, identity, type, action, reason, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .and_then(|mut stmt| {
            stmt.execute(params![
                entry.timestamp,
                entry.identity,
                entry.kind.as_str(),
                entry.action,
                entry.reason,
                details,
            ])
        })
        .map_err(db_err)?;
        Ok(())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>> {
        let mut sql = String::from(
            "SELECT timestamp, identity, type, action, reason, details FROM audit_logs WHERE 1=1",
        );
        let mut args: Vec<SqlValue> = Vec::new();

        if let Some(identity) = &filter.identity {
            sql.push_str(" AND identity = ?");
            args.push(SqlValue::Text(identity.clone()));
        }
        if let Some(action) = &filter.action {
            sql.push_str(" AND action = ?");
            args.push(SqlValue::Text(action.clone()));
        }
        if let Some(kind) = filter.kind {
            sql.push_str(" AND type = ?");
            args.push(SqlValue::Text(kind.as_str().to_string()));
        }
        if let Some(since) = filter.since {
            sql.push_str(" AND timestamp >= ?");
            args.push(SqlValue::Integer(since));
        }
        if let Some(until) = filter.until {
            sql.push_str(" AND timestamp <= ?");
            args.push(SqlValue::Integer(until));
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?");
        args.push(SqlValue::Integer(i64::try_from(filter.limit).unwrap_or(i64::MAX)));
        args.push(SqlValue::Integer(i64::try_from(filter.offset).unwrap_or(i64::MAX)));

        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(db_err)?;

        let mut out = Vec::new();
        for row in rows {
            let row: Row = row.map_err(db_err)?;
            if let Some(record) = decode_row(row) {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn flush(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        // No-op outside WAL mode.
        conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |_| Ok(()))
            .map_err(db_err)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.location)
    }
}

fn decode_row((timestamp, identity, kind, action, reason, details): Row) -> Option<AuditRecord> {
    let kind: AuditKind = match kind.parse() {
        Ok(k) => k,
        Err(_) => {
            tracing::warn!(%kind, "skipping audit row with unknown type");
            return None;
        }
    };
    // Unreadable details degrade to an empty object rather than hiding the row.
    let details = details.map(|d| {
        serde_json::from_str(&d).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    });
    Some(AuditRecord {
        kind,
        timestamp,
        identity,
        action,
        reason,
        details,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(parent).map_err(|e| {
        SentinelError::Storage(format!("create {} failed: {e}", parent.display()))
    })
}

fn db_err(e: rusqlite::Error) -> SentinelError {
    SentinelError::Storage(e.to_string())
}
