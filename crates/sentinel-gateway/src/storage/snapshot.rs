use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sentinel_core::error::{Result, SentinelError};

use crate::engine::DecisionEngine;

/// Loads and saves the identity → cumulative spend map.
pub trait SpendSnapshotStore: Send + Sync {
    fn load(&self) -> Result<BTreeMap<String, f64>>;
    fn save(&self, usage: &BTreeMap<String, f64>) -> Result<()>;
    fn describe(&self) -> String;
}

/// Spend snapshot as a pretty-printed JSON object on disk.
///
/// Saves go to a sibling temp file which is then renamed over the target, so
/// a crash mid-write leaves the previous snapshot intact.
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SpendSnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<BTreeMap<String, f64>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(SentinelError::Storage(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };
        serde_json::from_str(&raw)
            .map_err(|e| SentinelError::Storage(format!("parse {}: {e}", self.path.display())))
    }

    fn save(&self, usage: &BTreeMap<String, f64>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| SentinelError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        let body = serde_json::to_vec_pretty(usage)
            .map_err(|e| SentinelError::Storage(format!("encode snapshot: {e}")))?;

        let tmp = self.temp_path();
        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&body)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| SentinelError::Storage(format!("write {}: {e}", self.path.display())))
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

/// Seed the engine's spend usage from `store`.
///
/// An unreadable or corrupt snapshot is logged and treated as empty; startup
/// never fails on it. Returns how many identities were restored.
pub fn restore_usage(engine: &DecisionEngine, store: &dyn SpendSnapshotStore) -> usize {
    match store.load() {
        Ok(usage) => {
            let applied = engine.restore_usage(&usage);
            tracing::info!(store = %store.describe(), identities = applied, "spend snapshot restored");
            applied
        }
        Err(e) => {
            tracing::warn!(store = %store.describe(), error = %e, "spend snapshot unusable; starting empty");
            0
        }
    }
}
