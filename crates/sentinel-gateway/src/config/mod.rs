//! Sidecar config loader (strict parsing).

pub mod schema;

use std::fs;

use sentinel_core::error::{Result, SentinelError};

pub use schema::{
    AuditSection, BudgetSection, PersistenceSection, PolicySection, RateLimitSection,
    SentinelConfig, ServerSection,
};

pub fn load_from_file(path: &str) -> Result<SentinelConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| SentinelError::InvalidConfig(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<SentinelConfig> {
    let cfg: SentinelConfig = serde_yaml::from_str(s)
        .map_err(|e| SentinelError::InvalidConfig(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
