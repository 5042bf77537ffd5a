use std::net::SocketAddr;

use serde::Deserialize;
use sentinel_core::error::{Result, SentinelError};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SentinelConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub budget: BudgetSection,

    #[serde(default)]
    pub rate_limit: RateLimitSection,

    #[serde(default)]
    pub policy: PolicySection,

    #[serde(default)]
    pub persistence: PersistenceSection,

    #[serde(default)]
    pub audit: AuditSection,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            budget: BudgetSection::default(),
            rate_limit: RateLimitSection::default(),
            policy: PolicySection::default(),
            persistence: PersistenceSection::default(),
            audit: AuditSection::default(),
        }
    }
}

impl SentinelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(SentinelError::UnsupportedVersion);
        }

        self.server.validate()?;
        self.budget.validate()?;
        self.rate_limit.validate()?;
        self.persistence.validate()?;
        self.audit.validate()?;

        Ok(())
    }

    /// Apply `SENTINEL_*` overrides through `lookup` (normally `std::env::var`)
    /// and re-validate.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SENTINEL_LISTEN") {
            self.server.listen = v;
        }
        if let Some(v) = lookup("SENTINEL_DEFAULT_BUDGET") {
            self.budget.default_limit = parse_override("SENTINEL_DEFAULT_BUDGET", &v)?;
        }
        if let Some(v) = lookup("SENTINEL_RATE_LIMIT_CAPACITY") {
            self.rate_limit.capacity = parse_override("SENTINEL_RATE_LIMIT_CAPACITY", &v)?;
        }
        if let Some(v) = lookup("SENTINEL_RATE_LIMIT_REFILL") {
            self.rate_limit.refill_per_sec = parse_override("SENTINEL_RATE_LIMIT_REFILL", &v)?;
        }
        if let Some(v) = lookup("SENTINEL_POLICY_PATH") {
            self.policy.path = Some(v);
        }
        if let Some(v) = lookup("SENTINEL_SNAPSHOT_PATH") {
            self.persistence.snapshot_path = v;
        }
        if let Some(v) = lookup("SENTINEL_AUDIT_DB") {
            self.persistence.audit_db_path = Some(v);
        }
        self.validate()
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen
            .parse()
            .map_err(|e| SentinelError::InvalidConfig(format!("server.listen: {e}")))
    }
}

fn parse_override(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse()
        .map_err(|_| SentinelError::InvalidConfig(format!("{key} must be a number, got {raw:?}")))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen.parse::<SocketAddr>().map_err(|_| {
            SentinelError::InvalidConfig(format!(
                "server.listen must be a socket address, got {:?}",
                self.listen
            ))
        })?;
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:11435".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetSection {
    #[serde(default = "default_budget_limit")]
    pub default_limit: f64,
}

impl Default for BudgetSection {
    fn default() -> Self {
        Self {
            default_limit: default_budget_limit(),
        }
    }
}

impl BudgetSection {
    pub fn validate(&self) -> Result<()> {
        if !self.default_limit.is_finite() || self.default_limit < 0.0 {
            return Err(SentinelError::InvalidConfig(
                "budget.default_limit must be a finite number >= 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_budget_limit() -> f64 {
    10.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSection {
    #[serde(default = "default_capacity")]
    pub capacity: f64,

    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: f64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_sec: default_refill_per_sec(),
        }
    }
}

impl RateLimitSection {
    pub fn validate(&self) -> Result<()> {
        if !self.capacity.is_finite() || self.capacity <= 0.0 {
            return Err(SentinelError::InvalidConfig(
                "rate_limit.capacity must be a finite number > 0".into(),
            ));
        }
        if !self.refill_per_sec.is_finite() || self.refill_per_sec < 0.0 {
            return Err(SentinelError::InvalidConfig(
                "rate_limit.refill_per_sec must be a finite number >= 0".into(),
            ));
        }
        Ok(())
    }
}

fn default_capacity() -> f64 {
    100.0
}
fn default_refill_per_sec() -> f64 {
    10.0
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicySection {
    /// Policy document; falls back to the built-in default policy when unset.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersistenceSection {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,

    #[serde(default)]
    pub audit_db_path: Option<String>,
}

impl Default for PersistenceSection {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
            audit_db_path: None,
        }
    }
}

impl PersistenceSection {
    pub fn validate(&self) -> Result<()> {
        if self.snapshot_path.trim().is_empty() {
            return Err(SentinelError::InvalidConfig(
                "persistence.snapshot_path must not be empty".into(),
            ));
        }
        if !(1..=86_400).contains(&self.snapshot_interval_secs) {
            return Err(SentinelError::InvalidConfig(
                "persistence.snapshot_interval_secs must be between 1 and 86400".into(),
            ));
        }
        Ok(())
    }
}

fn default_snapshot_path() -> String {
    "budget.json".into()
}
fn default_snapshot_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditSection {
    /// In-memory tail size.
    #[serde(default = "default_retain")]
    pub retain: usize,

    /// Pending records allowed between the recorder and the persistent sink.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            retain: default_retain(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AuditSection {
    pub fn validate(&self) -> Result<()> {
        if self.retain == 0 {
            return Err(SentinelError::InvalidConfig("audit.retain must be >= 1".into()));
        }
        if self.queue_capacity == 0 {
            return Err(SentinelError::InvalidConfig(
                "audit.queue_capacity must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

fn default_retain() -> usize {
    1000
}
fn default_queue_capacity() -> usize {
    1024
}
