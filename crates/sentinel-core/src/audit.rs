//! Audit record types.
//!
//! An `AuditRecord` is an immutable, timestamped account of one governance
//! outcome. Records are created by the decision engine and handed to the
//! audit recorder, which owns them from then on.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Result, SentinelError};

/// Closed set of audit record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    GovernanceAllow,
    GovernanceBlock,
    GovernanceWarning,
    Inference,
}

impl AuditKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditKind::GovernanceAllow => "governance_allow",
            AuditKind::GovernanceBlock => "governance_block",
            AuditKind::GovernanceWarning => "governance_warning",
            AuditKind::Inference => "inference",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditKind {
    type Err = SentinelError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "governance_allow" => Ok(AuditKind::GovernanceAllow),
            "governance_block" => Ok(AuditKind::GovernanceBlock),
            "governance_warning" => Ok(AuditKind::GovernanceWarning),
            "inference" => Ok(AuditKind::Inference),
            other => Err(SentinelError::BadRequest(format!("unknown audit type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "type")]
    pub kind: AuditKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl AuditRecord {
    /// New record stamped with the current wall-clock time.
    pub fn new(kind: AuditKind, identity: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp: Utc::now().timestamp_millis(),
            identity: identity.into(),
            action: None,
            reason: None,
            details: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Inference usage record. Inference records carry no action.
    pub fn inference(identity: impl Into<String>, report: &InferenceReport) -> Self {
        let details = serde_json::to_value(report).unwrap_or_else(|_| json!({}));
        Self::new(AuditKind::Inference, identity).with_details(details)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStatus {
    Success,
    Error,
}

/// Usage report for one model-inference call made by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceReport {
    pub provider_id: String,
    pub model: String,
    #[serde(default)]
    pub context_size: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub duration_ms: u64,
    pub status: InferenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Read-side query over recorded audit entries. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFilter {
    pub identity: Option<String>,
    pub action: Option<String>,
    pub kind: Option<AuditKind>,
    /// Inclusive lower bound, epoch ms.
    pub since: Option<i64>,
    /// Inclusive upper bound, epoch ms.
    pub until: Option<i64>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            identity: None,
            action: None,
            kind: None,
            since: None,
            until: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

impl AuditFilter {
    pub fn for_identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            ..Self::default()
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Predicate part of the filter (limit/offset are applied by callers).
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(id) = &self.identity {
            if &record.identity != id {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if record.action.as_deref() != Some(action.as_str()) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if record.kind != kind {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.timestamp > until {
                return false;
            }
        }
        true
    }

    /// Apply the whole filter to records stored oldest first.
    pub fn select<'a, I>(&self, oldest_first: I) -> Vec<AuditRecord>
    where
        I: DoubleEndedIterator<Item = &'a AuditRecord>,
    {
        oldest_first
            .rev()
            .filter(|r| self.matches(r))
            .skip(self.offset)
            .take(self.limit)
            .cloned()
            .collect()
    }
}
