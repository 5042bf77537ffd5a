//! Rule document types and condition matching.
//!
//! The serialized shape follows the policy documents operators already
//! write: `{ id, action, effect, conditions?, reason? }`.

use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::{DefaultEffect, Effect, Glob};

/// Whole rule set. Rule order is significant: first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub default_effect: DefaultEffect,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl PolicyConfig {
    pub fn new(default_effect: DefaultEffect, rules: Vec<PolicyRule>) -> Self {
        Self {
            default_effect,
            rules,
        }
    }

    /// Checks that cannot be expressed in serde: unique ids, finite costs.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.rules.len());
        for rule in &self.rules {
            rule.validate()?;
            if !seen.insert(rule.id.as_str()) {
                return Err(SentinelError::InvalidPolicy(format!(
                    "duplicate rule id: {}",
                    rule.id
                )));
            }
        }
        Ok(())
    }

    pub fn parse_json(s: &str) -> Result<Self> {
        let cfg: PolicyConfig = serde_json::from_str(s)
            .map_err(|e| SentinelError::InvalidPolicy(format!("invalid json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn parse_yaml(s: &str) -> Result<Self> {
        let cfg: PolicyConfig = serde_yaml::from_str(s)
            .map_err(|e| SentinelError::InvalidPolicy(format!("invalid yaml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyRule {
    pub id: String,
    #[serde(alias = "actionPattern")]
    pub action: Glob,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<RuleConditions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PolicyRule {
    pub fn new(id: impl Into<String>, action: Glob, effect: Effect) -> Self {
        Self {
            id: id.into(),
            action,
            effect,
            conditions: None,
            reason: None,
        }
    }

    pub fn with_conditions(mut self, conditions: RuleConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SentinelError::InvalidPolicy("rule id must not be empty".into()));
        }
        if let Some(max) = self.conditions.as_ref().and_then(|c| c.max_cost) {
            if !max.is_finite() {
                return Err(SentinelError::InvalidPolicy(format!(
                    "rule {}: maxCost must be finite",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Action pattern and every present condition must match.
    pub fn matches(&self, action: &str, ctx: &RuleContext<'_>) -> bool {
        if !self.action.matches(action) {
            return false;
        }
        match &self.conditions {
            None => true,
            Some(c) => c.matches(ctx),
        }
    }

    /// Reason reported when this rule fires.
    pub fn describe(&self) -> String {
        match &self.reason {
            Some(r) if !r.is_empty() => r.clone(),
            _ => format!("matched rule: {}", self.id),
        }
    }
}

/// Optional rule conditions, combined with logical AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RuleConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_pattern: Option<Glob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_pattern: Option<Glob>,
    /// Fires only when the context cost is strictly above this threshold.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
}

impl RuleConditions {
    fn matches(&self, ctx: &RuleContext<'_>) -> bool {
        if let Some(p) = &self.path_pattern {
            match ctx.path {
                Some(path) if p.matches(path) => {}
                _ => return false,
            }
        }
        if let Some(max) = self.max_cost {
            match ctx.cost {
                Some(cost) if cost > max => {}
                _ => return false,
            }
        }
        if let Some(p) = &self.user_pattern {
            match ctx.user_id {
                Some(user) if p.matches(user) => {}
                _ => return false,
            }
        }
        if let Some(w) = &self.time_window {
            if !w.contains(ctx.now) {
                return false;
            }
        }
        true
    }
}

/// Daily window. `start > end` wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl TimeWindow {
    /// Inclusive at both bounds, minute resolution.
    pub fn contains(&self, now: NaiveTime) -> bool {
        let now = TimeOfDay::truncate(now);
        if self.start <= self.end {
            self.start <= now && now <= self.end
        } else {
            now >= self.start || now <= self.end
        }
    }
}

/// `HH:MM` wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn parse(s: &str) -> Result<Self> {
        let t = NaiveTime::parse_from_str(s.trim(), "%H:%M").map_err(|_| {
            SentinelError::InvalidPolicy(format!("time must be HH:MM, got {s:?}"))
        })?;
        Ok(Self(t))
    }

    fn truncate(t: NaiveTime) -> Self {
        Self(NaiveTime::from_hms_opt(t.hour(), t.minute(), 0).unwrap_or(t))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = SentinelError;

    fn try_from(value: String) -> Result<Self> {
        TimeOfDay::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Fields of the request context that conditions look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub path: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub cost: Option<f64>,
    pub now: NaiveTime,
}

impl<'a> RuleContext<'a> {
    /// Values of the wrong JSON type count as absent.
    pub fn from_map(ctx: &'a Map<String, Value>, now: NaiveTime) -> Self {
        Self {
            path: ctx.get("path").and_then(Value::as_str),
            user_id: ctx.get("userId").and_then(Value::as_str),
            cost: ctx.get("cost").and_then(Value::as_f64),
            now,
        }
    }
}
