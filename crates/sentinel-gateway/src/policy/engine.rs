use std::sync::{Arc, PoisonError, RwLock};

use chrono::{Local, NaiveTime};
use serde_json::{Map, Value};

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::Effect;

use super::rules::{PolicyConfig, PolicyRule, RuleContext};

pub const DEFAULT_REASON: &str = "no rule matched, using default policy";

/// Outcome of policy evaluation alone (before limits are considered).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyVerdict {
    pub effect: Effect,
    pub matched_rule_id: Option<String>,
    pub reason: String,
}

/// First-match-wins evaluator over a swappable rule set.
///
/// Every evaluation runs against one `Arc<PolicyConfig>` snapshot; mutations
/// build a new config and swap it in whole, so a rule is never half-applied.
pub struct PolicyEvaluator {
    config: RwLock<Arc<PolicyConfig>>,
}

impl PolicyEvaluator {
    pub fn new(config: PolicyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: RwLock::new(Arc::new(config)),
        })
    }

    /// Evaluate against local wall-clock time.
    pub fn evaluate(&self, action: &str, context: &Map<String, Value>) -> PolicyVerdict {
        self.evaluate_at(action, context, Local::now().time())
    }

    pub fn evaluate_at(&self, action: &str, context: &Map<String, Value>, now: NaiveTime) -> PolicyVerdict {
        let config = self.snapshot();
        let ctx = RuleContext::from_map(context, now);

        for rule in &config.rules {
            if rule.matches(action, &ctx) {
                return PolicyVerdict {
                    effect: rule.effect,
                    matched_rule_id: Some(rule.id.clone()),
                    reason: rule.describe(),
                };
            }
        }

        PolicyVerdict {
            effect: config.default_effect.into(),
            matched_rule_id: None,
            reason: DEFAULT_REASON.to_string(),
        }
    }

    /// Current configuration as one immutable snapshot.
    pub fn snapshot(&self) -> Arc<PolicyConfig> {
        let guard = self.config.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn rule_count(&self) -> usize {
        self.snapshot().rules.len()
    }

    /// Replace the whole configuration.
    pub fn update_policy(&self, config: PolicyConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        Ok(())
    }

    /// Append a rule at the lowest priority.
    pub fn add_rule(&self, rule: PolicyRule) -> Result<()> {
        rule.validate()?;
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if guard.rules.iter().any(|r| r.id == rule.id) {
            return Err(SentinelError::InvalidPolicy(format!(
                "duplicate rule id: {}",
                rule.id
            )));
        }
        let mut next = PolicyConfig::clone(&guard);
        next.rules.push(rule);
        *guard = Arc::new(next);
        Ok(())
    }

    /// Returns whether a rule with `rule_id` existed.
    pub fn remove_rule(&self, rule_id: &str) -> bool {
        let mut guard = self.config.write().unwrap_or_else(PoisonError::into_inner);
        if !guard.rules.iter().any(|r| r.id == rule_id) {
            return false;
        }
        let mut next = PolicyConfig::clone(&guard);
        next.rules.retain(|r| r.id != rule_id);
        *guard = Arc::new(next);
        true
    }
}
