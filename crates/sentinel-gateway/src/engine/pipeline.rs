use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Map, Value};

use sentinel_core::error::{Result, SentinelError};
use sentinel_core::{AuditKind, AuditRecord, Decision, Effect, InferenceReport};

use crate::audit::AuditRecorder;
use crate::config::SentinelConfig;
use crate::limits::{Clock, RateLimitStats, RateLimiter, SpendGuard, SystemClock};
use crate::obs::SentinelMetrics;
use crate::policy::{PolicyConfig, PolicyEvaluator};

use super::identity_lock::IdentityLocks;

pub const RATE_LIMIT_REASON: &str = "rate limit exceeded";

/// Numeric limits the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineLimits {
    pub default_spend_limit: f64,
    pub bucket_capacity: f64,
    pub refill_per_sec: f64,
}

impl From<&SentinelConfig> for EngineLimits {
    fn from(cfg: &SentinelConfig) -> Self {
        Self {
            default_spend_limit: cfg.budget.default_limit,
            bucket_capacity: cfg.rate_limit.capacity,
            refill_per_sec: cfg.rate_limit.refill_per_sec,
        }
    }
}

/// One action an agent wants to perform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckRequest {
    pub identity: String,
    pub action: String,
    pub context: Map<String, Value>,
    pub cost_estimate: Option<f64>,
}

impl CheckRequest {
    pub fn new(identity: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost_estimate = Some(cost);
        self
    }

    /// Caller contract: identity and action present, cost finite and not
    /// negative. The identity is opaque; only an empty one is rejected.
    pub fn validate(&self) -> Result<()> {
        if self.identity.is_empty() {
            return Err(SentinelError::BadRequest("identity is required".into()));
        }
        if self.action.trim().is_empty() {
            return Err(SentinelError::BadRequest("action is required".into()));
        }
        if let Some(cost) = self.cost_estimate {
            if !cost.is_finite() {
                return Err(SentinelError::BadRequest("costEstimate must be a finite number".into()));
            }
            if cost < 0.0 {
                return Err(SentinelError::BadRequest("costEstimate must not be negative".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BudgetStats {
    pub used: f64,
    pub limit: f64,
    pub remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStats {
    #[serde(rename = "userId")]
    pub identity: String,
    pub budget: BudgetStats,
    pub rate_limit: RateLimitStats,
}

/// Composes rate limiter, spend guard, and policy evaluator into one
/// side-effecting `evaluate` call, and writes the audit trail.
pub struct DecisionEngine {
    rate_limiter: RateLimiter,
    spend: SpendGuard,
    policy: PolicyEvaluator,
    audit: Arc<AuditRecorder>,
    locks: IdentityLocks,
    metrics: Arc<SentinelMetrics>,
}

impl DecisionEngine {
    pub fn new(limits: EngineLimits, policy: PolicyConfig, audit: Arc<AuditRecorder>) -> Result<Self> {
        Self::with_clock(limits, policy, audit, Arc::new(SystemClock))
    }

    pub fn with_clock(
        limits: EngineLimits,
        policy: PolicyConfig,
        audit: Arc<AuditRecorder>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Ok(Self {
            rate_limiter: RateLimiter::with_clock(limits.bucket_capacity, limits.refill_per_sec, clock),
            spend: SpendGuard::new(limits.default_spend_limit),
            policy: PolicyEvaluator::new(policy)?,
            audit,
            locks: IdentityLocks::new(),
            metrics: Arc::new(SentinelMetrics::default()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<SentinelMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Decide whether `req` may proceed.
    ///
    /// Order: rate limit, spend check, policy; the first block ends the
    /// evaluation with nothing deducted. A granted request with a cost
    /// estimate is charged before returning. Exactly one audit record per
    /// outcome, except warn-then-allow which records the warning and the
    /// grant. Only caller-contract violations return `Err`.
    pub fn evaluate(&self, req: &CheckRequest) -> Result<Decision> {
        req.validate()?;
        let started = Instant::now();

        let cell = self.locks.cell(&req.identity);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);

        let (decision, stage) = self.evaluate_locked(req);

        let outcome = if decision.allowed { "allow" } else { "block" };
        self.metrics
            .decisions
            .inc(&[("outcome", outcome), ("stage", stage)]);
        self.metrics
            .evaluate_duration
            .observe(&[("outcome", outcome)], started.elapsed());

        tracing::debug!(
            identity = %req.identity,
            action = %req.action,
            allowed = decision.allowed,
            stage,
            "evaluated"
        );
        Ok(decision)
    }

    fn evaluate_locked(&self, req: &CheckRequest) -> (Decision, &'static str) {
        let identity = req.identity.as_str();

        // 1) rate limit
        if !self.rate_limiter.try_consume(identity, 1.0) {
            let stats = self.rate_limiter.stats(identity);
            self.emit(
                AuditRecord::new(AuditKind::GovernanceBlock, identity)
                    .with_action(&req.action)
                    .with_reason("rate_limit")
                    .with_details(json!({ "rateLimitStats": stats })),
            );
            return (Decision::blocked(RATE_LIMIT_REASON), "rate_limit");
        }

        // 2) spend pre-check (no deduction on failure)
        if let Some(cost) = req.cost_estimate {
            if !self.spend.check(identity, cost) {
                let used = self.spend.usage(identity);
                let limit = self.spend.limit(identity);
                self.emit(
                    AuditRecord::new(AuditKind::GovernanceBlock, identity)
                        .with_action(&req.action)
                        .with_reason("budget_exceeded")
                        .with_details(json!({
                            "costEstimate": cost,
                            "currentUsage": used,
                            "limit": limit,
                        })),
                );
                let reason = format!("budget exceeded (used: {used:.2}, limit: {limit:.2})");
                return (Decision::blocked(reason), "budget");
            }
        }

        // 3) policy, with the caller's identity as userId
        let mut policy_ctx = req.context.clone();
        policy_ctx.insert("userId".to_string(), Value::String(req.identity.clone()));
        let verdict = self.policy.evaluate(&req.action, &policy_ctx);

        let mut warnings = Vec::new();
        match verdict.effect {
            Effect::Deny => {
                self.emit(
                    AuditRecord::new(AuditKind::GovernanceBlock, identity)
                        .with_action(&req.action)
                        .with_reason("policy_violation")
                        .with_details(json!({
                            "matchedRule": verdict.matched_rule_id,
                            "policyReason": verdict.reason,
                            "context": req.context,
                        })),
                );
                let decision = Decision::blocked(verdict.reason).with_rule(verdict.matched_rule_id);
                return (decision, "policy");
            }
            Effect::Warn => {
                self.emit(
                    AuditRecord::new(AuditKind::GovernanceWarning, identity)
                        .with_action(&req.action)
                        .with_reason("policy_warning")
                        .with_details(json!({
                            "matchedRule": verdict.matched_rule_id,
                            "policyReason": verdict.reason,
                            "context": req.context,
                        })),
                );
                warnings.push(verdict.reason.clone());
            }
            Effect::Allow => {}
        }

        // 4) commit
        let mut details = json!({ "context": req.context });
        if let Some(cost) = req.cost_estimate {
            self.spend.deduct(identity, cost);
            details["costEstimate"] = json!(cost);
            details["newUsage"] = json!(self.spend.usage(identity));
        }
        if let Some(rule) = &verdict.matched_rule_id {
            details["matchedRule"] = json!(rule);
        }
        self.emit(
            AuditRecord::new(AuditKind::GovernanceAllow, identity)
                .with_action(&req.action)
                .with_details(details),
        );

        (
            Decision::granted(verdict.effect, verdict.matched_rule_id, warnings),
            "granted",
        )
    }

    fn emit(&self, record: AuditRecord) {
        self.metrics
            .audit_records
            .inc(&[("type", record.kind.as_str())]);
        self.audit.record(record);
    }

    /// Record model-inference usage reported by an agent. Spend is untouched.
    pub fn record_inference(&self, identity: &str, report: &InferenceReport) -> Result<()> {
        if identity.is_empty() {
            return Err(SentinelError::BadRequest("identity is required".into()));
        }
        if report.provider_id.trim().is_empty() || report.model.trim().is_empty() {
            return Err(SentinelError::BadRequest("providerId and model are required".into()));
        }
        self.emit(AuditRecord::inference(identity, report));
        Ok(())
    }

    pub fn set_limit(&self, identity: &str, limit: f64) -> Result<()> {
        if identity.is_empty() {
            return Err(SentinelError::BadRequest("identity is required".into()));
        }
        if !limit.is_finite() {
            return Err(SentinelError::BadRequest("limit must be a finite number".into()));
        }
        let cell = self.locks.cell(identity);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
        self.spend.set_limit(identity, limit);
        tracing::info!(%identity, limit, "spend limit set");
        Ok(())
    }

    pub fn reset_usage(&self, identity: &str) -> Result<()> {
        if identity.is_empty() {
            return Err(SentinelError::BadRequest("identity is required".into()));
        }
        let cell = self.locks.cell(identity);
        let _guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
        self.spend.reset(identity);
        tracing::info!(%identity, "spend usage reset");
        Ok(())
    }

    pub fn reset_all(&self) {
        self.spend.reset_all();
        tracing::info!("spend usage reset for all identities");
    }

    pub fn stats(&self, identity: &str) -> IdentityStats {
        IdentityStats {
            identity: identity.to_string(),
            budget: BudgetStats {
                used: self.spend.usage(identity),
                limit: self.spend.limit(identity),
                remaining: self.spend.remaining(identity),
            },
            rate_limit: self.rate_limiter.stats(identity),
        }
    }

    pub fn usage_snapshot(&self) -> BTreeMap<String, f64> {
        self.spend.usage_snapshot()
    }

    pub fn restore_usage(&self, usage: &BTreeMap<String, f64>) -> usize {
        self.spend.restore_usage(usage)
    }

    pub fn tracked_identities(&self) -> usize {
        self.rate_limiter.tracked()
    }

    pub fn policy(&self) -> &PolicyEvaluator {
        &self.policy
    }

    pub fn spend(&self) -> &SpendGuard {
        &self.spend
    }

    pub fn audit(&self) -> &Arc<AuditRecorder> {
        &self.audit
    }

    pub fn metrics(&self) -> &Arc<SentinelMetrics> {
        &self.metrics
    }
}
