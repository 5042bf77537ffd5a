use std::collections::BTreeMap;

use dashmap::DashMap;

/// Cumulative spend per identity against a per-identity (or default) limit.
///
/// `check` is the only place the limit is enforced. `deduct` always records
/// the cost, so usage may run past the limit.
pub struct SpendGuard {
    usage: DashMap<String, f64>,
    limits: DashMap<String, f64>,
    default_limit: f64,
}

impl SpendGuard {
    pub fn new(default_limit: f64) -> Self {
        Self {
            usage: DashMap::new(),
            limits: DashMap::new(),
            default_limit,
        }
    }

    /// Would `cost` fit in the remaining budget? Non-positive costs always fit.
    pub fn check(&self, identity: &str, cost: f64) -> bool {
        if cost <= 0.0 {
            return true;
        }
        self.usage(identity) + cost <= self.limit(identity)
    }

    pub fn deduct(&self, identity: &str, cost: f64) {
        *self.usage.entry(identity.to_string()).or_insert(0.0) += cost;
    }

    pub fn set_limit(&self, identity: &str, limit: f64) {
        self.limits.insert(identity.to_string(), limit);
    }

    pub fn usage(&self, identity: &str) -> f64 {
        self.usage.get(identity).map(|u| *u).unwrap_or(0.0)
    }

    pub fn limit(&self, identity: &str) -> f64 {
        self.limits
            .get(identity)
            .map(|l| *l)
            .unwrap_or(self.default_limit)
    }

    /// Limit minus usage; negative once usage has overrun the limit.
    pub fn remaining(&self, identity: &str) -> f64 {
        self.limit(identity) - self.usage(identity)
    }

    pub fn default_limit(&self) -> f64 {
        self.default_limit
    }

    /// Zero usage for one identity. Custom limits survive; unknown
    /// identities are a no-op.
    pub fn reset(&self, identity: &str) {
        self.usage.remove(identity);
    }

    pub fn reset_all(&self) {
        self.usage.clear();
    }

    pub fn usage_snapshot(&self) -> BTreeMap<String, f64> {
        self.usage
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    /// Replace usage for every identity in `usage`; others are untouched.
    /// Negative or non-finite entries are skipped. Returns how many were applied.
    pub fn restore_usage(&self, usage: &BTreeMap<String, f64>) -> usize {
        let mut applied = 0;
        for (identity, used) in usage {
            if !used.is_finite() || *used < 0.0 {
                continue;
            }
            self.usage.insert(identity.clone(), *used);
            applied += 1;
        }
        applied
    }
}
