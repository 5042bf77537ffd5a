use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::Serialize;

use super::clock::{Clock, SystemClock};

/// Snapshot of one identity's bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStats {
    /// Whole tokens currently available.
    pub available: f64,
    pub capacity: f64,
    pub refill_per_sec: f64,
}

/// Per-identity token buckets sharing one capacity/refill setting.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    capacity: f64,
    refill_per_sec: f64,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self::with_clock(capacity, refill_per_sec, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: f64, refill_per_sec: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            capacity: capacity.max(0.0),
            refill_per_sec: refill_per_sec.max(0.0),
            clock,
        }
    }

    /// Take `tokens` from the identity's bucket. Zero always succeeds without
    /// touching the balance; negative (or NaN) requests always fail.
    pub fn try_consume(&self, identity: &str, tokens: f64) -> bool {
        let now = self.clock.now();
        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_per_sec, now));
        bucket.try_consume(tokens, now)
    }

    /// Refilled balance without consuming.
    pub fn available(&self, identity: &str) -> f64 {
        let now = self.clock.now();
        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.refill_per_sec, now));
        bucket.refill(now);
        bucket.tokens
    }

    pub fn stats(&self, identity: &str) -> RateLimitStats {
        RateLimitStats {
            available: self.available(identity).floor(),
            capacity: self.capacity,
            refill_per_sec: self.refill_per_sec,
        }
    }

    /// Number of identities with a bucket.
    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: now,
        }
    }

    fn try_consume(&mut self, tokens: f64, now: Instant) -> bool {
        self.refill(now);

        if tokens.is_nan() || tokens < 0.0 {
            return false;
        }
        if tokens == 0.0 {
            return true;
        }
        if self.tokens >= tokens {
            self.tokens -= tokens;
            return true;
        }
        false
    }

    fn refill(&mut self, now: Instant) {
        // A reading behind `last_refill` counts as no time passing.
        let Some(elapsed) = now.checked_duration_since(self.last_refill) else {
            return;
        };
        if elapsed.is_zero() {
            return;
        }

        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}
