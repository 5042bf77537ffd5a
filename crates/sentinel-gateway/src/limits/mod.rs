//! Per-identity limits: token-bucket rate limiting and cumulative spend.
//!
//! Both trackers create state lazily on first reference to an identity and
//! keep it for the process lifetime. Neither runs background work: bucket
//! refill is computed on access from elapsed clock time.

pub mod clock;
pub mod rate_limiter;
pub mod spend_guard;

pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limiter::{RateLimitStats, RateLimiter};
pub use spend_guard::SpendGuard;
