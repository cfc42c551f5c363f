//! Leaky bucket (as a meter).
//!
//! ```text
//!          admissions
//!              │
//!              ▼
//!         ┌─────────┐
//!         │░░░░░░░░░│ ← capacity
//!         │▓▓▓▓▓▓▓▓▓│ ← level
//!         └────┬────┘
//!              │ drains rate per interval_ms
//!              ▼
//! ```
//!
//! The level is kept in units of `1 / interval_ms` so that draining
//! `rate × elapsed_ms` is exact integer arithmetic: one admission adds
//! `interval_ms` to the level, each millisecond removes `rate`.

use super::metrics::Counters;
use super::{Algorithm, RateLimiter, RateLimiterConfig, RateLimiterMetrics};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug)]
struct BucketState {
    level: u64,
    last_leak_ms: u64,
    counters: Counters,
}

/// Admits while one more unit fits under `capacity`; drains `rate` units per
/// `interval_ms`. Starts empty.
///
/// # Example
///
/// ```rust
/// use warden::{LeakyBucketLimiter, RateLimiter};
///
/// // 5 in flight, drains 1 per second
/// let limiter = LeakyBucketLimiter::new(5, 1, 1000).unwrap();
/// let admitted = (0..10).filter(|_| limiter.try_acquire()).count();
/// assert_eq!(admitted, 5);
/// ```
pub struct LeakyBucketLimiter {
    capacity: u64,
    rate: u64,
    interval_ms: u64,
    clock: SharedClock,
    state: Mutex<BucketState>,
}

impl LeakyBucketLimiter {
    /// Limiter over the process's monotonic clock.
    pub fn new(capacity: u64, rate: u64, interval_ms: u64) -> Result<Self, ConfigError> {
        Self::with_clock(capacity, rate, interval_ms, Arc::new(MonotonicClock))
    }

    /// Limiter reading time from `clock`.
    pub fn with_clock(
        capacity: u64,
        rate: u64,
        interval_ms: u64,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        RateLimiterConfig::leaky_bucket(capacity, rate, interval_ms).validate()?;
        let now_ms = clock.now_ms();
        Ok(Self {
            capacity,
            rate,
            interval_ms,
            clock,
            state: Mutex::new(BucketState {
                level: 0,
                last_leak_ms: now_ms,
                counters: Counters::default(),
            }),
        })
    }

    /// Current fill level in whole units, rounded up.
    pub fn level(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.leak(&mut state, now_ms);
        state.level / self.interval_ms + u64::from(state.level % self.interval_ms != 0)
    }

    #[inline]
    fn scaled_capacity(&self) -> u64 {
        // Validated not to overflow
        self.capacity * self.interval_ms
    }

    #[inline]
    fn leak(&self, state: &mut BucketState, now_ms: u64) {
        if now_ms > state.last_leak_ms {
            let drained = self.rate.saturating_mul(now_ms - state.last_leak_ms);
            state.level = state.level.saturating_sub(drained);
            state.last_leak_ms = now_ms;
        }
    }

    #[inline]
    fn headroom(&self, state: &BucketState) -> u64 {
        (self.scaled_capacity() - state.level) / self.interval_ms
    }
}

impl RateLimiter for LeakyBucketLimiter {
    fn try_acquire(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.leak(&mut state, now_ms);

        let admitted = self.scaled_capacity() - state.level >= self.interval_ms;
        if admitted {
            state.level += self.interval_ms;
        }
        state.counters.record(admitted)
    }

    fn available(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.leak(&mut state, now_ms);
        self.headroom(&state)
    }

    fn metrics(&self) -> RateLimiterMetrics {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.leak(&mut state, now_ms);
        let available = self.headroom(&state);
        state
            .counters
            .snapshot(Algorithm::LeakyBucket, available, self.capacity)
    }

    fn reset(&self) {
        let now_ms = self.clock.now_ms();
        *self.state.lock() = BucketState {
            level: 0,
            last_leak_ms: now_ms,
            counters: Counters::default(),
        };
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::LeakyBucket
    }
}

impl std::fmt::Debug for LeakyBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakyBucketLimiter")
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("interval_ms", &self.interval_ms)
            .finish()
    }
}
