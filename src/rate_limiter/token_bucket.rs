//! # Token Bucket
//!
//! ```text
//!     Initial State (t=0):
//!     ┌──────────────────┐
//!     │ ●●●●●●●●●●       │ 10/10 tokens (starts full)
//!     └──────────────────┘
//!
//!     After 10 requests (t=0):
//!     ┌──────────────────┐
//!     │                  │ 0/10 tokens, 11th request rejected
//!     └──────────────────┘
//!
//!     After refill (t=5ms, rate 1/ms):
//!     ┌──────────────────┐
//!     │ ●●●●●            │ 5/10 tokens
//!     └──────────────────┘
//! ```
//!
//! Tokens are stored in units of `1 / interval_ms`: a whole token is
//! `interval_ms` units and each elapsed millisecond adds `rate` units. With
//! `rate = 10, interval_ms = 1000` a token appears every 100ms, and partial
//! progress towards the next one is never lost between calls.

use super::metrics::Counters;
use super::{Algorithm, RateLimiter, RateLimiterConfig, RateLimiterMetrics};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill_ms: u64,
    counters: Counters,
}

/// Token bucket holding up to `capacity` tokens, refilled at `rate` tokens
/// per `interval_ms`.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::thread;
/// use warden::{RateLimiter, TokenBucketLimiter};
///
/// let limiter = Arc::new(TokenBucketLimiter::new(100, 10, 1000).unwrap());
///
/// let handles: Vec<_> = (0..4)
///     .map(|_| {
///         let limiter = limiter.clone();
///         thread::spawn(move || (0..25).filter(|_| limiter.try_acquire()).count())
///     })
///     .collect();
///
/// let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
/// assert_eq!(admitted, 100);
/// ```
pub struct TokenBucketLimiter {
    capacity: u64,
    rate: u64,
    interval_ms: u64,
    clock: SharedClock,
    state: Mutex<BucketState>,
}

impl TokenBucketLimiter {
    /// Limiter over the process's monotonic clock.
    pub fn new(capacity: u64, rate: u64, interval_ms: u64) -> Result<Self, ConfigError> {
        Self::with_clock(capacity, rate, interval_ms, Arc::new(MonotonicClock))
    }

    /// Limiter reading time from `clock`. The bucket starts full.
    pub fn with_clock(
        capacity: u64,
        rate: u64,
        interval_ms: u64,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        RateLimiterConfig::token_bucket(capacity, rate, interval_ms).validate()?;
        let now_ms = clock.now_ms();
        Ok(Self {
            capacity,
            rate,
            interval_ms,
            clock,
            state: Mutex::new(BucketState {
                tokens: capacity * interval_ms,
                last_refill_ms: now_ms,
                counters: Counters::default(),
            }),
        })
    }

    /// Takes `n` tokens at once, or none.
    ///
    /// `n = 0` always succeeds; `n > capacity` always fails.
    ///
    /// ```rust
    /// use warden::TokenBucketLimiter;
    ///
    /// let limiter = TokenBucketLimiter::new(10, 1, 1000).unwrap();
    /// assert!(limiter.try_acquire_n(7));
    /// assert!(!limiter.try_acquire_n(4));
    /// assert!(limiter.try_acquire_n(3));
    /// ```
    pub fn try_acquire_n(&self, n: u64) -> bool {
        if n == 0 {
            return true;
        }
        let Some(cost) = n.checked_mul(self.interval_ms) else {
            return false;
        };

        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.refill(&mut state, now_ms);

        let admitted = state.tokens >= cost;
        if admitted {
            state.tokens -= cost;
        }
        state.counters.record(admitted)
    }

    /// Grants `n` extra tokens, capped at capacity.
    pub fn add_tokens(&self, n: u64) {
        let mut state = self.state.lock();
        state.tokens = state
            .tokens
            .saturating_add(n.saturating_mul(self.interval_ms))
            .min(self.scaled_capacity());
    }

    #[inline]
    fn scaled_capacity(&self) -> u64 {
        // Validated not to overflow
        self.capacity * self.interval_ms
    }

    #[inline]
    fn refill(&self, state: &mut BucketState, now_ms: u64) {
        if now_ms <= state.last_refill_ms {
            return;
        }
        let full = self.scaled_capacity();
        if state.tokens < full {
            let added = self.rate.saturating_mul(now_ms - state.last_refill_ms);
            let tokens = state.tokens.saturating_add(added).min(full);
            if tokens / self.interval_ms > state.tokens / self.interval_ms {
                debug!(
                    "Refilled to {} tokens ({}ms elapsed)",
                    tokens / self.interval_ms,
                    now_ms - state.last_refill_ms
                );
            }
            state.tokens = tokens;
        }
        state.last_refill_ms = now_ms;
    }
}

impl RateLimiter for TokenBucketLimiter {
    #[inline]
    fn try_acquire(&self) -> bool {
        self.try_acquire_n(1)
    }

    fn available(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.refill(&mut state, now_ms);
        state.tokens / self.interval_ms
    }

    fn metrics(&self) -> RateLimiterMetrics {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.refill(&mut state, now_ms);
        let available = state.tokens / self.interval_ms;
        state
            .counters
            .snapshot(Algorithm::TokenBucket, available, self.capacity)
    }

    fn reset(&self) {
        let now_ms = self.clock.now_ms();
        *self.state.lock() = BucketState {
            tokens: self.scaled_capacity(),
            last_refill_ms: now_ms,
            counters: Counters::default(),
        };
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::TokenBucket
    }
}

impl std::fmt::Debug for TokenBucketLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucketLimiter")
            .field("capacity", &self.capacity)
            .field("rate", &self.rate)
            .field("interval_ms", &self.interval_ms)
            .field("tokens", &(self.state.lock().tokens / self.interval_ms))
            .finish()
    }
}
