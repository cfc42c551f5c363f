//! Sliding window log.
//!
//! ```text
//!     limit = 3, window = 1000ms, now = 1500
//!
//!     log: [ 400 | 600 | 1200 | 1450 ]
//!            └─ 1500 - 400 ≥ 1000: evicted
//!
//!     log: [ 600 | 1200 | 1450 ]  len == limit ──► ❌
//! ```
//!
//! Memory grows with `limit`: one timestamp per admission still inside the
//! window. The log stays sorted even when the clock steps backwards, so the
//! oldest admission is always at the front.

use super::metrics::Counters;
use super::{Algorithm, RateLimiter, RateLimiterConfig, RateLimiterMetrics};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Upper bound on the log's pre-allocated capacity.
const MAX_PREALLOCATED: u64 = 1024;

#[derive(Debug)]
struct LogState {
    admissions: VecDeque<u64>,
    counters: Counters,
}

/// `limit` admissions in any trailing window of `window_ms`.
///
/// # Example
///
/// ```rust
/// use warden::{RateLimiter, SlidingWindowLimiter};
///
/// let limiter = SlidingWindowLimiter::new(2, 1000).unwrap();
/// assert!(limiter.try_acquire());
/// assert!(limiter.try_acquire());
/// assert!(!limiter.try_acquire());
/// ```
pub struct SlidingWindowLimiter {
    limit: u64,
    window_ms: u64,
    clock: SharedClock,
    state: Mutex<LogState>,
}

impl SlidingWindowLimiter {
    /// Limiter over the process's monotonic clock.
    pub fn new(limit: u64, window_ms: u64) -> Result<Self, ConfigError> {
        Self::with_clock(limit, window_ms, Arc::new(MonotonicClock))
    }

    /// Limiter reading time from `clock`.
    pub fn with_clock(limit: u64, window_ms: u64, clock: SharedClock) -> Result<Self, ConfigError> {
        RateLimiterConfig::sliding_window(limit, window_ms).validate()?;
        Ok(Self {
            limit,
            window_ms,
            clock,
            state: Mutex::new(LogState {
                admissions: VecDeque::with_capacity(limit.min(MAX_PREALLOCATED) as usize),
                counters: Counters::default(),
            }),
        })
    }

    /// Milliseconds until the next call would be admitted (0 if it would be now).
    pub fn time_until_available_ms(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.evict(&mut state, now_ms);

        if (state.admissions.len() as u64) < self.limit {
            return 0;
        }
        state
            .admissions
            .front()
            .map(|&oldest| self.window_ms.saturating_sub(now_ms.saturating_sub(oldest)))
            .unwrap_or(0)
    }

    #[inline]
    fn evict(&self, state: &mut LogState, now_ms: u64) {
        while let Some(&oldest) = state.admissions.front() {
            if now_ms.saturating_sub(oldest) >= self.window_ms {
                state.admissions.pop_front();
            } else {
                break;
            }
        }
    }

    #[inline]
    fn record(state: &mut LogState, now_ms: u64) {
        match state.admissions.back() {
            Some(&newest) if newest > now_ms => {
                let at = state.admissions.partition_point(|&ts| ts <= now_ms);
                state.admissions.insert(at, now_ms);
            }
            _ => state.admissions.push_back(now_ms),
        }
    }

    #[inline]
    fn remaining(&self, state: &LogState) -> u64 {
        self.limit.saturating_sub(state.admissions.len() as u64)
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn try_acquire(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.evict(&mut state, now_ms);

        let admitted = (state.admissions.len() as u64) < self.limit;
        if admitted {
            Self::record(&mut state, now_ms);
        }
        state.counters.record(admitted)
    }

    fn available(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.evict(&mut state, now_ms);
        self.remaining(&state)
    }

    fn metrics(&self) -> RateLimiterMetrics {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.evict(&mut state, now_ms);
        let available = self.remaining(&state);
        state
            .counters
            .snapshot(Algorithm::SlidingWindow, available, self.limit)
    }

    fn reset(&self) {
        let mut state = self.state.lock();
        state.admissions.clear();
        state.counters = Counters::default();
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::SlidingWindow
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("limit", &self.limit)
            .field("window_ms", &self.window_ms)
            .field("in_window", &self.state.lock().admissions.len())
            .finish()
    }
}
