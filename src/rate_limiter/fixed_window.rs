//! Fixed window counter.
//!
//! ```text
//!     limit = 3, window = 1000ms
//!
//!     t:     0    200   400   900 │ 1000  1100
//!            ✅   ✅    ✅    ❌  │  ✅    ✅
//!     count: 1    2     3     3   │  1     2
//!                                 └─ elapsed ≥ window: count = 0, start = now
//! ```
//!
//! Up to twice the limit can pass in a short span straddling a boundary;
//! [`SlidingWindowLimiter`](super::SlidingWindowLimiter) removes that burst
//! at the cost of remembering every admission.

use super::metrics::Counters;
use super::{Algorithm, RateLimiter, RateLimiterConfig, RateLimiterMetrics};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::ConfigError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct WindowState {
    window_start_ms: u64,
    count: u64,
    counters: Counters,
}

impl WindowState {
    fn new(now_ms: u64) -> Self {
        Self {
            window_start_ms: now_ms,
            count: 0,
            counters: Counters::default(),
        }
    }
}

/// `limit` admissions per window of `window_ms`.
///
/// # Example
///
/// ```rust
/// use warden::{FixedWindowLimiter, RateLimiter};
///
/// let limiter = FixedWindowLimiter::new(10, 1000).unwrap();
/// let admitted = (0..20).filter(|_| limiter.try_acquire()).count();
/// assert_eq!(admitted, 10);
/// ```
pub struct FixedWindowLimiter {
    limit: u64,
    window_ms: u64,
    clock: SharedClock,
    state: Mutex<WindowState>,
}

impl FixedWindowLimiter {
    /// Limiter over the process's monotonic clock.
    pub fn new(limit: u64, window_ms: u64) -> Result<Self, ConfigError> {
        Self::with_clock(limit, window_ms, Arc::new(MonotonicClock))
    }

    /// Limiter reading time from `clock`. The first window starts now.
    pub fn with_clock(limit: u64, window_ms: u64, clock: SharedClock) -> Result<Self, ConfigError> {
        RateLimiterConfig::fixed_window(limit, window_ms).validate()?;
        let now_ms = clock.now_ms();
        Ok(Self {
            limit,
            window_ms,
            clock,
            state: Mutex::new(WindowState::new(now_ms)),
        })
    }

    /// Milliseconds until the current window ends.
    pub fn time_until_reset_ms(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let state = self.state.lock();
        let elapsed = now_ms.saturating_sub(state.window_start_ms);
        self.window_ms.saturating_sub(elapsed)
    }

    #[inline]
    fn roll_window(&self, state: &mut WindowState, now_ms: u64) {
        if now_ms.saturating_sub(state.window_start_ms) >= self.window_ms {
            debug!(
                "Fixed window reset ({} admitted in previous window)",
                state.count
            );
            state.window_start_ms = now_ms;
            state.count = 0;
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn try_acquire(&self) -> bool {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.roll_window(&mut state, now_ms);

        let admitted = state.count < self.limit;
        if admitted {
            state.count += 1;
        }
        state.counters.record(admitted)
    }

    fn available(&self) -> u64 {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.roll_window(&mut state, now_ms);
        self.limit - state.count
    }

    fn metrics(&self) -> RateLimiterMetrics {
        let now_ms = self.clock.now_ms();
        let mut state = self.state.lock();
        self.roll_window(&mut state, now_ms);
        let available = self.limit - state.count;
        state
            .counters
            .snapshot(Algorithm::FixedWindow, available, self.limit)
    }

    fn reset(&self) {
        let now_ms = self.clock.now_ms();
        *self.state.lock() = WindowState::new(now_ms);
    }

    fn algorithm(&self) -> Algorithm {
        Algorithm::FixedWindow
    }
}

impl std::fmt::Debug for FixedWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FixedWindowLimiter")
            .field("limit", &self.limit)
            .field("window_ms", &self.window_ms)
            .field("count", &state.count)
            .field("window_start_ms", &state.window_start_ms)
            .finish()
    }
}
