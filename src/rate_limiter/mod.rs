//! # Rate Limiters
//!
//! Four admission algorithms behind one [`RateLimiter`] trait.
//!
//! ```text
//!     rate_limiter/
//!     ├── mod.rs             (trait and algorithm selector)
//!     ├── config.rs          (per-algorithm parameters and validation)
//!     ├── fixed_window.rs    (counter reset at window boundaries)
//!     ├── sliding_window.rs  (exact trailing-window log)
//!     ├── leaky_bucket.rs    (constant drain, no bursts beyond capacity)
//!     ├── token_bucket.rs    (constant refill, bursts up to capacity)
//!     └── metrics.rs         (admission statistics and health)
//! ```
//!
//! Every decision runs as one exclusive section over a single state value
//! (counter plus timestamp, or level plus timestamp), so the fields can never
//! be observed half-updated. The section does no I/O and no allocation on the
//! common path.
//!
//! A call is either admitted and accounted for, or rejected and leaves the
//! limiter's state (apart from its rejection counters) untouched.

mod config;
mod fixed_window;
mod leaky_bucket;
mod metrics;
mod sliding_window;
mod token_bucket;

pub use config::RateLimiterConfig;
pub use fixed_window::FixedWindowLimiter;
pub use leaky_bucket::LeakyBucketLimiter;
pub use metrics::{HealthStatus, RateLimiterMetrics};
pub use sliding_window::SlidingWindowLimiter;
pub use token_bucket::TokenBucketLimiter;

use crate::clock::SharedClock;
use crate::error::ConfigError;
use std::fmt;

/// Admission algorithm of a limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// [`FixedWindowLimiter`]
    FixedWindow,
    /// [`SlidingWindowLimiter`]
    SlidingWindow,
    /// [`LeakyBucketLimiter`]
    LeakyBucket,
    /// [`TokenBucketLimiter`]
    TokenBucket,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FixedWindow => "fixed window",
            Self::SlidingWindow => "sliding window",
            Self::LeakyBucket => "leaky bucket",
            Self::TokenBucket => "token bucket",
        })
    }
}

/// Common interface of every limiter.
///
/// Implementations are shared across threads by reference or `Arc`; every
/// method takes `&self`.
///
/// ```rust
/// use warden::{FixedWindowLimiter, RateLimiter, TokenBucketLimiter};
///
/// let limiters: Vec<Box<dyn RateLimiter>> = vec![
///     Box::new(FixedWindowLimiter::new(5, 1000).unwrap()),
///     Box::new(TokenBucketLimiter::new(5, 1, 1000).unwrap()),
/// ];
/// for limiter in &limiters {
///     assert!(limiter.try_acquire());
/// }
/// ```
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Admits one call if the rate allows it. Never blocks.
    fn try_acquire(&self) -> bool;

    /// Permits that would be admitted right now.
    fn available(&self) -> u64;

    /// Snapshot of the admission statistics.
    fn metrics(&self) -> RateLimiterMetrics;

    /// Restores the initial state and zeroes the statistics.
    fn reset(&self);

    /// Algorithm implemented by this limiter.
    fn algorithm(&self) -> Algorithm;
}

/// Builds the limiter `config` selects, reading time from `clock`.
pub(crate) fn from_config(
    config: RateLimiterConfig,
    clock: SharedClock,
) -> Result<Box<dyn RateLimiter>, ConfigError> {
    let limiter: Box<dyn RateLimiter> = match config {
        RateLimiterConfig::FixedWindow { limit, window_ms } => {
            Box::new(FixedWindowLimiter::with_clock(limit, window_ms, clock)?)
        }
        RateLimiterConfig::SlidingWindow { limit, window_ms } => {
            Box::new(SlidingWindowLimiter::with_clock(limit, window_ms, clock)?)
        }
        RateLimiterConfig::LeakyBucket {
            capacity,
            rate,
            interval_ms,
        } => Box::new(LeakyBucketLimiter::with_clock(capacity, rate, interval_ms, clock)?),
        RateLimiterConfig::TokenBucket {
            capacity,
            rate,
            interval_ms,
        } => Box::new(TokenBucketLimiter::with_clock(capacity, rate, interval_ms, clock)?),
    };
    Ok(limiter)
}
