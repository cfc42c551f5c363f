//! # Rate Limiter Configuration
//!
//! One variant per algorithm, each carrying only the parameters that
//! algorithm reads.
//!
//! ```text
//!     Windows:  limit permits per window_ms
//!     ┌──────────────────────────────┐
//!     │ limit: 10   window_ms: 1000  │ ──► at most 10 admissions per window
//!     └──────────────────────────────┘
//!
//!     Buckets:  capacity, drained/refilled at rate per interval_ms
//!     ┌──────────────────────────────┐
//!     │ capacity: 20                 │ ← burst limit
//!     │ rate: 10  interval_ms: 1000  │ ← 10 permits per second sustained
//!     └──────────────────────────────┘
//! ```
//!
//! Rates are exact: `rate = 1, interval_ms = 1` is one permit per
//! millisecond, `rate = 3, interval_ms = 1000` is three per second.

use super::Algorithm;
use crate::error::ConfigError;

/// Configuration for one rate limiter instance.
///
/// ## Examples
///
/// ```rust
/// use warden::RateLimiterConfig;
///
/// // 100 per minute in fixed buckets
/// let config = RateLimiterConfig::fixed_window(100, 60_000);
///
/// // 50 per second sustained, bursts up to 100
/// let config = RateLimiterConfig::per_second(50);
///
/// // Queue-like smoothing: 10 in flight, drains 5 per second
/// let config = RateLimiterConfig::leaky_bucket(10, 5, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimiterConfig {
    /// Counter reset at every window boundary.
    FixedWindow {
        /// Admissions per window.
        limit: u64,
        /// Window length.
        window_ms: u64,
    },

    /// Exact count over the trailing window.
    SlidingWindow {
        /// Admissions per trailing window.
        limit: u64,
        /// Window length.
        window_ms: u64,
    },

    /// Admissions fill the bucket, which drains at a constant rate.
    LeakyBucket {
        /// Units the bucket holds before rejecting.
        capacity: u64,
        /// Units drained per `interval_ms`.
        rate: u64,
        /// Period `rate` is expressed over.
        interval_ms: u64,
    },

    /// Admissions spend tokens, which refill at a constant rate.
    TokenBucket {
        /// Maximum tokens (burst size). The bucket starts full.
        capacity: u64,
        /// Tokens added per `interval_ms`.
        rate: u64,
        /// Period `rate` is expressed over.
        interval_ms: u64,
    },
}

impl Default for RateLimiterConfig {
    /// Token bucket holding 50 tokens, refilling 10 per second.
    fn default() -> Self {
        Self::token_bucket(50, 10, 1000)
    }
}

impl RateLimiterConfig {
    /// `limit` admissions per fixed `window_ms`.
    pub fn fixed_window(limit: u64, window_ms: u64) -> Self {
        Self::FixedWindow { limit, window_ms }
    }

    /// `limit` admissions in any trailing `window_ms`.
    pub fn sliding_window(limit: u64, window_ms: u64) -> Self {
        Self::SlidingWindow { limit, window_ms }
    }

    /// Leaky bucket of `capacity` draining `rate` units per `interval_ms`.
    pub fn leaky_bucket(capacity: u64, rate: u64, interval_ms: u64) -> Self {
        Self::LeakyBucket {
            capacity,
            rate,
            interval_ms,
        }
    }

    /// Token bucket of `capacity` refilling `rate` tokens per `interval_ms`.
    pub fn token_bucket(capacity: u64, rate: u64, interval_ms: u64) -> Self {
        Self::TokenBucket {
            capacity,
            rate,
            interval_ms,
        }
    }

    /// Token bucket sustaining `requests_per_second`, bursting to twice that.
    ///
    /// ```rust
    /// use warden::RateLimiterConfig;
    ///
    /// let config = RateLimiterConfig::per_second(100);
    /// assert_eq!(config.capacity(), 200);
    /// assert_eq!(config.effective_rate_per_second(), 100.0);
    /// ```
    pub fn per_second(requests_per_second: u64) -> Self {
        Self::token_bucket(requests_per_second.saturating_mul(2), requests_per_second, 1000)
    }

    /// Token bucket for minute-based quotas; bursts up to the full quota.
    pub fn per_minute(requests_per_minute: u64) -> Self {
        Self::token_bucket(requests_per_minute, requests_per_minute, 60_000)
    }

    /// Sets a bucket's capacity to `multiplier` times its rate.
    ///
    /// Window variants are returned unchanged.
    ///
    /// ```rust
    /// use warden::RateLimiterConfig;
    ///
    /// let config = RateLimiterConfig::per_second(10).with_burst_multiplier(5);
    /// assert_eq!(config.capacity(), 50);
    /// ```
    pub fn with_burst_multiplier(self, multiplier: u64) -> Self {
        match self {
            Self::LeakyBucket { rate, interval_ms, .. } => {
                Self::leaky_bucket(rate.saturating_mul(multiplier), rate, interval_ms)
            }
            Self::TokenBucket { rate, interval_ms, .. } => {
                Self::token_bucket(rate.saturating_mul(multiplier), rate, interval_ms)
            }
            window => window,
        }
    }

    /// Algorithm this configuration selects.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::FixedWindow { .. } => Algorithm::FixedWindow,
            Self::SlidingWindow { .. } => Algorithm::SlidingWindow,
            Self::LeakyBucket { .. } => Algorithm::LeakyBucket,
            Self::TokenBucket { .. } => Algorithm::TokenBucket,
        }
    }

    /// Maximum permits available at once (`limit` or `capacity`).
    pub fn capacity(&self) -> u64 {
        match *self {
            Self::FixedWindow { limit, .. } | Self::SlidingWindow { limit, .. } => limit,
            Self::LeakyBucket { capacity, .. } | Self::TokenBucket { capacity, .. } => capacity,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Zero`] for a zero limit, window, capacity, rate or
    ///   interval
    /// - [`ConfigError::Inconsistent`] if `capacity * interval_ms` does not
    ///   fit the fixed-point bucket level
    ///
    /// ```rust
    /// use warden::RateLimiterConfig;
    ///
    /// assert!(RateLimiterConfig::fixed_window(0, 1000).validate().is_err());
    /// assert!(RateLimiterConfig::token_bucket(10, 0, 1000).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::FixedWindow { limit, window_ms } | Self::SlidingWindow { limit, window_ms } => {
                require_positive("limit", limit)?;
                require_positive("window_ms", window_ms)
            }
            Self::LeakyBucket {
                capacity,
                rate,
                interval_ms,
            }
            | Self::TokenBucket {
                capacity,
                rate,
                interval_ms,
            } => {
                require_positive("capacity", capacity)?;
                require_positive("rate", rate)?;
                require_positive("interval_ms", interval_ms)?;
                if capacity.checked_mul(interval_ms).is_none() {
                    return Err(ConfigError::Inconsistent(
                        "capacity * interval_ms overflows the bucket level",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Sustained admissions per second.
    ///
    /// ```rust
    /// use warden::RateLimiterConfig;
    ///
    /// assert_eq!(RateLimiterConfig::token_bucket(100, 50, 500).effective_rate_per_second(), 100.0);
    /// assert_eq!(RateLimiterConfig::fixed_window(120, 60_000).effective_rate_per_second(), 2.0);
    /// ```
    pub fn effective_rate_per_second(&self) -> f64 {
        let (permits, period_ms) = match *self {
            Self::FixedWindow { limit, window_ms } | Self::SlidingWindow { limit, window_ms } => {
                (limit, window_ms)
            }
            Self::LeakyBucket { rate, interval_ms, .. }
            | Self::TokenBucket { rate, interval_ms, .. } => (rate, interval_ms),
        };
        if period_ms == 0 {
            0.0
        } else {
            (permits as f64 * 1000.0) / period_ms as f64
        }
    }
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { field })
    } else {
        Ok(())
    }
}
