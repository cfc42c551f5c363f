//! # Rate Limiter Metrics
//!
//! Snapshot of one limiter's admission history and current headroom.
//!
//! ```text
//!     ┌─────────────────────────────────────┐
//!     │  Success Rate: 85%                  │
//!     │  ▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓▓░░░  (85/100)     │
//!     │                                     │
//!     │  Available: 3/10                    │
//!     │  Health: Degraded                   │
//!     └─────────────────────────────────────┘
//! ```

use super::Algorithm;
use std::fmt;

/// Consecutive rejections above which pressure counts as sustained.
const SUSTAINED_REJECTIONS: u64 = 10;

/// Rejection rate above which pressure counts as sustained.
const SUSTAINED_REJECTION_RATE: f64 = 0.3;

/// Admission counters kept inside each limiter's guarded state.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    acquired: u64,
    rejected: u64,
    consecutive_rejections: u64,
}

impl Counters {
    #[inline]
    pub(crate) fn on_acquisition(&mut self) {
        self.acquired += 1;
        self.consecutive_rejections = 0;
    }

    #[inline]
    pub(crate) fn on_rejection(&mut self) {
        self.rejected += 1;
        self.consecutive_rejections += 1;
    }

    /// Records the outcome and passes it through.
    #[inline]
    pub(crate) fn record(&mut self, admitted: bool) -> bool {
        if admitted {
            self.on_acquisition();
        } else {
            self.on_rejection();
        }
        admitted
    }

    pub(crate) fn snapshot(
        &self,
        algorithm: Algorithm,
        available: u64,
        capacity: u64,
    ) -> RateLimiterMetrics {
        RateLimiterMetrics {
            algorithm,
            total_acquired: self.acquired,
            total_rejected: self.rejected,
            consecutive_rejections: self.consecutive_rejections,
            available,
            capacity,
        }
    }
}

/// Point-in-time metrics for one rate limiter.
///
/// ## Example
///
/// ```rust
/// use warden::{RateLimiter, TokenBucketLimiter};
///
/// let limiter = TokenBucketLimiter::new(2, 1, 1000).unwrap();
/// limiter.try_acquire();
/// limiter.try_acquire();
/// limiter.try_acquire();
///
/// let metrics = limiter.metrics();
/// assert_eq!(metrics.total_acquired, 2);
/// assert_eq!(metrics.total_rejected, 1);
/// assert!(metrics.is_under_pressure());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimiterMetrics {
    /// Algorithm of the limiter.
    pub algorithm: Algorithm,

    /// Admitted calls since construction or the last reset.
    pub total_acquired: u64,

    /// Rejected calls since construction or the last reset.
    pub total_rejected: u64,

    /// Rejections since the last admission.
    /// Values above 10 indicate sustained pressure.
    pub consecutive_rejections: u64,

    /// Permits that would be admitted right now.
    pub available: u64,

    /// Maximum permits available at once (limit or capacity).
    pub capacity: u64,
}

impl RateLimiterMetrics {
    /// Fraction of calls admitted, 1.0 when nothing was attempted yet.
    #[inline]
    pub fn success_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            1.0
        } else {
            self.total_acquired as f64 / total as f64
        }
    }

    /// Fraction of calls rejected.
    #[inline]
    pub fn rejection_rate(&self) -> f64 {
        1.0 - self.success_rate()
    }

    /// Admitted plus rejected calls.
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_acquired + self.total_rejected
    }

    /// Share of the capacity currently in use (0.0 = all available).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            1.0 - (self.available as f64 / self.capacity as f64)
        }
    }

    /// Remaining capacity as a percentage.
    #[inline]
    pub fn availability_percentage(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            (self.available as f64 / self.capacity as f64) * 100.0
        }
    }

    /// Less than half the calls admitted, or nothing available right now.
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.success_rate() < 0.5 || self.available == 0
    }

    /// A long rejection streak or a high overall rejection rate.
    #[inline]
    pub fn is_under_sustained_pressure(&self) -> bool {
        self.consecutive_rejections > SUSTAINED_REJECTIONS
            || self.rejection_rate() > SUSTAINED_REJECTION_RATE
    }

    /// Three-level health derived from the pressure indicators.
    pub fn health_status(&self) -> HealthStatus {
        if self.is_under_sustained_pressure() {
            HealthStatus::Critical
        } else if self.is_under_pressure() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Multi-line report suitable for logs.
    ///
    /// ```text
    /// RateLimiter Metrics (token bucket):
    /// ├─ Performance:
    /// │  ├─ Success Rate: 85.50%
    /// │  └─ Rejection Rate: 14.50%
    /// ├─ Capacity:
    /// │  ├─ Available: 7/10
    /// │  └─ Utilization: 30.00%
    /// └─ Health:
    ///    └─ Status: Healthy
    /// ```
    pub fn summary(&self) -> String {
        format!(
            "RateLimiter Metrics ({}):\n\
             ├─ Performance:\n\
             │  ├─ Success Rate: {:.2}%\n\
             │  └─ Rejection Rate: {:.2}%\n\
             ├─ Capacity:\n\
             │  ├─ Available: {}/{}\n\
             │  └─ Utilization: {:.2}%\n\
             ├─ Counters:\n\
             │  ├─ Total Acquired: {}\n\
             │  ├─ Total Rejected: {}\n\
             │  └─ Consecutive Rejections: {}\n\
             └─ Health:\n\
                ├─ Status: {}\n\
                └─ Under Sustained Pressure: {}",
            self.algorithm,
            self.success_rate() * 100.0,
            self.rejection_rate() * 100.0,
            self.available,
            self.capacity,
            self.utilization() * 100.0,
            self.total_acquired,
            self.total_rejected,
            self.consecutive_rejections,
            self.health_status(),
            self.is_under_sustained_pressure()
        )
    }
}

impl fmt::Display for RateLimiterMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Health derived from [`RateLimiterMetrics`].
///
/// ```text
///     Healthy ──────► admitting normally
///        │
///     Degraded ─────► momentarily exhausted or mostly rejecting
///        │
///     Critical ─────► long rejection streak or >30% rejected overall
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Admitting normally.
    Healthy,
    /// Under pressure but recovering as load drops.
    Degraded,
    /// Demand consistently exceeds the configured rate.
    Critical,
}

impl HealthStatus {
    /// Anything other than [`HealthStatus::Healthy`].
    pub fn is_unhealthy(&self) -> bool {
        !matches!(self, Self::Healthy)
    }

    /// Operator guidance for the status.
    pub fn suggested_action(&self) -> &'static str {
        match self {
            Self::Healthy => "No action needed",
            Self::Degraded => "Monitor closely, consider raising the limit",
            Self::Critical => "Immediate action required: raise the limit or shed load",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("Healthy"),
            Self::Degraded => f.write_str("Degraded"),
            Self::Critical => f.write_str("Critical"),
        }
    }
}
