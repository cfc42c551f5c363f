//! # Clock Sources
//!
//! Every primitive in this crate reads time through the [`Clock`] trait so
//! that tests can drive it with simulated time and so the ID generator can
//! observe a clock that really does move backwards.
//!
//! ```text
//!     SystemClock ────► raw wall clock, may regress (NTP step, manual change)
//!     MonotonicClock ─► wall-clock epoch captured once, advanced by Instant
//!     ManualClock ────► simulated, advanced explicitly by the caller
//! ```
//!
//! Rate limiters and the in-memory store default to [`MonotonicClock`]; the
//! ID generator defaults to [`SystemClock`] because it must notice rollback.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

// Wall-clock epoch at first use, paired with the Instant it was captured at.
static START_TIME_BASE: OnceLock<(Instant, u64)> = OnceLock::new();

/// A millisecond timestamp source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the UNIX epoch.
    fn now_ms(&self) -> u64;
}

/// Shared, type-erased clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Reads `SystemTime` directly on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Wall-clock time that never moves backwards within the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        current_time_ms()
    }
}

/// Returns the current time in milliseconds since UNIX epoch.
///
/// The epoch offset is sampled once; after that the value advances with a
/// monotonic `Instant`, so a system clock jump does not affect it.
///
/// # Example
///
/// ```rust
/// use warden::current_time_ms;
///
/// let a = current_time_ms();
/// let b = current_time_ms();
/// assert!(b >= a);
/// ```
#[inline(always)]
pub fn current_time_ms() -> u64 {
    let (start, base_ms) = START_TIME_BASE.get_or_init(|| {
        let epoch_ms = SystemClock.now_ms();
        (Instant::now(), epoch_ms)
    });
    base_ms.saturating_add(start.elapsed().as_millis() as u64)
}

/// Simulated clock for tests and simulations.
///
/// Clones share the same underlying time, so a test can keep one handle and
/// pass another to the component under test.
///
/// ```rust
/// use warden::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// let handle = clock.clone();
/// clock.advance(250);
/// assert_eq!(handle.now_ms(), 1_250);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    /// Moves time forward by `ms`.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Sets the absolute time. Setting an earlier value simulates rollback.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_monotonicity() {
        let mut last = 0;
        for _ in 0..10 {
            let ms = current_time_ms();
            assert!(ms >= last);
            last = ms;
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    #[test]
    fn test_monotonic_tracks_wall_clock() {
        let wall = SystemClock.now_ms();
        let mono = MonotonicClock.now_ms();
        // Same epoch, so they agree to within a generous margin
        assert!(wall.abs_diff(mono) < 5_000);
    }

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(10);
        let other = clock.clone();

        clock.advance(5);
        assert_eq!(other.now_ms(), 15);

        other.set(3);
        assert_eq!(clock.now_ms(), 3);
    }

    #[test]
    fn test_shared_clock_object() {
        let clock: SharedClock = Arc::new(ManualClock::new(42));
        assert_eq!(clock.now_ms(), 42);
    }
}
