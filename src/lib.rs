//! # Warden - Coordination Primitives for Rust
//!
//! Building blocks for services that run as many processes against one
//! shared key-value store:
//!
//! - **[`IdGenerator`]** - 64-bit snowflake IDs minted locally, no coordination
//! - **Rate limiters** - fixed window, sliding window, leaky bucket and token
//!   bucket behind one [`RateLimiter`] trait
//! - **[`DistributedLock`]** - lease-based mutual exclusion with a renewal
//!   watchdog
//! - **[`BloomFilter`]** - probabilistic membership whose bits live in the store
//! - **[`StoreSequence`]** - dense counters backed by atomic `INCR`
//!
//! ## Architecture Overview
//!
//! ```text
//!        local state only                     shared through the store
//!     ┌──────────────────────┐        ┌──────────────────────────────────┐
//!     │ IdGenerator          │        │ DistributedLock ─► LeaseGuard    │
//!     │ FixedWindowLimiter   │        │ BloomFilter                      │
//!     │ SlidingWindowLimiter │        │ StoreSequence                    │
//!     │ LeakyBucketLimiter   │        └───────────────┬──────────────────┘
//!     │ TokenBucketLimiter   │                        │
//!     └──────────┬───────────┘              ┌─────────▼─────────┐
//!                │                          │ AtomicStore trait │
//!          ┌─────▼─────┐                    │  └─ MemoryStore   │
//!          │   Clock   │◄───────────────────┤  └─ (your redis)  │
//!          └───────────┘                    └───────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ### Identifiers
//!
//! ```rust
//! use warden::IdGenerator;
//!
//! let generator = IdGenerator::new(42).unwrap();
//! let id = generator.next_id().unwrap();
//! assert_eq!(generator.decompose(id).machine_id, 42);
//! ```
//!
//! ### Rate Limiting
//!
//! ```rust
//! use warden::{RateLimiter, RateLimiterBuilder};
//!
//! let limiter = RateLimiterBuilder::new()
//!     .sliding_window()
//!     .limit(100)
//!     .window_ms(60_000)
//!     .build();
//!
//! if limiter.try_acquire() {
//!     // handle the request
//! } else {
//!     // 429 Too Many Requests
//! }
//! ```
//!
//! ### Locking
//!
//! ```rust
//! use std::sync::Arc;
//! use warden::{DistributedLock, HolderToken, MemoryStore};
//!
//! let store = Arc::new(MemoryStore::new());
//! let lock = DistributedLock::new(store, "report:daily");
//!
//! if let Some(guard) = lock.lock_with_watchdog(HolderToken::new()).unwrap() {
//!     // critical section; the lease is renewed in the background
//!     let still_held = guard.unlock().unwrap();
//!     assert!(still_held);
//! }
//! ```
//!
//! ## Thread Safety
//!
//! Every type is `Send + Sync` and meant to be shared via `Arc`. Local
//! primitives hold one short `parking_lot` mutex per call; store-backed
//! primitives rely on the store's per-key atomicity.
//!
//! ## Logging
//!
//! Events are emitted through `tracing`. The crate never installs a
//! subscriber.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    missing_debug_implementations
)]
#![forbid(unsafe_op_in_unsafe_fn)]

mod bloom;
mod clock;
mod error;
mod id;
mod lock;
mod rate_limiter;
mod store;
mod utils;

pub use bloom::{BloomConfig, BloomFilter, DEFAULT_BIT_SIZE, DEFAULT_HASH_COUNT, MAX_BIT_SIZE};
pub use clock::{current_time_ms, Clock, ManualClock, MonotonicClock, SharedClock, SystemClock};
pub use error::{ConfigError, IdError, LockError, StoreError, StoreResult};
pub use id::{
    decompose_with_epoch, IdGenerator, IdGeneratorConfig, IdParts, StoreSequence,
    DEFAULT_EPOCH_MS, MACHINE_ID_BITS, MAX_MACHINE_ID, MAX_SEQUENCE, SEQUENCE_BITS,
    TIMESTAMP_BITS,
};
pub use lock::{DistributedLock, HolderToken, LeaseGuard, LockConfig, DEFAULT_LEASE_MS};
pub use rate_limiter::{
    Algorithm, FixedWindowLimiter, HealthStatus, LeakyBucketLimiter, RateLimiter,
    RateLimiterConfig, RateLimiterMetrics, SlidingWindowLimiter, TokenBucketLimiter,
};
pub use store::{AtomicStore, KeyTtl, MemoryStore};
pub use utils::cpu_relax;

/// A type-erased rate limiter in an `Arc` for sharing across threads.
///
/// # Example
/// ```rust
/// use warden::{RateLimiterBuilder, SharedRateLimiter};
/// use std::sync::Arc;
///
/// let shared: SharedRateLimiter = Arc::from(RateLimiterBuilder::new().build());
///
/// let limiter = shared.clone();
/// std::thread::spawn(move || {
///     limiter.try_acquire();
/// });
/// ```
pub type SharedRateLimiter = std::sync::Arc<dyn RateLimiter>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum supported Rust version.
pub const MSRV: &str = "1.70.0";

/// Prelude module for convenient imports.
///
/// ```rust
/// use warden::prelude::*;
/// ```
pub mod prelude {
    //! Common imports for typical use.
    //!
    //! # Example
    //! ```rust
    //! use warden::prelude::*;
    //! use std::sync::Arc;
    //!
    //! let limiter = RateLimiterBuilder::new().token_bucket().build();
    //! let store = Arc::new(MemoryStore::new());
    //! let lock = DistributedLock::new(store, "job");
    //! let status = HealthStatus::Healthy;
    //! ```

    pub use crate::{
        Algorithm, AtomicStore, BloomConfig, BloomFilter, Clock, ConfigError, DistributedLock,
        HealthStatus, HolderToken, IdGenerator, LockConfig, MemoryStore, RateLimiter,
        RateLimiterBuilder, RateLimiterConfig, RateLimiterMetrics, SharedRateLimiter,
        StoreError, StoreSequence,
    };
}

/// Builder for any of the four rate limiters.
///
/// Select an algorithm, then set its permits (`limit` / `capacity`), its
/// period (`window_ms` / `interval_ms`) and, for buckets, its `rate`.
///
/// # Example
///
/// ```rust
/// use warden::{Algorithm, RateLimiterBuilder};
///
/// // 100 requests per minute, smoothed
/// let limiter = RateLimiterBuilder::new()
///     .leaky_bucket()
///     .capacity(100)
///     .rate(100)
///     .interval_ms(60_000)
///     .build();
/// assert_eq!(limiter.algorithm(), Algorithm::LeakyBucket);
///
/// // Or use try_build() for error handling
/// let result = RateLimiterBuilder::new().capacity(0).try_build();
/// assert!(result.is_err());
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiterBuilder {
    algorithm: Algorithm,
    permits: u64,
    rate: u64,
    period_ms: u64,
    clock: Option<SharedClock>,
}

impl RateLimiterBuilder {
    /// Builder with the default configuration: a token bucket of 50 tokens
    /// refilling 10 per second.
    pub fn new() -> Self {
        Self::from_config(RateLimiterConfig::default())
    }

    /// Builder initialised from an existing configuration.
    pub fn from_config(config: RateLimiterConfig) -> Self {
        let (permits, rate, period_ms) = match config {
            RateLimiterConfig::FixedWindow { limit, window_ms }
            | RateLimiterConfig::SlidingWindow { limit, window_ms } => (limit, limit, window_ms),
            RateLimiterConfig::LeakyBucket {
                capacity,
                rate,
                interval_ms,
            }
            | RateLimiterConfig::TokenBucket {
                capacity,
                rate,
                interval_ms,
            } => (capacity, rate, interval_ms),
        };
        Self {
            algorithm: config.algorithm(),
            permits,
            rate,
            period_ms,
            clock: None,
        }
    }

    /// Selects the fixed window algorithm.
    pub fn fixed_window(self) -> Self {
        self.algorithm(Algorithm::FixedWindow)
    }

    /// Selects the sliding window algorithm.
    pub fn sliding_window(self) -> Self {
        self.algorithm(Algorithm::SlidingWindow)
    }

    /// Selects the leaky bucket algorithm.
    pub fn leaky_bucket(self) -> Self {
        self.algorithm(Algorithm::LeakyBucket)
    }

    /// Selects the token bucket algorithm.
    pub fn token_bucket(self) -> Self {
        self.algorithm(Algorithm::TokenBucket)
    }

    /// Selects the algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Admissions per window (windows) or bucket size (buckets).
    pub fn limit(mut self, permits: u64) -> Self {
        self.permits = permits;
        self
    }

    /// Same as [`limit`](Self::limit), named for buckets.
    pub fn capacity(self, permits: u64) -> Self {
        self.limit(permits)
    }

    /// Units drained or refilled per interval. Ignored by windows.
    pub fn rate(mut self, rate: u64) -> Self {
        self.rate = rate;
        self
    }

    /// Window length (windows) or rate interval (buckets).
    pub fn window_ms(mut self, ms: u64) -> Self {
        self.period_ms = ms;
        self
    }

    /// Same as [`window_ms`](Self::window_ms), named for buckets.
    pub fn interval_ms(self, ms: u64) -> Self {
        self.window_ms(ms)
    }

    /// Reads time from `clock` instead of the process's monotonic clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Configuration the builder currently describes.
    pub fn config(&self) -> RateLimiterConfig {
        match self.algorithm {
            Algorithm::FixedWindow => RateLimiterConfig::fixed_window(self.permits, self.period_ms),
            Algorithm::SlidingWindow => {
                RateLimiterConfig::sliding_window(self.permits, self.period_ms)
            }
            Algorithm::LeakyBucket => {
                RateLimiterConfig::leaky_bucket(self.permits, self.rate, self.period_ms)
            }
            Algorithm::TokenBucket => {
                RateLimiterConfig::token_bucket(self.permits, self.rate, self.period_ms)
            }
        }
    }

    /// Builds the rate limiter with the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid (a zero limit, capacity, rate,
    /// window or interval). Use `try_build()` to handle errors.
    pub fn build(self) -> Box<dyn RateLimiter> {
        match self.try_build() {
            Ok(limiter) => limiter,
            Err(e) => panic!("Invalid rate limiter configuration: {}", e),
        }
    }

    /// Attempts to build the rate limiter, returning an error if invalid.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from validation.
    pub fn try_build(self) -> Result<Box<dyn RateLimiter>, ConfigError> {
        let config = self.config();
        let clock = self.clock.unwrap_or_else(|| std::sync::Arc::new(MonotonicClock));
        rate_limiter::from_config(config, clock)
    }
}

impl Default for RateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_builder_default() {
        let limiter = RateLimiterBuilder::default().build();
        assert_eq!(limiter.algorithm(), Algorithm::TokenBucket);
        assert_eq!(limiter.available(), 50);
    }

    #[test]
    fn test_builder_chain() {
        let clock = ManualClock::new(0);
        let limiter = RateLimiterBuilder::new()
            .fixed_window()
            .limit(10)
            .window_ms(1000)
            .clock(Arc::new(clock.clone()))
            .build();

        let admitted = (0..20).filter(|_| limiter.try_acquire()).count();
        assert_eq!(admitted, 10);

        clock.advance(1000);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_builder_validation() {
        let result = RateLimiterBuilder::new().capacity(0).try_build();
        assert_eq!(result.unwrap_err(), ConfigError::Zero { field: "capacity" });

        let result = RateLimiterBuilder::new().sliding_window().window_ms(0).try_build();
        assert_eq!(result.unwrap_err(), ConfigError::Zero { field: "window_ms" });
    }

    #[test]
    #[should_panic(expected = "Invalid rate limiter configuration")]
    fn test_build_panics_on_invalid() {
        let _ = RateLimiterBuilder::new().rate(0).build();
    }

    #[test]
    fn test_builder_round_trips_config() {
        let config = RateLimiterConfig::leaky_bucket(7, 3, 250);
        assert_eq!(RateLimiterBuilder::from_config(config).config(), config);
    }

    #[test]
    fn test_thread_safety() {
        let limiter: SharedRateLimiter = Arc::from(
            RateLimiterBuilder::new()
                .token_bucket()
                .capacity(1000)
                .rate(1)
                .interval_ms(60_000)
                .build(),
        );

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || (0..200).filter(|_| limiter.try_acquire()).count())
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // At most one token refills during the test
        assert!((1000..=1001).contains(&total));
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _limiter = RateLimiterBuilder::new().build();
        let _config = RateLimiterConfig::default();
        let _status = HealthStatus::Healthy;
        let _token = HolderToken::new();
    }

    #[test]
    fn test_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(MSRV, "1.70.0");
    }
}
