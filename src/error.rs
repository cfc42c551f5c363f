//! # Error Types
//!
//! Each concern gets its own error enum so callers can tell the failure
//! classes apart without string matching:
//!
//! ```text
//!     ConfigError ──► bad constructor arguments (fail fast, never clamped)
//!     IdError     ──► clock went backwards / timestamp space exhausted
//!     StoreError  ──► the shared store could not serve the request
//!     LockError   ──► lease acquisition with a watchdog
//! ```
//!
//! Rejection by a rate limiter and loss of a lease are *not* errors. They are
//! the `false` branch of `try_acquire` / `unlock`.

use thiserror::Error;

/// Invalid configuration detected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Machine ID does not fit in the 10-bit machine field.
    #[error("machine id {machine_id} out of range (0..={max})")]
    MachineIdOutOfRange {
        /// Rejected machine ID.
        machine_id: u64,
        /// Largest accepted machine ID.
        max: u64,
    },

    /// Custom epoch lies in the future relative to the clock.
    #[error("epoch {epoch_ms}ms is ahead of the clock ({now_ms}ms)")]
    EpochInFuture {
        /// Configured epoch.
        epoch_ms: u64,
        /// Clock reading at construction.
        now_ms: u64,
    },

    /// A numeric parameter that must be positive was zero.
    #[error("{field} must be greater than 0")]
    Zero {
        /// Name of the offending parameter.
        field: &'static str,
    },

    /// Parameters are individually valid but inconsistent with each other.
    #[error("invalid configuration: {0}")]
    Inconsistent(&'static str),
}

/// Failure to mint an identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The clock reported a time earlier than the last minted timestamp.
    #[error("clock moved backwards: last id at {last_ms}ms, clock now {now_ms}ms")]
    ClockRolledBack {
        /// Timestamp of the most recently minted ID.
        last_ms: u64,
        /// Current clock reading.
        now_ms: u64,
    },

    /// The timestamp delta no longer fits in the 41-bit field.
    #[error("timestamp delta {delta_ms}ms exceeds the 41-bit id space")]
    TimestampOverflow {
        /// Milliseconds since the configured epoch.
        delta_ms: u64,
    },
}

/// Failure talking to the shared atomic store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The key holds a value of a different kind than the operation expects.
    #[error("key '{key}' holds the wrong kind of value")]
    WrongType {
        /// Key that was accessed.
        key: String,
    },

    /// `INCR` was applied to a value that is not a decimal integer.
    #[error("value at '{key}' is not an integer or is out of range")]
    NotAnInteger {
        /// Key that was accessed.
        key: String,
    },

    /// A bit offset beyond the largest addressable bit (2^32 - 1).
    #[error("bit offset {offset} is out of range")]
    OffsetOutOfRange {
        /// Rejected offset.
        offset: u64,
    },
}

/// Errors from lease acquisition that starts a renewal watchdog.
#[derive(Error, Debug)]
pub enum LockError {
    /// The store failed while acquiring.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The renewal thread could not be spawned.
    #[error("failed to spawn lease watchdog: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
