//! # Snowflake ID Generator
//!
//! Produces 64-bit identifiers that are unique per generator instance and
//! roughly ordered by time, without talking to anyone else.
//!
//! ```text
//!     Bit layout (most significant first):
//!
//!     ┌──┬──────────────────────────────┬────────────┬──────────────┐
//!     │0 │ timestamp delta (41 bits)    │ machine    │ sequence     │
//!     │  │ now_ms - epoch_ms            │ (10 bits)  │ (12 bits)    │
//!     └──┴──────────────────────────────┴────────────┴──────────────┘
//! ```
//!
//! `sequence` and `last_timestamp` must move together, so each call runs one
//! short exclusive section. No I/O happens inside it; the only wait is the
//! spin for the next millisecond when 4096 IDs were minted in the current one.

use crate::clock::{SharedClock, SystemClock};
use crate::error::{ConfigError, IdError};
use crate::utils::Backoff;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default epoch: 2021-01-01T00:00:00Z in milliseconds.
pub const DEFAULT_EPOCH_MS: u64 = 1_609_459_200_000;

/// Width of the machine ID field.
pub const MACHINE_ID_BITS: u32 = 10;

/// Width of the per-millisecond sequence field.
pub const SEQUENCE_BITS: u32 = 12;

/// Width of the timestamp delta field.
pub const TIMESTAMP_BITS: u32 = 41;

/// Largest machine ID that fits in the layout.
pub const MAX_MACHINE_ID: u64 = (1 << MACHINE_ID_BITS) - 1;

/// Largest sequence value within one millisecond.
pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

const MAX_TIMESTAMP_DELTA: u64 = (1 << TIMESTAMP_BITS) - 1;
const MACHINE_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + MACHINE_ID_BITS;

/// Cap on the backoff step while waiting out an exhausted millisecond.
const WAIT_BACKOFF_MAX_STEP: u32 = 8;

/// Configuration for an [`IdGenerator`].
///
/// # Example
///
/// ```rust
/// use warden::IdGeneratorConfig;
///
/// let config = IdGeneratorConfig::new(7).with_epoch_ms(1_700_000_000_000);
/// assert!(config.validate().is_ok());
/// assert!(IdGeneratorConfig::new(1024).validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdGeneratorConfig {
    /// Machine ID embedded in every ID (0..=1023).
    pub machine_id: u64,
    /// Epoch subtracted from the clock before packing.
    pub epoch_ms: u64,
}

impl IdGeneratorConfig {
    /// Configuration for `machine_id` with the default epoch.
    pub fn new(machine_id: u64) -> Self {
        Self {
            machine_id,
            epoch_ms: DEFAULT_EPOCH_MS,
        }
    }

    /// Uses a custom epoch.
    pub fn with_epoch_ms(mut self, epoch_ms: u64) -> Self {
        self.epoch_ms = epoch_ms;
        self
    }

    /// Checks the machine ID range.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MachineIdOutOfRange`] if `machine_id > 1023`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machine_id > MAX_MACHINE_ID {
            return Err(ConfigError::MachineIdOutOfRange {
                machine_id: self.machine_id,
                max: MAX_MACHINE_ID,
            });
        }
        Ok(())
    }
}

/// Fields recovered from an ID by [`IdGenerator::decompose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    /// Absolute millisecond timestamp at which the ID was minted.
    pub timestamp_ms: u64,
    /// Machine ID of the generator.
    pub machine_id: u64,
    /// Sequence number within that millisecond.
    pub sequence: u64,
}

#[derive(Debug)]
struct SnowflakeState {
    last_timestamp: Option<u64>,
    sequence: u64,
}

/// Thread-safe snowflake ID generator.
///
/// ## Example
///
/// ```rust
/// use warden::IdGenerator;
///
/// let generator = IdGenerator::new(1).unwrap();
/// let a = generator.next_id().unwrap();
/// let b = generator.next_id().unwrap();
/// assert!(b > a);
/// assert_eq!(generator.decompose(a).machine_id, 1);
/// ```
pub struct IdGenerator {
    machine_id: u64,
    epoch_ms: u64,
    clock: SharedClock,
    state: Mutex<SnowflakeState>,
}

impl IdGenerator {
    /// Creates a generator for `machine_id` reading the system wall clock.
    ///
    /// # Errors
    ///
    /// Fails if `machine_id` exceeds [`MAX_MACHINE_ID`].
    pub fn new(machine_id: u64) -> Result<Self, ConfigError> {
        Self::with_config(IdGeneratorConfig::new(machine_id))
    }

    /// Creates a generator from a full configuration.
    pub fn with_config(config: IdGeneratorConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a generator that reads time from `clock`.
    ///
    /// # Errors
    ///
    /// Fails on an invalid machine ID or an epoch ahead of `clock`.
    pub fn with_clock(config: IdGeneratorConfig, clock: SharedClock) -> Result<Self, ConfigError> {
        config.validate()?;

        let now_ms = clock.now_ms();
        if config.epoch_ms > now_ms {
            return Err(ConfigError::EpochInFuture {
                epoch_ms: config.epoch_ms,
                now_ms,
            });
        }

        debug!(
            "Created id generator (machine: {}, epoch: {}ms)",
            config.machine_id, config.epoch_ms
        );

        Ok(Self {
            machine_id: config.machine_id,
            epoch_ms: config.epoch_ms,
            clock,
            state: Mutex::new(SnowflakeState {
                last_timestamp: None,
                sequence: 0,
            }),
        })
    }

    /// Mints the next ID.
    ///
    /// ```text
    ///     t < last      ──► Err(ClockRolledBack)
    ///     t == last     ──► sequence + 1 (wait for t+1 on wrap)
    ///     t > last      ──► sequence = 0
    /// ```
    ///
    /// # Errors
    ///
    /// - [`IdError::ClockRolledBack`] if the clock reads earlier than the
    ///   previous ID's timestamp. No ID is returned in that case.
    /// - [`IdError::TimestampOverflow`] once the 41-bit delta is exhausted.
    pub fn next_id(&self) -> Result<u64, IdError> {
        let mut state = self.state.lock();
        let mut now = self.clock.now_ms();

        match state.last_timestamp {
            Some(last) if now < last => {
                warn!(
                    "Clock moved backwards by {}ms, refusing to mint id",
                    last - now
                );
                return Err(IdError::ClockRolledBack { last_ms: last, now_ms: now });
            }
            Some(last) if now == last => {
                state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
                if state.sequence == 0 {
                    now = self.wait_next_millis(last);
                }
            }
            _ => state.sequence = 0,
        }

        // A clock that regressed below the epoch is also a rollback
        let delta = now.checked_sub(self.epoch_ms).ok_or(IdError::ClockRolledBack {
            last_ms: self.epoch_ms,
            now_ms: now,
        })?;
        if delta > MAX_TIMESTAMP_DELTA {
            return Err(IdError::TimestampOverflow { delta_ms: delta });
        }

        state.last_timestamp = Some(now);

        Ok((delta << TIMESTAMP_SHIFT) | (self.machine_id << MACHINE_ID_SHIFT) | state.sequence)
    }

    // Spins, then yields, until the clock passes `last`.
    fn wait_next_millis(&self, last: u64) -> u64 {
        warn!("Sequence exhausted at {}ms, waiting for next millisecond", last);
        let mut backoff = Backoff::new(WAIT_BACKOFF_MAX_STEP);
        loop {
            let now = self.clock.now_ms();
            if now > last {
                return now;
            }
            backoff.snooze();
        }
    }

    /// Splits an ID minted by this generator (or one with the same epoch).
    pub fn decompose(&self, id: u64) -> IdParts {
        decompose_with_epoch(id, self.epoch_ms)
    }

    /// Machine ID embedded in every ID.
    pub fn machine_id(&self) -> u64 {
        self.machine_id
    }

    /// Epoch the timestamp field is relative to.
    pub fn epoch_ms(&self) -> u64 {
        self.epoch_ms
    }
}

/// Splits an ID given the epoch it was minted against.
pub fn decompose_with_epoch(id: u64, epoch_ms: u64) -> IdParts {
    IdParts {
        timestamp_ms: (id >> TIMESTAMP_SHIFT).saturating_add(epoch_ms),
        machine_id: (id >> MACHINE_ID_SHIFT) & MAX_MACHINE_ID,
        sequence: id & MAX_SEQUENCE,
    }
}

impl std::fmt::Debug for IdGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdGenerator")
            .field("machine_id", &self.machine_id)
            .field("epoch_ms", &self.epoch_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    const EPOCH: u64 = 1_000_000;

    fn manual_generator(machine_id: u64, start_ms: u64) -> (IdGenerator, ManualClock) {
        let clock = ManualClock::new(start_ms);
        let config = IdGeneratorConfig::new(machine_id).with_epoch_ms(EPOCH);
        let generator = IdGenerator::with_clock(config, Arc::new(clock.clone())).unwrap();
        (generator, clock)
    }

    #[test]
    fn test_machine_id_validation() {
        assert!(IdGenerator::new(0).is_ok());
        assert!(IdGenerator::new(MAX_MACHINE_ID).is_ok());
        assert_eq!(
            IdGenerator::new(MAX_MACHINE_ID + 1).unwrap_err(),
            ConfigError::MachineIdOutOfRange { machine_id: 1024, max: 1023 }
        );
    }

    #[test]
    fn test_epoch_in_future_rejected() {
        let clock = Arc::new(ManualClock::new(100));
        let config = IdGeneratorConfig::new(1).with_epoch_ms(200);
        assert!(matches!(
            IdGenerator::with_clock(config, clock),
            Err(ConfigError::EpochInFuture { epoch_ms: 200, now_ms: 100 })
        ));
    }

    #[test]
    fn test_layout() {
        let (generator, _clock) = manual_generator(5, EPOCH + 1234);
        let id = generator.next_id().unwrap();

        assert_eq!(id, (1234 << 22) | (5 << 12));
        assert_eq!(
            generator.decompose(id),
            IdParts { timestamp_ms: EPOCH + 1234, machine_id: 5, sequence: 0 }
        );
    }

    #[test]
    fn test_sequence_increments_within_millisecond() {
        let (generator, clock) = manual_generator(1, EPOCH + 10);

        let first = generator.next_id().unwrap();
        let second = generator.next_id().unwrap();
        assert_eq!(generator.decompose(first).sequence, 0);
        assert_eq!(generator.decompose(second).sequence, 1);

        // New millisecond resets the sequence
        clock.advance(1);
        let third = generator.next_id().unwrap();
        assert_eq!(generator.decompose(third).sequence, 0);
        assert!(third > second);
    }

    #[test]
    fn test_clock_rollback_fails() {
        let (generator, clock) = manual_generator(1, EPOCH + 500);
        let before = generator.next_id().unwrap();

        clock.set(EPOCH + 400);
        assert_eq!(
            generator.next_id(),
            Err(IdError::ClockRolledBack { last_ms: EPOCH + 500, now_ms: EPOCH + 400 })
        );

        // Once the clock catches up, ids resume above the old ones
        clock.set(EPOCH + 501);
        assert!(generator.next_id().unwrap() > before);
    }

    #[test]
    fn test_clock_below_epoch_fails() {
        let (generator, clock) = manual_generator(1, EPOCH);
        clock.set(EPOCH - 1);
        assert!(matches!(generator.next_id(), Err(IdError::ClockRolledBack { .. })));
    }

    #[test]
    fn test_timestamp_overflow() {
        let (generator, clock) = manual_generator(1, EPOCH);
        clock.set(EPOCH + MAX_TIMESTAMP_DELTA + 1);
        assert!(matches!(generator.next_id(), Err(IdError::TimestampOverflow { .. })));
    }

    #[test]
    fn test_sequence_exhaustion_waits_for_next_millisecond() {
        let (generator, clock) = manual_generator(3, EPOCH + 50);
        let generator = Arc::new(generator);

        for expected in 0..=MAX_SEQUENCE {
            let id = generator.next_id().unwrap();
            assert_eq!(generator.decompose(id).sequence, expected);
        }

        // The 4097th id in the same millisecond blocks until time moves
        let advancer = {
            let clock = clock.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                clock.advance(1);
            })
        };

        let id = generator.next_id().unwrap();
        advancer.join().unwrap();

        let parts = generator.decompose(id);
        assert_eq!(parts.timestamp_ms, EPOCH + 51);
        assert_eq!(parts.sequence, 0);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let generator = Arc::new(IdGenerator::new(9).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || {
                    (0..2_000)
                        .map(|_| generator.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            let ids = handle.join().unwrap();
            // Each thread observes its own ids in increasing order
            assert!(ids.windows(2).all(|w| w[0] < w[1]));
            for id in ids {
                assert!(seen.insert(id), "duplicate id {}", id);
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    proptest! {
        #[test]
        fn prop_decompose_recovers_fields(
            delta in 0u64..=MAX_TIMESTAMP_DELTA,
            machine_id in 0u64..=MAX_MACHINE_ID,
            sequence in 0u64..=MAX_SEQUENCE,
        ) {
            let id = (delta << TIMESTAMP_SHIFT) | (machine_id << MACHINE_ID_SHIFT) | sequence;
            let parts = decompose_with_epoch(id, DEFAULT_EPOCH_MS);
            prop_assert_eq!(parts.timestamp_ms, DEFAULT_EPOCH_MS + delta);
            prop_assert_eq!(parts.machine_id, machine_id);
            prop_assert_eq!(parts.sequence, sequence);
            // Top bit stays clear so ids are also valid i64 values
            prop_assert!(id <= i64::MAX as u64);
        }
    }
}
