//! # Atomic Key-Value Store
//!
//! The lock, the bloom filter and the store-backed sequence never talk to a
//! concrete server. They are written against [`AtomicStore`], a small set of
//! commands that a store must execute atomically per key:
//!
//! ```text
//!     Command                    Redis equivalent
//!     ─────────────────────────  ─────────────────────────────────────
//!     get / set / del            GET / SET / DEL
//!     set_nx_px                  SET key value NX PX ttl
//!     incr                       INCR
//!     compare_and_delete         EVAL "if get==ARGV then del"
//!     compare_and_pexpire        EVAL "if get==ARGV then pexpire"
//!     pttl                       PTTL
//!     set_bits / get_bits        pipelined SETBIT / GETBIT
//! ```
//!
//! [`MemoryStore`] is the embedded implementation. Any other backend
//! (a Redis client, a transactional embedded map) only needs to implement
//! the trait. Handles are passed explicitly as `Arc<S>`; there is no
//! process-wide store singleton.
//!
//! Transport failures must be reported as [`StoreError::Unavailable`] and
//! never folded into a `false`/`None` result.

mod memory;

pub use memory::MemoryStore;

use crate::error::StoreResult;
use std::sync::Arc;

/// Remaining lifetime of a key, as reported by [`AtomicStore::pttl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has already expired).
    Missing,
    /// The key exists without an expiry.
    Persistent,
    /// The key expires after this many milliseconds.
    ExpiresIn(u64),
}

/// Commands that a shared store executes atomically per key.
///
/// Implementations may block on I/O; callers treat every method as
/// potentially slow.
pub trait AtomicStore: Send + Sync {
    /// Reads a string value.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Writes a string value, clearing any expiry.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Sets `key` to `value` with a TTL only if the key is absent.
    ///
    /// Returns `true` iff the value was written.
    fn set_nx_px(&self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool>;

    /// Deletes a key. Returns `true` if a live key was removed.
    fn del(&self, key: &str) -> StoreResult<bool>;

    /// Increments a decimal counter, creating it at 0 first if absent.
    fn incr(&self, key: &str) -> StoreResult<u64>;

    /// Deletes `key` only if its current value equals `expected`.
    fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Resets the TTL of `key` only if its current value equals `expected`.
    fn compare_and_pexpire(&self, key: &str, expected: &str, ttl_ms: u64) -> StoreResult<bool>;

    /// Remaining lifetime of `key`.
    fn pttl(&self, key: &str) -> StoreResult<KeyTtl>;

    /// Sets every bit in `offsets` to `value` in one round-trip.
    fn set_bits(&self, key: &str, offsets: &[u64], value: bool) -> StoreResult<()>;

    /// Reads every bit in `offsets` in one round-trip, in the same order.
    ///
    /// Bits of an absent key, or beyond its end, read as `false`.
    fn get_bits(&self, key: &str, offsets: &[u64]) -> StoreResult<Vec<bool>>;
}

impl<S: AtomicStore + ?Sized> AtomicStore for Arc<S> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        (**self).set(key, value)
    }

    fn set_nx_px(&self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        (**self).set_nx_px(key, value, ttl_ms)
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        (**self).del(key)
    }

    fn incr(&self, key: &str) -> StoreResult<u64> {
        (**self).incr(key)
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        (**self).compare_and_delete(key, expected)
    }

    fn compare_and_pexpire(&self, key: &str, expected: &str, ttl_ms: u64) -> StoreResult<bool> {
        (**self).compare_and_pexpire(key, expected, ttl_ms)
    }

    fn pttl(&self, key: &str) -> StoreResult<KeyTtl> {
        (**self).pttl(key)
    }

    fn set_bits(&self, key: &str, offsets: &[u64], value: bool) -> StoreResult<()> {
        (**self).set_bits(key, offsets, value)
    }

    fn get_bits(&self, key: &str, offsets: &[u64]) -> StoreResult<Vec<bool>> {
        (**self).get_bits(key, offsets)
    }
}
