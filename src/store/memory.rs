//! # Embedded Atomic Store
//!
//! An in-process [`AtomicStore`] built on a sharded concurrent map.
//!
//! ```text
//!     MemoryStore
//!     ┌──────────────────────────────────────────┐
//!     │ DashMap (N shards, ahash)                │
//!     │  "lock:orders" → Str("9f1c…")  ttl 30s   │
//!     │  "bloom:users" → Bits([0x84, 0x01, …])   │
//!     │  "seq:invoice" → Str("1041")             │
//!     └──────────────────────────────────────────┘
//! ```
//!
//! Every command runs while holding the shard lock of its key, which gives
//! the per-key atomicity the trait requires. Expired entries are treated as
//! absent on access and physically removed by the next command that touches
//! the key, read or write. Keys nobody touches again stay until
//! [`MemoryStore::purge_expired`] sweeps them.

use super::{AtomicStore, KeyTtl};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::{StoreError, StoreResult};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Largest addressable bit offset, matching Redis' 512 MiB string limit.
const MAX_BIT_OFFSET: u64 = u32::MAX as u64;

/// Initial map capacity spread across shards.
const INITIAL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Bits(Vec<u8>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at_ms: Option<u64>,
}

impl Entry {
    fn string(value: impl Into<String>) -> Self {
        Self {
            value: Value::Str(value.into()),
            expires_at_ms: None,
        }
    }

    fn bits() -> Self {
        Self {
            value: Value::Bits(Vec::new()),
            expires_at_ms: None,
        }
    }

    #[inline]
    fn is_live(&self, now_ms: u64) -> bool {
        self.expires_at_ms.map_or(true, |deadline| now_ms < deadline)
    }

    #[inline]
    fn holds(&self, expected: &str) -> bool {
        matches!(&self.value, Value::Str(s) if s == expected)
    }
}

/// In-memory implementation of [`AtomicStore`].
///
/// ## Example
///
/// ```rust
/// use warden::{AtomicStore, MemoryStore};
///
/// let store = MemoryStore::new();
/// assert!(store.set_nx_px("lock:jobs", "token-a", 30_000).unwrap());
/// assert!(!store.set_nx_px("lock:jobs", "token-b", 30_000).unwrap());
/// assert!(store.compare_and_delete("lock:jobs", "token-a").unwrap());
/// ```
pub struct MemoryStore {
    entries: DashMap<String, Entry, ahash::RandomState>,
    clock: SharedClock,
}

impl MemoryStore {
    /// Creates an empty store that expires keys against [`MonotonicClock`].
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock))
    }

    /// Creates an empty store that evaluates TTLs against `clock`.
    pub fn with_clock(clock: SharedClock) -> Self {
        // Power-of-two shard count sized to the machine, as DashMap requires
        let num_shards = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
            .next_power_of_two()
            .clamp(4, 64);

        Self {
            entries: DashMap::with_capacity_and_hasher_and_shard_amount(
                INITIAL_CAPACITY,
                ahash::RandomState::new(),
                num_shards,
            ),
            clock,
        }
    }

    #[inline]
    fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    // Applies `read` to a live entry. An expired entry is removed instead.
    fn read_live<R>(&self, key: &str, now: u64, read: impl FnOnce(&Entry) -> R) -> Option<R> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(read(entry.value())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        None
    }

    /// Removes every expired key and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Purged {} expired keys", removed);
        }
        removed
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.now();
        self.entries.iter().filter(|e| e.value().is_live(now)).count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.entries.len())
            .field("clock", &self.clock)
            .finish()
    }
}

// Bit numbering follows SETBIT: offset 0 is the most significant bit of byte 0.
#[inline]
fn bit_position(offset: u64) -> (usize, u8) {
    ((offset / 8) as usize, 0x80 >> (offset % 8))
}

fn write_bits(bits: &mut Vec<u8>, offsets: &[u64], value: bool) {
    for &offset in offsets {
        let (byte, mask) = bit_position(offset);
        if byte >= bits.len() {
            bits.resize(byte + 1, 0);
        }
        if value {
            bits[byte] |= mask;
        } else {
            bits[byte] &= !mask;
        }
    }
}

fn check_offsets(offsets: &[u64]) -> StoreResult<()> {
    match offsets.iter().find(|&&offset| offset > MAX_BIT_OFFSET) {
        Some(&offset) => Err(StoreError::OffsetOutOfRange { offset }),
        None => Ok(()),
    }
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType { key: key.to_owned() }
}

impl AtomicStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.now();
        self.read_live(key, now, |entry| match &entry.value {
            Value::Str(s) => Ok(Some(s.clone())),
            Value::Bits(_) => Err(wrong_type(key)),
        })
        .unwrap_or(Ok(None))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_owned(), Entry::string(value));
        Ok(())
    }

    fn set_nx_px(&self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        let now = self.now();
        let fresh = Entry {
            value: Value::Str(value.to_owned()),
            expires_at_ms: Some(now.saturating_add(ttl_ms)),
        };

        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    return Ok(false);
                }
                occupied.insert(fresh);
                Ok(true)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(fresh);
                Ok(true)
            }
        }
    }

    fn del(&self, key: &str) -> StoreResult<bool> {
        let now = self.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    fn incr(&self, key: &str) -> StoreResult<u64> {
        let now = self.now();
        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live(now) {
                    *entry = Entry::string("0");
                }
                let next = match &entry.value {
                    Value::Str(s) => s
                        .parse::<u64>()
                        .ok()
                        .and_then(|v| v.checked_add(1))
                        .ok_or_else(|| StoreError::NotAnInteger { key: key.to_owned() })?,
                    Value::Bits(_) => return Err(wrong_type(key)),
                };
                // INCR keeps an existing TTL
                entry.value = Value::Str(next.to_string());
                Ok(next)
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::string("1"));
                Ok(1)
            }
        }
    }

    fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let now = self.now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.is_live(now) && entry.holds(expected))
            .is_some())
    }

    fn compare_and_pexpire(&self, key: &str, expected: &str, ttl_ms: u64) -> StoreResult<bool> {
        let now = self.now();
        match self.entries.get_mut(key) {
            Some(mut entry) if entry.is_live(now) && entry.holds(expected) => {
                entry.expires_at_ms = Some(now.saturating_add(ttl_ms));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn pttl(&self, key: &str) -> StoreResult<KeyTtl> {
        let now = self.now();
        Ok(self
            .read_live(key, now, |entry| match entry.expires_at_ms {
                Some(deadline) => KeyTtl::ExpiresIn(deadline - now),
                None => KeyTtl::Persistent,
            })
            .unwrap_or(KeyTtl::Missing))
    }

    fn set_bits(&self, key: &str, offsets: &[u64], value: bool) -> StoreResult<()> {
        check_offsets(offsets)?;
        let now = self.now();

        match self.entries.entry(key.to_owned()) {
            MapEntry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if !entry.is_live(now) {
                    *entry = Entry::bits();
                }
                match &mut entry.value {
                    Value::Bits(bits) => write_bits(bits, offsets, value),
                    Value::Str(_) => return Err(wrong_type(key)),
                }
            }
            MapEntry::Vacant(vacant) => {
                let mut entry = Entry::bits();
                if let Value::Bits(bits) = &mut entry.value {
                    write_bits(bits, offsets, value);
                }
                vacant.insert(entry);
            }
        }
        Ok(())
    }

    fn get_bits(&self, key: &str, offsets: &[u64]) -> StoreResult<Vec<bool>> {
        check_offsets(offsets)?;
        let now = self.now();

        self.read_live(key, now, |entry| match &entry.value {
            Value::Bits(bits) => Ok(offsets
                .iter()
                .map(|&offset| {
                    let (byte, mask) = bit_position(offset);
                    bits.get(byte).is_some_and(|b| b & mask != 0)
                })
                .collect()),
            Value::Str(_) => Err(wrong_type(key)),
        })
        .unwrap_or_else(|| Ok(vec![false; offsets.len()]))
    }
}
