//! Store-backed sequences.
//!
//! A [`StoreSequence`] hands out strictly increasing numbers across every
//! process sharing the same store key, at the cost of one round-trip per ID.
//! Use it where dense, gap-free numbering matters more than throughput
//! (order numbers, invoice numbers); use [`IdGenerator`](crate::IdGenerator)
//! everywhere else.

use crate::error::{StoreError, StoreResult};
use crate::store::AtomicStore;
use std::sync::Arc;
use tracing::debug;

/// Counter stored under a single key, incremented atomically by the store.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use warden::{MemoryStore, StoreSequence};
///
/// let sequence = StoreSequence::new(Arc::new(MemoryStore::new()), "orders");
/// assert_eq!(sequence.next_id().unwrap(), 1);
/// assert_eq!(sequence.next_id().unwrap(), 2);
/// assert_eq!(sequence.next_id_for("eu").unwrap(), 1);
/// ```
pub struct StoreSequence<S: AtomicStore + ?Sized> {
    store: Arc<S>,
    key: String,
}

impl<S: AtomicStore + ?Sized> StoreSequence<S> {
    /// Creates a sequence over `key`. Nothing is written until first use.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// Next value of the sequence. The first value of a fresh key is 1.
    pub fn next_id(&self) -> StoreResult<u64> {
        self.store.incr(&self.key)
    }

    /// Next value of an independent sub-sequence `"{key}:{business_key}"`.
    pub fn next_id_for(&self, business_key: &str) -> StoreResult<u64> {
        self.store.incr(&self.sub_key(business_key))
    }

    /// Last value handed out, or `None` if the sequence was never used.
    pub fn current(&self) -> StoreResult<Option<u64>> {
        match self.store.get(&self.key)? {
            None => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StoreError::NotAnInteger {
                    key: self.key.clone(),
                }),
        }
    }

    /// Sets the counter back to 0; the next value is 1 again.
    pub fn reset(&self) -> StoreResult<()> {
        debug!("Resetting sequence '{}'", self.key);
        self.store.set(&self.key, "0")
    }

    /// Makes the next value `value + 1`.
    pub fn set_initial_value(&self, value: u64) -> StoreResult<()> {
        debug!("Setting sequence '{}' to {}", self.key, value);
        self.store.set(&self.key, &value.to_string())
    }

    /// Store key backing the main sequence.
    pub fn key(&self) -> &str {
        &self.key
    }

    fn sub_key(&self, business_key: &str) -> String {
        format!("{}:{}", self.key, business_key)
    }
}

impl<S: AtomicStore + ?Sized> std::fmt::Debug for StoreSequence<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSequence").field("key", &self.key).finish()
    }
}
