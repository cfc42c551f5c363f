//! # Shared Bloom Filter
//!
//! A probabilistic set whose bit array lives in an [`AtomicStore`] bitmap,
//! so any number of processes can add to and query the same filter.
//!
//! ```text
//!     add("alice")                       contains("bob")
//!        │                                   │
//!        ▼ MD5 ─► k offsets                  ▼ MD5 ─► k offsets
//!     set_bits(key, [3, 17, 40], true)    get_bits(key, [5, 17, 61])
//!        │                                   │
//!        ▼                                   ▼
//!     ┌─────────────────────────────────────────────────────────┐
//!     │ 0 0 0 1 0 0 0 0 0 0 0 0 0 0 0 0 0 1 0 ...  0 1 0 ...    │
//!     └─────────────────────────────────────────────────────────┘
//! ```
//!
//! There are no false negatives: once `add` returns, `contains` is true for
//! that item from every process. The k bit writes of one `add` are not
//! atomic together, so a concurrent `contains` may briefly miss an item that
//! is still being added.

mod config;
mod hash;

pub use config::{BloomConfig, DEFAULT_BIT_SIZE, DEFAULT_HASH_COUNT, MAX_BIT_SIZE};

use crate::error::{ConfigError, StoreResult};
use crate::store::AtomicStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Bloom filter stored under one bitmap key.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use warden::{BloomConfig, BloomFilter, MemoryStore};
///
/// let store = Arc::new(MemoryStore::new());
/// let filter = BloomFilter::with_config(store, "seen", BloomConfig::new(1 << 16, 5)).unwrap();
///
/// filter.add("alice").unwrap();
/// assert!(filter.contains("alice").unwrap());
/// ```
pub struct BloomFilter<S: AtomicStore + ?Sized> {
    store: Arc<S>,
    key: String,
    config: BloomConfig,
}

impl<S: AtomicStore + ?Sized> BloomFilter<S> {
    /// Filter on `key` with the default 2^29-bit, 5-hash layout.
    pub fn new(store: Arc<S>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            config: BloomConfig::default(),
        }
    }

    /// Filter on `key` with a custom layout.
    ///
    /// # Errors
    ///
    /// Fails if `config` does not validate.
    pub fn with_config(
        store: Arc<S>,
        key: impl Into<String>,
        config: BloomConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            key: key.into(),
            config,
        })
    }

    /// Adds one item.
    pub fn add(&self, item: impl AsRef<[u8]>) -> StoreResult<()> {
        let offsets = self.offsets(item.as_ref());
        self.store.set_bits(&self.key, &offsets, true)
    }

    /// Adds every item with a single batched store call.
    pub fn add_all<I>(&self, items: I) -> StoreResult<()>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
    {
        let offsets: Vec<u64> = items
            .into_iter()
            .flat_map(|item| self.offsets(item.as_ref()))
            .collect();
        if offsets.is_empty() {
            return Ok(());
        }

        debug!("Adding {} bits to bloom filter '{}'", offsets.len(), self.key);
        self.store.set_bits(&self.key, &offsets, true)
    }

    /// `false` means definitely absent; `true` means probably present.
    pub fn contains(&self, item: impl AsRef<[u8]>) -> StoreResult<bool> {
        let offsets = self.offsets(item.as_ref());
        let bits = self.store.get_bits(&self.key, &offsets)?;
        Ok(bits.iter().all(|&bit| bit))
    }

    /// Clears the filter by deleting its key.
    pub fn delete(&self) -> StoreResult<bool> {
        let existed = self.store.del(&self.key)?;
        info!("Deleted bloom filter '{}'", self.key);
        Ok(existed)
    }

    /// Store key of the bitmap.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Layout in use.
    pub fn config(&self) -> &BloomConfig {
        &self.config
    }

    fn offsets(&self, item: &[u8]) -> Vec<u64> {
        hash::bit_indices(item, self.config.hash_count, self.config.bit_size)
    }
}

impl<S: AtomicStore + ?Sized> std::fmt::Debug for BloomFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BloomFilter")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use proptest::prelude::*;
    use std::thread;

    fn small_filter(store: Arc<MemoryStore>) -> BloomFilter<MemoryStore> {
        BloomFilter::with_config(store, "bf", BloomConfig::new(1 << 16, 5)).unwrap()
    }

    #[test]
    fn test_add_then_contains() {
        let filter = small_filter(Arc::new(MemoryStore::new()));
        assert!(!filter.contains("alice").unwrap());

        filter.add("alice").unwrap();
        assert!(filter.contains("alice").unwrap());
        assert!(filter.contains(b"alice").unwrap());
    }

    #[test]
    fn test_add_all_batches() {
        let filter = small_filter(Arc::new(MemoryStore::new()));
        let items: Vec<String> = (0..100).map(|i| format!("item-{}", i)).collect();
        filter.add_all(&items).unwrap();
        filter.add_all(Vec::<String>::new()).unwrap();

        for item in &items {
            assert!(filter.contains(item).unwrap());
        }
    }

    #[test]
    fn test_delete_clears() {
        let store = Arc::new(MemoryStore::new());
        let filter = small_filter(store);
        filter.add("x").unwrap();

        assert!(filter.delete().unwrap());
        assert!(!filter.contains("x").unwrap());
        assert!(!filter.delete().unwrap());
    }

    #[test]
    fn test_false_positive_rate_near_expected() {
        let config = BloomConfig::optimal(2_000, 0.02).unwrap();
        let filter = BloomFilter::with_config(Arc::new(MemoryStore::new()), "fpr", config).unwrap();
        filter
            .add_all((0..2_000).map(|i| format!("member-{}", i)))
            .unwrap();

        let trials = 10_000;
        let false_positives = (0..trials)
            .filter(|i| filter.contains(format!("stranger-{}", i)).unwrap())
            .count();

        // Overlapping digest windows correlate the k indices a little
        let expected = config.expected_false_positive_rate(2_000) * trials as f64;
        let bound = expected * 1.25 + 4.0 * expected.sqrt();
        assert!(
            (false_positives as f64) < bound,
            "false positives: {} (expected {:.0}, bound {:.0})",
            false_positives,
            expected,
            bound
        );
    }

    #[test]
    fn test_handles_share_bits() {
        let store = Arc::new(MemoryStore::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let filter = small_filter(store.clone());
                thread::spawn(move || {
                    for i in 0..200 {
                        filter.add(format!("{}-{}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let reader = small_filter(store);
        for t in 0..4 {
            for i in 0..200 {
                assert!(reader.contains(format!("{}-{}", t, i)).unwrap());
            }
        }
    }

    proptest! {
        #[test]
        fn prop_no_false_negatives(items in proptest::collection::vec(".{0,32}", 1..50),
                                   bit_size in 64u64..4096, hash_count in 1u32..12) {
            let config = BloomConfig::new(bit_size, hash_count);
            let filter = BloomFilter::with_config(Arc::new(MemoryStore::new()), "prop", config).unwrap();
            filter.add_all(&items).unwrap();
            for item in &items {
                prop_assert!(filter.contains(item).unwrap());
            }
        }
    }
}
