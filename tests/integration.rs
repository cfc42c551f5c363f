use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use warden::{
    AtomicStore, BloomConfig, BloomFilter, DistributedLock, HolderToken, IdGenerator, KeyTtl,
    LockConfig, LockError, ManualClock, MemoryStore, RateLimiter, RateLimiterBuilder, StoreError,
    StoreResult, StoreSequence, TokenBucketLimiter,
};

/// Memory store that can be switched into failing every command, as if
/// the server had become unreachable.
#[derive(Debug, Default)]
struct FlakyStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl FlakyStore {
    fn unreachable() -> Self {
        let store = Self::default();
        store.go_down();
        store
    }

    fn go_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl AtomicStore for FlakyStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.get(key)
    }
    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.set(key, value)
    }
    fn set_nx_px(&self, key: &str, value: &str, ttl_ms: u64) -> StoreResult<bool> {
        self.check()?;
        self.inner.set_nx_px(key, value, ttl_ms)
    }
    fn del(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.del(key)
    }
    fn incr(&self, key: &str) -> StoreResult<u64> {
        self.check()?;
        self.inner.incr(key)
    }
    fn compare_and_delete(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.compare_and_delete(key, expected)
    }
    fn compare_and_pexpire(&self, key: &str, expected: &str, ttl_ms: u64) -> StoreResult<bool> {
        self.check()?;
        self.inner.compare_and_pexpire(key, expected, ttl_ms)
    }
    fn pttl(&self, key: &str) -> StoreResult<KeyTtl> {
        self.check()?;
        self.inner.pttl(key)
    }
    fn set_bits(&self, key: &str, offsets: &[u64], value: bool) -> StoreResult<()> {
        self.check()?;
        self.inner.set_bits(key, offsets, value)
    }
    fn get_bits(&self, key: &str, offsets: &[u64]) -> StoreResult<Vec<bool>> {
        self.check()?;
        self.inner.get_bits(key, offsets)
    }
}

fn is_unavailable<T>(result: StoreResult<T>) -> bool {
    matches!(result, Err(StoreError::Unavailable(_)))
}

fn small_bloom() -> BloomConfig {
    BloomConfig::new(1 << 16, 5)
}

#[test]
fn test_ids_unique_across_threads() {
    let generator = Arc::new(IdGenerator::new(7).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = generator.clone();
            thread::spawn(move || {
                (0..5000)
                    .map(|_| generator.next_id().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        // Each caller sees strictly increasing IDs
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
        for id in ids {
            assert_eq!(generator.decompose(id).machine_id, 7);
            assert!(all.insert(id), "duplicate id {}", id);
        }
    }
    assert_eq!(all.len(), 40_000);
}

#[test]
fn test_ids_from_different_machines_never_collide() {
    let a = IdGenerator::new(1).unwrap();
    let b = IdGenerator::new(2).unwrap();

    let ids: HashSet<u64> = (0..1000)
        .flat_map(|_| [a.next_id().unwrap(), b.next_id().unwrap()])
        .collect();
    assert_eq!(ids.len(), 2000);
}

#[test]
fn test_fixed_window_over_simulated_time() {
    let clock = ManualClock::new(0);
    let limiter = RateLimiterBuilder::new()
        .fixed_window()
        .limit(10)
        .window_ms(1000)
        .clock(Arc::new(clock.clone()))
        .build();

    let first = (0..15).filter(|_| limiter.try_acquire()).count();
    assert_eq!(first, 10);

    clock.advance(999);
    assert!(!limiter.try_acquire());

    clock.advance(1);
    let second = (0..15).filter(|_| limiter.try_acquire()).count();
    assert_eq!(second, 10);

    let metrics = limiter.metrics();
    assert_eq!(metrics.total_acquired, 20);
    assert_eq!(metrics.total_rejected, 11);
}

#[test]
fn test_token_bucket_refill_timing() {
    // 10 tokens, one per millisecond
    let limiter = TokenBucketLimiter::new(10, 1, 1).unwrap();

    for _ in 0..10 {
        assert!(limiter.try_acquire());
    }
    assert!(limiter.available() < 10);

    thread::sleep(Duration::from_millis(20));
    assert_eq!(limiter.available(), 10);
}

#[test]
fn test_concurrent_limiter_never_over_admits() {
    let clock = ManualClock::new(0);
    let limiters: Vec<Arc<dyn RateLimiter>> = vec![
        Arc::from(
            RateLimiterBuilder::new()
                .fixed_window()
                .limit(500)
                .window_ms(1000)
                .clock(Arc::new(clock.clone()))
                .build(),
        ),
        Arc::from(
            RateLimiterBuilder::new()
                .sliding_window()
                .limit(500)
                .window_ms(1000)
                .clock(Arc::new(clock.clone()))
                .build(),
        ),
        Arc::from(
            RateLimiterBuilder::new()
                .leaky_bucket()
                .capacity(500)
                .rate(1)
                .interval_ms(1000)
                .clock(Arc::new(clock.clone()))
                .build(),
        ),
        Arc::from(
            RateLimiterBuilder::new()
                .token_bucket()
                .capacity(500)
                .rate(1)
                .interval_ms(1000)
                .clock(Arc::new(clock.clone()))
                .build(),
        ),
    ];

    for limiter in limiters {
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let limiter = limiter.clone();
                thread::spawn(move || (0..100).filter(|_| limiter.try_acquire()).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 500, "{}", limiter.algorithm());
        assert_eq!(limiter.metrics().total_rejected, 500);
    }
}

#[test]
fn test_lock_race_has_single_winner() {
    let store = Arc::new(MemoryStore::new());

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let lock = DistributedLock::new(store.clone(), "lock:race");
            thread::spawn(move || {
                let token = HolderToken::new();
                lock.try_lock(&token).unwrap()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&won| won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_lock_release_is_owner_only() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(store, "lock:owner");
    let owner = HolderToken::new();
    let intruder = HolderToken::new();

    assert!(lock.try_lock(&owner).unwrap());
    assert!(!lock.unlock(&intruder).unwrap());
    assert!(lock.is_held_by(&owner).unwrap());
    assert!(lock.unlock(&owner).unwrap());
    assert!(lock.try_lock(&intruder).unwrap());
}

#[test]
fn test_watchdog_keeps_lease_alive() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::with_config(
        store.clone(),
        "lock:watchdog",
        LockConfig::with_lease_ms(300),
    )
    .unwrap();
    let rival = DistributedLock::new(store, "lock:watchdog");
    let rival_token = HolderToken::new();

    let mut guard = lock
        .lock_with_watchdog(HolderToken::new())
        .unwrap()
        .expect("lock is free");

    // Well past the lease; renewals every 100ms keep it held
    thread::sleep(Duration::from_millis(1000));
    assert!(guard.is_renewing());
    assert!(!rival.try_lock(&rival_token).unwrap());
    assert!(lock.is_held_by(guard.token()).unwrap());

    guard.stop_renewal();
    assert!(!guard.is_renewing());

    thread::sleep(Duration::from_millis(400));
    assert!(rival.try_lock(&rival_token).unwrap());

    // The lease has already passed to the rival
    assert!(!guard.unlock().unwrap());
    assert!(rival.is_held_by(&rival_token).unwrap());
}

#[test]
fn test_guard_drop_releases_lock() {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(store, "lock:drop");

    {
        let _guard = lock.lock_with_watchdog(HolderToken::new()).unwrap().unwrap();
        assert!(lock.lock_with_watchdog(HolderToken::new()).unwrap().is_none());
    }

    assert!(lock.try_lock(&HolderToken::new()).unwrap());
}

#[test]
fn test_unreachable_store_surfaces_errors() {
    let store = Arc::new(FlakyStore::unreachable());
    let token = HolderToken::new();

    let lock = DistributedLock::new(store.clone(), "lock:down");
    assert!(is_unavailable(lock.try_lock(&token)));
    assert!(is_unavailable(lock.unlock(&token)));
    assert!(is_unavailable(lock.renew(&token)));
    assert!(is_unavailable(lock.is_held_by(&token)));
    assert!(is_unavailable(lock.remaining_lease()));
    assert!(matches!(
        lock.lock_with_watchdog(HolderToken::new()),
        Err(LockError::Store(StoreError::Unavailable(_)))
    ));

    let bloom = BloomFilter::with_config(store.clone(), "bloom:down", small_bloom()).unwrap();
    assert!(is_unavailable(bloom.add("apple")));
    assert!(is_unavailable(bloom.add_all(["banana", "cherry"])));
    assert!(is_unavailable(bloom.contains("apple")));
    assert!(is_unavailable(bloom.delete()));

    let sequence = StoreSequence::new(store, "seq:down");
    assert!(is_unavailable(sequence.next_id()));
    assert!(is_unavailable(sequence.next_id_for("eu")));
    assert!(is_unavailable(sequence.current()));
    assert!(is_unavailable(sequence.reset()));
    assert!(is_unavailable(sequence.set_initial_value(100)));
}

#[test]
fn test_guard_unlock_surfaces_outage_after_acquire() {
    let store = Arc::new(FlakyStore::default());
    let lock = DistributedLock::new(store.clone(), "lock:outage");

    let guard = lock
        .lock_with_watchdog(HolderToken::new())
        .unwrap()
        .expect("lock is free");
    assert!(guard.is_renewing());

    store.go_down();
    assert!(is_unavailable(guard.unlock()));

    // The record is untouched and still bound to its lease
    assert_eq!(store.inner.pttl("lock:outage").map(|ttl| ttl != KeyTtl::Missing), Ok(true));
}

#[test]
fn test_bloom_filter_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let bloom = BloomFilter::with_config(store.clone(), "bloom:fruit", small_bloom()).unwrap();

    assert!(!bloom.contains("apple").unwrap());
    bloom.add("apple").unwrap();
    bloom.add_all(["banana", "cherry"]).unwrap();

    // A second handle over the same key sees the same bits
    let other = BloomFilter::with_config(store, "bloom:fruit", small_bloom()).unwrap();
    for fruit in ["apple", "banana", "cherry"] {
        assert!(other.contains(fruit).unwrap());
    }

    assert!(bloom.delete().unwrap());
    assert!(!other.contains("apple").unwrap());
    assert!(!bloom.delete().unwrap());
}

#[test]
fn test_bloom_false_positive_rate() {
    let config = BloomConfig::optimal(1000, 0.01).unwrap();
    let bloom = BloomFilter::with_config(Arc::new(MemoryStore::new()), "bloom:fpr", config).unwrap();

    for i in 0..1000 {
        bloom.add(format!("member-{}", i)).unwrap();
    }
    for i in 0..1000 {
        assert!(bloom.contains(format!("member-{}", i)).unwrap());
    }

    let trials = 10_000;
    let false_positives = (0..trials)
        .filter(|i| bloom.contains(format!("stranger-{}", i)).unwrap())
        .count();

    let expected = config.expected_false_positive_rate(1000) * trials as f64;
    let bound = expected * 1.25 + 4.0 * expected.sqrt();
    assert!(
        (false_positives as f64) < bound,
        "{} false positives (expected {:.0}, bound {:.0})",
        false_positives,
        expected,
        bound
    );
}

#[test]
fn test_sequence_shared_between_handles() {
    let store = Arc::new(MemoryStore::new());
    let a = StoreSequence::new(store.clone(), "seq:orders");
    let b = StoreSequence::new(store, "seq:orders");

    assert_eq!(a.next_id().unwrap(), 1);
    assert_eq!(b.next_id().unwrap(), 2);
    assert_eq!(a.next_id_for("eu").unwrap(), 1);
    assert_eq!(b.current().unwrap(), Some(2));
}
