//! Bounded, thread-safe deduplication cache for event ids.
//!
//! Slack retries a delivery when it does not see a fast 2xx, and a retry
//! carries the same `event_id` as the original. The cache collapses those
//! retries into a single admission: the first [`DedupeCache::check_and_mark`]
//! for an id returns `false` ("new"), every later call within the TTL returns
//! `true` ("duplicate").
//!
//! # Bounds
//!
//! - **Capacity**: after every call, `len() <= capacity`. When an insert
//!   overflows, the oldest *inserted* entry is evicted (FIFO, not LRU; a
//!   duplicate hit does not refresh an entry).
//! - **TTL**: an entry older than the TTL never reports a duplicate. Expired
//!   entries are removed lazily when hit, and in bulk by a sweep that runs at
//!   most once per cleanup interval, piggybacked on normal calls.
//!
//! # Concurrency
//!
//! All state sits behind one mutex and `check_and_mark` does its check and its
//! insert inside a single critical section, so for any id exactly one caller
//! observes "new" no matter how many race.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info};

/// Default maximum number of remembered event ids.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Default time an admitted id keeps suppressing duplicates.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default minimum time between expiry sweeps.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Sizing and expiry settings for a [`DedupeCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub capacity: usize,

    /// How long an admitted id suppresses duplicates.
    pub ttl: Duration,

    /// Minimum time between bulk expiry sweeps.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            capacity: DEFAULT_CAPACITY,
            ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    admitted_at: Instant,
    seq: u64,
}

/// State guarded by the cache mutex.
///
/// `index` and `order` always hold the same set of ids: `index` maps an id to
/// its entry, `order` maps the entry's insertion sequence number back to the
/// id, so the first key of `order` is the oldest insertion.
#[derive(Debug)]
struct Inner {
    index: HashMap<String, Entry>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    last_cleanup: Instant,
}

impl Inner {
    fn new(now: Instant) -> Self {
        Inner {
            index: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            last_cleanup: now,
        }
    }

    fn insert(&mut self, event_id: &str, now: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(
            event_id.to_string(),
            Entry {
                admitted_at: now,
                seq,
            },
        );
        self.order.insert(seq, event_id.to_string());
    }

    fn remove(&mut self, event_id: &str) {
        if let Some(entry) = self.index.remove(event_id) {
            self.order.remove(&entry.seq);
        }
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, event_id) = self.order.pop_first()?;
        self.index.remove(&event_id);
        Some(event_id)
    }

    /// Removes every entry older than `ttl`, returning how many went.
    ///
    /// Insertion order is admission-time order, so expired entries form a
    /// prefix of `order` and the walk stops at the first live one.
    fn sweep_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let mut swept = 0;
        while let Some((_, event_id)) = self.order.first_key_value() {
            let expired = self
                .index
                .get(event_id)
                .is_none_or(|entry| now.saturating_duration_since(entry.admitted_at) > ttl);
            if !expired {
                break;
            }
            self.evict_oldest();
            swept += 1;
        }
        swept
    }
}

/// An in-memory, capacity- and age-bounded set of admitted event ids.
///
/// Construct one per pipeline and share it by `Arc`; independent instances do
/// not interact.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use event_gate::dedupe::DedupeCache;
///
/// let cache = DedupeCache::new(100, Duration::from_secs(3600));
///
/// assert!(!cache.check_and_mark("Ev1")); // first delivery: admitted
/// assert!(cache.check_and_mark("Ev1"));  // retry: duplicate
/// assert!(!cache.check_and_mark("Ev2")); // different event: admitted
/// ```
#[derive(Debug)]
pub struct DedupeCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
}

impl DedupeCache {
    /// Creates a cache with the given capacity and TTL and the default cleanup interval.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self::with_config(CacheConfig {
            capacity,
            ttl,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        })
    }

    /// Creates a cache from a full configuration.
    ///
    /// A capacity of zero is allowed but makes every id look new.
    pub fn with_config(config: CacheConfig) -> Self {
        DedupeCache {
            config,
            inner: Mutex::new(Inner::new(Instant::now())),
        }
    }

    /// Atomically checks whether `event_id` was already admitted, and admits it if not.
    ///
    /// Returns `true` for a duplicate (admitted earlier and not yet expired),
    /// `false` if this call admitted it.
    pub fn check_and_mark(&self, event_id: &str) -> bool {
        self.check_and_mark_at(event_id, Instant::now())
    }

    /// Like [`check_and_mark`](Self::check_and_mark), with the clock supplied by the caller.
    ///
    /// Callers should pass non-decreasing instants; an instant earlier than a
    /// stored entry is treated as zero elapsed time.
    pub fn check_and_mark_at(&self, event_id: &str, now: Instant) -> bool {
        let ttl = self.config.ttl;
        let mut inner = self.inner.lock();

        if now.saturating_duration_since(inner.last_cleanup) > self.config.cleanup_interval {
            let swept = inner.sweep_expired(now, ttl);
            inner.last_cleanup = now;
            if swept > 0 {
                info!(
                    expired_count = swept,
                    cache_size = inner.index.len(),
                    "Swept expired dedupe entries"
                );
            }
        }

        if let Some(entry) = inner.index.get(event_id).copied() {
            if now.saturating_duration_since(entry.admitted_at) <= ttl {
                return true;
            }
            // Expired but not yet swept: forget it and admit afresh
            inner.remove(event_id);
        }

        inner.insert(event_id, now);

        while inner.index.len() > self.config.capacity {
            let Some(evicted) = inner.evict_oldest() else {
                break;
            };
            debug!(event_id = %evicted, "Evicted oldest dedupe entry at capacity");
        }

        false
    }

    /// Number of ids currently remembered, expired-but-unswept ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `event_id` is currently held, regardless of age.
    ///
    /// Read-only; does not admit, sweep, or expire anything.
    pub fn contains(&self, event_id: &str) -> bool {
        self.inner.lock().index.contains_key(event_id)
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl Default for DedupeCache {
    fn default() -> Self {
        Self::with_config(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn first_call_admits_second_is_duplicate() {
        let cache = DedupeCache::new(10, HOUR);
        assert!(!cache.check_and_mark("Ev1"));
        assert!(cache.check_and_mark("Ev1"));
        assert!(cache.check_and_mark("Ev1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_ids_are_independent() {
        let cache = DedupeCache::new(100, HOUR);
        for i in 0..50 {
            assert!(!cache.check_and_mark(&format!("Ev{}", i)));
        }
        assert_eq!(cache.len(), 50);
        for i in 0..50 {
            assert!(cache.contains(&format!("Ev{}", i)));
        }
    }

    #[test]
    fn concurrent_same_id_admits_exactly_once() {
        const THREADS: usize = 10;

        let cache = Arc::new(DedupeCache::new(100, HOUR));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    cache.check_and_mark("Ev-race")
                })
            })
            .collect();

        let results: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|dup| !**dup).count(), 1);
        assert_eq!(results.iter().filter(|dup| **dup).count(), THREADS - 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_many_ids_each_admitted_once() {
        const THREADS: usize = 8;
        const IDS: usize = 200;

        let cache = Arc::new(DedupeCache::new(IDS, HOUR));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    (0..IDS)
                        .filter(|i| !cache.check_and_mark(&format!("Ev{}", i)))
                        .count()
                })
            })
            .collect();

        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, IDS);
        assert_eq!(cache.len(), IDS);
    }

    #[test]
    fn expired_entry_is_readmitted() {
        let cache = DedupeCache::new(10, Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(!cache.check_and_mark_at("Ev1", t0));
        assert!(cache.check_and_mark_at("Ev1", t0 + Duration::from_millis(500)));
        assert!(cache.check_and_mark_at("Ev1", t0 + Duration::from_secs(1)));
        assert!(!cache.check_and_mark_at("Ev1", t0 + Duration::from_millis(1100)));
        assert_eq!(cache.len(), 1);

        // The re-admission starts a fresh TTL window
        assert!(cache.check_and_mark_at("Ev1", t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn expired_entry_is_readmitted_with_real_clock() {
        let cache = DedupeCache::new(10, Duration::from_secs(1));
        assert!(!cache.check_and_mark("Ev1"));
        thread::sleep(Duration::from_millis(1100));
        assert!(!cache.check_and_mark("Ev1"));
    }

    #[test]
    fn capacity_evicts_oldest_insertion() {
        let cache = DedupeCache::new(3, HOUR);
        for id in ["A", "B", "C", "D"] {
            assert!(!cache.check_and_mark(id));
        }

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("A"));

        assert!(cache.check_and_mark("B"));
        assert!(cache.check_and_mark("C"));
        assert!(cache.check_and_mark("D"));

        // A was forgotten, so it is admitted again (and evicts B)
        assert!(!cache.check_and_mark("A"));
        assert!(!cache.contains("B"));
    }

    #[test]
    fn duplicate_hit_does_not_refresh_position() {
        let cache = DedupeCache::new(3, HOUR);
        for id in ["A", "B", "C"] {
            cache.check_and_mark(id);
        }

        // Under LRU this hit would protect A; under FIFO it must not
        assert!(cache.check_and_mark("A"));
        assert!(!cache.check_and_mark("D"));

        assert!(!cache.contains("A"));
        assert!(cache.contains("B"));
    }

    #[test]
    fn readmitted_expired_entry_moves_to_newest_position() {
        let cache = DedupeCache::new(3, Duration::from_secs(10));
        let t0 = Instant::now();

        cache.check_and_mark_at("A", t0);
        cache.check_and_mark_at("B", t0 + Duration::from_secs(5));
        cache.check_and_mark_at("C", t0 + Duration::from_secs(6));

        // A expired; re-admitting it re-inserts at the back
        assert!(!cache.check_and_mark_at("A", t0 + Duration::from_secs(11)));
        assert!(!cache.check_and_mark_at("D", t0 + Duration::from_secs(12)));

        assert!(!cache.contains("B"));
        assert!(cache.contains("A"));
        assert!(cache.contains("C"));
        assert!(cache.contains("D"));
    }

    #[test]
    fn sweep_waits_for_cleanup_interval() {
        let cache = DedupeCache::with_config(CacheConfig {
            capacity: 100,
            ttl: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(60),
        });
        let t0 = Instant::now();

        cache.check_and_mark_at("old-1", t0);
        cache.check_and_mark_at("old-2", t0);

        // Expired, but the cleanup interval has not elapsed: nothing swept
        cache.check_and_mark_at("trigger-1", t0 + Duration::from_secs(30));
        assert!(cache.contains("old-1"));
        assert!(cache.contains("old-2"));
        assert_eq!(cache.len(), 3);

        // Past the interval: both expired entries go, the fresh one stays
        cache.check_and_mark_at("trigger-2", t0 + Duration::from_secs(61));
        assert!(!cache.contains("old-1"));
        assert!(!cache.contains("old-2"));
        assert!(!cache.contains("trigger-1"));
        assert!(cache.contains("trigger-2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn sweep_keeps_unexpired_entries() {
        let cache = DedupeCache::with_config(CacheConfig {
            capacity: 100,
            ttl: Duration::from_secs(100),
            cleanup_interval: Duration::from_secs(10),
        });
        let t0 = Instant::now();

        cache.check_and_mark_at("a", t0);
        cache.check_and_mark_at("b", t0 + Duration::from_secs(50));
        cache.check_and_mark_at("c", t0 + Duration::from_secs(120));

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert!(cache.check_and_mark_at("b", t0 + Duration::from_secs(121)));
    }

    #[test]
    fn zero_capacity_never_reports_duplicates() {
        let cache = DedupeCache::new(0, HOUR);
        assert!(!cache.check_and_mark("Ev1"));
        assert!(!cache.check_and_mark("Ev1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn instances_are_independent() {
        let a = DedupeCache::new(10, HOUR);
        let b = DedupeCache::new(10, HOUR);

        assert!(!a.check_and_mark("Ev1"));
        assert!(!b.check_and_mark("Ev1"));
        assert!(a.check_and_mark("Ev1"));
    }

    #[test]
    fn default_matches_constants() {
        let cache = DedupeCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        assert_eq!(cache.ttl(), DEFAULT_TTL);
        assert_eq!(cache.config().cleanup_interval, DEFAULT_CLEANUP_INTERVAL);
        assert!(cache.is_empty());
    }

    proptest! {
        /// Property: the cache never holds more than `capacity` entries, and
        /// the index and the insertion order stay in sync.
        #[test]
        fn prop_len_bounded_by_capacity(
            capacity in 1usize..20,
            ids in prop::collection::vec("[a-e]{1,2}", 0..200),
        ) {
            let cache = DedupeCache::new(capacity, HOUR);
            for id in &ids {
                cache.check_and_mark(id);
                prop_assert!(cache.len() <= capacity);
            }
            let inner = cache.inner.lock();
            prop_assert_eq!(inner.index.len(), inner.order.len());
        }

        /// Property: with enough capacity and no expiry, `check_and_mark`
        /// reports exactly "seen before in this sequence".
        #[test]
        fn prop_matches_set_semantics(ids in prop::collection::vec("[a-z]{1,3}", 0..100)) {
            let cache = DedupeCache::new(1000, HOUR);
            let mut seen = std::collections::HashSet::new();
            for id in &ids {
                let expected_duplicate = !seen.insert(id.clone());
                prop_assert_eq!(cache.check_and_mark(id), expected_duplicate);
            }
        }
    }
}
