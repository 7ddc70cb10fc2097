//! In-memory key/value cache with per-entry TTL.
//!
//! Holds the short-lived artifacts of the cross-application login: handoff
//! codes and the token bundles waiting behind authorization codes. Entries
//! live in a sharded map; a min-heap of expirations drives eviction. Reads
//! never return an expired value, whether or not it has been evicted yet.
//!
//! Every `set` evicts what has already expired and compacts the heap once
//! stale records outnumber live entries, so memory stays bounded without
//! [`TtlCache::spawn_cleanup_task`]. The task only makes eviction prompt
//! while no writes arrive.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

/// TTL applied when a caller passes a zero TTL: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Longest TTL honoured; larger values are clamped: 10 years.
pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Stale heap records tolerated before `set` considers compacting.
const COMPACT_SLACK: usize = 64;

#[derive(Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
    /// Distinguishes this write from earlier writes to the same key.
    generation: u64,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Heap item: earliest expiry on top.
type Expiration = Reverse<(Instant, u64, String)>;

/// Concurrent TTL cache. Share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: DashMap<String, CacheEntry>,
    expirations: Mutex<BinaryHeap<Expiration>>,
    next_generation: AtomicU64,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. A zero `ttl` means [`DEFAULT_TTL`]; a `ttl`
    /// above [`MAX_TTL`] is clamped.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>, ttl: Duration) {
        let key = key.into();
        let ttl = if ttl.is_zero() { DEFAULT_TTL } else { ttl.min(MAX_TTL) };
        let now = Instant::now();
        let expires_at = now + ttl;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);

        self.entries.insert(
            key.clone(),
            CacheEntry {
                value: value.into(),
                expires_at,
                generation,
            },
        );

        let mut heap = self
            .expirations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let evicted = self.evict_due(&mut heap, now);
        if evicted > 0 {
            debug!(evicted, "evicted expired cache entries on write");
        }
        heap.push(Reverse((expires_at, generation, key)));

        // Records of taken, deleted or overwritten entries.
        if heap.len() > COMPACT_SLACK && heap.len() > 2 * self.entries.len() {
            heap.retain(|Reverse((_, generation, key))| {
                self.entries
                    .get(key)
                    .is_some_and(|e| e.generation == *generation)
            });
        }
    }

    /// Value for `key` if present and not expired.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if entry.is_live(now) {
                return Some(entry.value.clone());
            }
        }
        self.entries.remove_if(key, |_, e| !e.is_live(now));
        None
    }

    /// Atomically remove `key` and return its value if it was live.
    ///
    /// Of any number of concurrent callers, at most one receives the value.
    pub fn take(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let (_, entry) = self.entries.remove(key)?;
        entry.is_live(now).then_some(entry.value)
    }

    /// Remove `key`. No-op when absent.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every entry whose TTL has passed. Returns the number evicted.
    pub fn purge_expired(&self) -> usize {
        let mut heap = self
            .expirations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let evicted = self.evict_due(&mut heap, Instant::now());
        if evicted > 0 {
            debug!(evicted, "purged expired cache entries");
        }
        evicted
    }

    /// Pop every heap record due at `now`, removing the entry it still owns.
    /// Callers hold the heap lock; entry shards are locked after it.
    fn evict_due(&self, heap: &mut BinaryHeap<Expiration>, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(Reverse((expires_at, _, _))) = heap.peek() {
            if *expires_at > now {
                break;
            }
            let Some(Reverse((_, generation, key))) = heap.pop() else {
                break;
            };
            // A later `set` on the same key owns the entry now.
            if self
                .entries
                .remove_if(&key, |_, e| e.generation == generation)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    /// Spawn a periodic eviction task on the current tokio runtime. Optional;
    /// writes evict on their own.
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                cache.purge_expired();
            }
        })
    }
}
