// # Resolution Cache
//
// Shared TTL cache consulted by the resolver and the detector before any
// network I/O.
//
// ## Expiry
//
// - Entries carry a monotonic `expires_at` (`tokio::time::Instant`)
// - `get` drops an entry lazily once `now >= expires_at` and reports a miss
// - `purge_expired` (or a sweeper task) removes stale entries in bulk
//
// ## Concurrency
//
// Storage is a `HashMap` behind a `tokio::sync::RwLock`: reads proceed
// concurrently, writes are serialized, and every entry is inserted whole.
// Clones share the same storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Upper bound on an entry's lifetime; longer TTLs are clamped to it
const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + ttl` without overflowing the clock
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(MAX_TTL))
        .unwrap_or(now)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries currently stored, including expired ones not yet purged
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they expired or made room for a new one
    pub evictions: u64,
}

/// TTL cache shared between resolution pipelines
///
/// # Example
///
/// ```rust,no_run
/// use ipdef_core::ResolutionCache;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let cache: ResolutionCache<String> = ResolutionCache::new();
///
///     let ttl = Duration::from_secs(300);
///     cache.put("forward:example.com", "93.184.216.34".to_string(), ttl).await;
///     assert!(cache.get("forward:example.com").await.is_some());
/// }
/// ```
#[derive(Debug)]
pub struct ResolutionCache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for ResolutionCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> ResolutionCache<V> {
    /// Create an unbounded cache
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a cache holding at most `max_entries` entries
    ///
    /// When full, expired entries are dropped first, then the entry
    /// closest to expiry.
    pub fn with_capacity(max_entries: usize) -> Self {
        Self::build(Some(max_entries.max(1)))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(HashMap::new()),
                capacity,
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Look up a live entry
    ///
    /// An expired entry is removed and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        {
            let guard = self.inner.entries.read().await;
            match guard.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.inner.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                None => {
                    self.inner.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                Some(_) => {}
            }
        }

        self.recheck_stale(key, now).await
    }

    /// Slow path of [`get`](Self::get) for an entry seen expired under the read lock
    async fn recheck_stale(&self, key: &str, now: Instant) -> Option<V> {
        let mut guard = self.inner.entries.write().await;
        match guard.get(key) {
            // Refreshed by a concurrent put between the two locks
            Some(entry) if !entry.is_expired(now) => {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            Some(_) => {
                guard.remove(key);
                self.inner.evictions.fetch_add(1, Ordering::Relaxed);
                debug!("Cache entry '{}' expired", key);
            }
            None => {}
        }
        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store `value` under `key` for `ttl`, replacing any previous entry
    pub async fn put(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let entry = CacheEntry {
            value,
            expires_at: expiry(now, ttl),
        };

        let mut guard = self.inner.entries.write().await;
        if let Some(capacity) = self.inner.capacity
            && !guard.contains_key(&key)
            && guard.len() >= capacity
        {
            let evicted = Self::make_room(&mut guard, capacity, now);
            self.inner.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        guard.insert(key, entry);
    }

    fn make_room(
        entries: &mut HashMap<String, CacheEntry<V>>,
        capacity: usize,
        now: Instant,
    ) -> u64 {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let mut evicted = (before - entries.len()) as u64;

        while entries.len() >= capacity {
            let soonest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            match soonest {
                Some(key) => {
                    entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        evicted
    }

    /// Remove one entry; returns whether it was present
    pub async fn invalidate(&self, key: &str) -> bool {
        self.inner.entries.write().await.remove(key).is_some()
    }

    /// Remove every expired entry and return how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.inner.entries.write().await;
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(now));
        let purged = before - guard.len();
        self.inner.evictions.fetch_add(purged as u64, Ordering::Relaxed);
        purged
    }

    /// Remove every entry
    pub async fn clear(&self) {
        self.inner.entries.write().await.clear();
    }

    /// Number of stored entries, including expired ones not yet purged
    pub async fn len(&self) -> usize {
        self.inner.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.entries.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
        }
    }

    /// Spawn a task that purges expired entries every `period`
    ///
    /// The task stops on its own once every clone of the cache is dropped,
    /// or when the returned handle is aborted.
    pub fn spawn_sweeper(&self, period: Duration) -> JoinHandle<()> {
        let weak: Weak<Inner<V>> = Arc::downgrade(&self.inner);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    debug!("Cache dropped, sweeper exiting");
                    return;
                };
                let purged = ResolutionCache { inner }.purge_expired().await;
                if purged > 0 {
                    debug!("Sweeper purged {} expired cache entries", purged);
                }
            }
        })
    }
}

impl<V: Clone + Send + Sync + 'static> Default for ResolutionCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
