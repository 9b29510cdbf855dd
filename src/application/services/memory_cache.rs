//! In-memory LRU cache with per-entry expiry.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Capacity- and time-bounded LRU cache.
///
/// Thread-safe; callers never take an external lock. Expiry is fixed when an
/// entry is inserted and is not extended by reads.
pub struct TtlLruCache<K, V> {
    cache: Mutex<LruCache<K, Entry<V>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> TtlLruCache<K, V> {
    /// Creates a new cache with the specified capacity and entry lifetime.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the lifetime applied to new entries.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Gets a live entry, promoting it in the LRU order.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.cache.lock();
        let live = match cache.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(key);
                trace!("Memory cache entry expired");
                None
            }
            None => None,
        };
        if live.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        live
    }

    /// Peeks at a live entry without promoting it.
    pub fn peek(&self, key: &K) -> Option<V> {
        let cache = self.cache.lock();
        cache
            .peek(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Inserts or replaces an entry with a fresh expiry.
    pub fn insert(&self, key: K, value: V) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + self.ttl,
        };
        self.cache.lock().put(key, entry);
    }

    /// Removes an entry. Absent keys are not an error.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.cache.lock().pop(key).map(|entry| entry.value)
    }

    /// Number of entries, including ones that expired but were not yet read.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.cache.lock().clear();
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            hits,
            misses,
            hit_rate,
            size: self.len(),
        }
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Current number of entries.
    pub size: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} entries, {:.1}% hit rate ({} hits, {} misses)",
            self.size, self.hit_rate, self.hits, self.misses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: Duration = Duration::from_secs(60);

    #[test]
    fn test_cache_put_and_get() {
        let cache = TtlLruCache::new(10, LONG);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn test_cache_miss() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(10, LONG);
        assert!(cache.get(&"nonexistent").is_none());
    }

    #[test]
    fn test_cache_eviction() {
        let cache = TtlLruCache::new(2, LONG);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        // "a" should be evicted (LRU)
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_cache_stats() {
        let cache = TtlLruCache::new(10, LONG);
        cache.insert("a", 1);

        let _ = cache.get(&"a");
        let _ = cache.get(&"missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_peek_does_not_promote() {
        let cache = TtlLruCache::new(2, LONG);
        cache.insert("a", 1);
        cache.insert("b", 2);

        let _ = cache.peek(&"a");
        cache.insert("c", 3);

        assert!(cache.peek(&"a").is_none());
    }

    #[test]
    fn test_entries_expire() {
        let cache = TtlLruCache::new(10, Duration::from_millis(20));
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.peek(&"a").is_none());
        assert!(cache.get(&"a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let cache: TtlLruCache<&str, i32> = TtlLruCache::new(10, LONG);
        assert!(cache.remove(&"missing").is_none());
    }
}
