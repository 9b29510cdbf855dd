//! Short-lived cache of failed optimizations.

use std::time::Duration;

use tracing::debug;

use super::memory_cache::{CacheStats, TtlLruCache};
use crate::domain::{CacheKey, ProxyError};

/// Default number of remembered failures.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default lifetime of a remembered failure.
pub const DEFAULT_TTL: Duration = Duration::from_secs(120);

/// Remembers fetch and transcode failures so a broken origin is not hammered.
pub struct NegativeResultCache {
    entries: TtlLruCache<CacheKey, ProxyError>,
}

impl NegativeResultCache {
    /// Creates a cache bounded by `capacity` entries that live for `ttl`.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: TtlLruCache::new(capacity, ttl),
        }
    }

    /// Returns the remembered failure for `key`, if it has not expired.
    pub fn get(&self, key: &CacheKey) -> Option<ProxyError> {
        self.entries.get(key)
    }

    /// Records `error` for `key`. Errors that are not negative-cacheable are ignored.
    pub fn set(&self, key: &CacheKey, error: ProxyError) {
        if !error.is_negative_cacheable() {
            return;
        }
        debug!(key = %key, error = %error, "Remembering failed optimization");
        self.entries.insert(key.clone(), error);
    }

    /// Number of remembered failures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hit/miss statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

impl Default for NegativeResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogicalRequest;

    fn key() -> CacheKey {
        LogicalRequest::new("https://example.com/a.png", 100, 0, 80).cache_key()
    }

    #[test]
    fn test_remembers_fetch_failure() {
        let cache = NegativeResultCache::default();
        let err = ProxyError::fetch("https://example.com/a.png", "connection refused");
        cache.set(&key(), err.clone());
        assert_eq!(cache.get(&key()), Some(err));
    }

    #[test]
    fn test_ignores_server_side_failure() {
        let cache = NegativeResultCache::default();
        cache.set(
            &key(),
            ProxyError::CacheRead {
                message: "io".to_string(),
            },
        );
        assert!(cache.get(&key()).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entry_expires() {
        let cache = NegativeResultCache::new(10, Duration::from_millis(20));
        cache.set(&key(), ProxyError::corrupted("truncated"));
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key()).is_none());
    }
}
