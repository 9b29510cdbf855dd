//! Content-addressed access to optimized payloads.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::domain::{LogicalRequest, ObjectHash, ObjectStorePort, ProxyError, ProxyResult};

/// Maps logical requests onto the object store.
pub struct ObjectCache {
    store: Arc<dyn ObjectStorePort>,
}

impl ObjectCache {
    /// Creates a cache over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStorePort>) -> Self {
        Self { store }
    }

    /// Returns the address under which `request` is stored.
    #[must_use]
    pub fn hash_for(request: &LogicalRequest) -> ObjectHash {
        request.object_hash()
    }

    /// Looks up the stored payload for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::CacheRead`] for any store failure other than a
    /// missing object, which is reported as `Ok(None)`.
    pub async fn lookup(&self, request: &LogicalRequest) -> ProxyResult<Option<Bytes>> {
        let hash = Self::hash_for(request);
        match self.store.get(&hash).await {
            Ok(data) => {
                debug!(hash = %hash, size = data.len(), "Object cache hit");
                Ok(Some(data))
            }
            Err(e) if e.is_not_found() => {
                debug!(hash = %hash, "Object cache miss");
                Ok(None)
            }
            Err(e) => Err(ProxyError::CacheRead {
                message: e.to_string(),
            }),
        }
    }

    /// Stores `data` for `request`. Failures are logged and swallowed.
    pub async fn store(&self, request: &LogicalRequest, data: Bytes) {
        let hash = Self::hash_for(request);
        if let Err(e) = self.store.put(&hash, data).await {
            warn!(hash = %hash, url = %request.source_url, error = %e, "Failed to store optimized object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockObjectStorePort;
    use crate::domain::ports::mocks::InMemoryObjectStore;
    use crate::domain::StoreError;

    fn request() -> LogicalRequest {
        LogicalRequest::new("https://example.com/a.png", 100, 0, 80)
    }

    #[tokio::test]
    async fn test_store_then_lookup() {
        let store = Arc::new(InMemoryObjectStore::new());
        let cache = ObjectCache::new(store.clone());

        assert!(cache.lookup(&request()).await.unwrap().is_none());
        cache.store(&request(), Bytes::from_static(b"webp")).await;

        let found = cache.lookup(&request()).await.unwrap();
        assert_eq!(found.as_deref(), Some(&b"webp"[..]));
        assert!(store.contains(&request().object_hash()));
    }

    #[tokio::test]
    async fn test_failed_store_is_swallowed() {
        let store = Arc::new(InMemoryObjectStore::new());
        store.set_fail_puts(true);
        let cache = ObjectCache::new(store.clone());

        cache.store(&request(), Bytes::from_static(b"webp")).await;
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let mut store = MockObjectStorePort::new();
        store
            .expect_get()
            .returning(|_| Err(StoreError::Unavailable("disk offline".to_string())));
        let cache = ObjectCache::new(Arc::new(store));

        let err = cache.lookup(&request()).await.unwrap_err();
        assert!(matches!(err, ProxyError::CacheRead { .. }));
    }

    #[tokio::test]
    async fn test_lookup_uses_request_hash() {
        let expected = request().object_hash();
        let mut store = MockObjectStorePort::new();
        store
            .expect_get()
            .withf(move |hash| *hash == expected)
            .times(1)
            .returning(|_| Ok(Bytes::from_static(b"x")));
        let cache = ObjectCache::new(Arc::new(store));

        assert!(cache.lookup(&request()).await.unwrap().is_some());
    }
}
