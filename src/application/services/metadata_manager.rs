//! Cache-aside access to image metadata.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::memory_cache::{CacheStats, TtlLruCache};
use crate::domain::{ImageMetadata, MetadataRepository, MetadataResult, ObjectHash};

/// Default number of metadata records kept in memory.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default lifetime of an in-memory metadata record.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Fronts a [`MetadataRepository`] with a bounded in-memory LRU.
///
/// Writes go to the durable store first and only then to the LRU, so the LRU
/// never holds a record the durable store rejected.
pub struct MetadataManager {
    repository: Arc<dyn MetadataRepository>,
    cache: TtlLruCache<ObjectHash, ImageMetadata>,
}

impl MetadataManager {
    /// Creates a manager over `repository`.
    #[must_use]
    pub fn new(repository: Arc<dyn MetadataRepository>, capacity: usize, ttl: Duration) -> Self {
        Self {
            repository,
            cache: TtlLruCache::new(capacity, ttl),
        }
    }

    /// Stores `metadata`. An existing record with the same hash is kept.
    ///
    /// # Errors
    ///
    /// Returns the durable store error; the LRU is left untouched in that case.
    pub async fn persist(&self, metadata: &ImageMetadata) -> MetadataResult<()> {
        self.repository.insert_ignore(metadata).await?;
        self.cache
            .insert(metadata.object_hash.clone(), metadata.clone());
        debug!(hash = %metadata.object_hash, "Persisted metadata");
        Ok(())
    }

    /// Looks up metadata by hash, repopulating the LRU from the durable store.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store read fails. A missing row is `Ok(None)`.
    pub async fn retrieve(&self, hash: &ObjectHash) -> MetadataResult<Option<ImageMetadata>> {
        if let Some(metadata) = self.cache.get(hash) {
            return Ok(Some(metadata));
        }

        let found = self.repository.find_by_hash(hash).await?;
        if let Some(metadata) = &found {
            self.cache.insert(hash.clone(), metadata.clone());
        }
        Ok(found)
    }

    /// Returns every record produced from `original_url`. Bypasses the LRU.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable store read fails.
    pub async fn retrieve_all_for_url(&self, original_url: &str) -> MetadataResult<Vec<ImageMetadata>> {
        self.repository.find_by_url(original_url).await
    }

    /// Deletes `metadata` from the durable store, then from the LRU.
    ///
    /// # Errors
    ///
    /// Returns the durable store error; the LRU entry is kept in that case.
    pub async fn delete(&self, metadata: &ImageMetadata) -> MetadataResult<()> {
        self.delete_by_hash(&metadata.object_hash).await
    }

    /// Deletes whatever record is stored under `hash`.
    ///
    /// # Errors
    ///
    /// Returns the durable store error.
    pub async fn delete_by_hash(&self, hash: &ObjectHash) -> MetadataResult<()> {
        self.repository.delete_by_hash(hash).await?;
        self.cache.remove(hash);
        debug!(hash = %hash, "Deleted metadata");
        Ok(())
    }

    /// Releases the durable store.
    pub async fn close(&self) {
        self.cache.clear();
        self.repository.close().await;
    }

    /// In-memory cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Persists and logs instead of failing.
    pub async fn persist_tolerant(&self, metadata: &ImageMetadata) {
        if let Err(e) = self.persist(metadata).await {
            warn!(hash = %metadata.object_hash, error = %e, "Failed to persist metadata");
        }
    }
}
