//! Background task keeping metadata in step with the object store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::disk_store::DiskObjectStore;
use crate::application::MetadataManager;

/// Default interval between sweeps.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Periodically enforces the store budget and drops metadata of evicted objects.
pub struct StoreSweeper {
    store: Arc<DiskObjectStore>,
    metadata: Arc<MetadataManager>,
    interval: Duration,
}

impl StoreSweeper {
    /// Creates a sweeper running every `interval`.
    #[must_use]
    pub const fn new(
        store: Arc<DiskObjectStore>,
        metadata: Arc<MetadataManager>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            metadata,
            interval,
        }
    }

    /// Runs one sweep. Returns the number of metadata records removed.
    ///
    /// Hashes whose metadata could not be deleted are queued again for the next sweep.
    pub async fn sweep(&self) -> usize {
        self.store.enforce_limit().await;

        let evicted = self.store.drain_evicted();
        if evicted.is_empty() {
            return 0;
        }

        let total = evicted.len();
        let mut failed = Vec::new();
        for hash in evicted {
            if let Err(e) = self.metadata.delete_by_hash(&hash).await {
                warn!(hash = %hash, error = %e, "Failed to delete metadata of evicted object");
                failed.push(hash);
            }
        }
        let removed = total - failed.len();
        if !failed.is_empty() {
            self.store.requeue_evicted(failed);
        }
        debug!(evicted = total, removed, "Sweep complete");
        removed
    }

    /// Spawns the sweep loop, stopping when `shutdown` fires.
    pub fn spawn(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_secs = self.interval.as_secs(), "Store sweeper started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                    _ = shutdown.recv() => {
                        info!("Store sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::metadata_manager::{DEFAULT_CAPACITY, DEFAULT_TTL};
    use crate::domain::ports::mocks::InMemoryMetadataRepository;
    use crate::domain::{ImageMetadata, LogicalRequest, ObjectStorePort};
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_removes_metadata_of_evicted_objects() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            DiskObjectStore::new(temp.path().to_path_buf(), 10, 2)
                .await
                .unwrap(),
        );
        let repo = Arc::new(InMemoryMetadataRepository::new());
        let metadata = Arc::new(MetadataManager::new(repo.clone(), DEFAULT_CAPACITY, DEFAULT_TTL));

        let old = LogicalRequest::new("https://example.com/old.png", 0, 0, 80);
        let new = LogicalRequest::new("https://example.com/new.png", 0, 0, 80);
        for request in [&old, &new] {
            let payload = b"123456";
            store
                .put(&request.object_hash(), Bytes::from_static(payload))
                .await
                .unwrap();
            metadata
                .persist(&ImageMetadata::for_payload(
                    request.source_url.as_str(),
                    request.object_hash(),
                    payload,
                    "image/png",
                    100,
                    "image/webp",
                ))
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let sweeper = StoreSweeper::new(store, metadata.clone(), DEFAULT_INTERVAL);
        assert_eq!(sweeper.sweep().await, 1);
        assert_eq!(repo.row_count(), 1);
        assert!(metadata.retrieve(&old.object_hash()).await.unwrap().is_none());
        assert!(metadata.retrieve(&new.object_hash()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_deletion_is_retried_next_sweep() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            DiskObjectStore::new(temp.path().to_path_buf(), 1024, 2)
                .await
                .unwrap(),
        );
        let repo = Arc::new(InMemoryMetadataRepository::new());
        let metadata = Arc::new(MetadataManager::new(repo.clone(), DEFAULT_CAPACITY, DEFAULT_TTL));

        let request = LogicalRequest::new("https://example.com/gone.png", 0, 0, 80);
        let hash = request.object_hash();
        metadata
            .persist(&ImageMetadata::for_payload(
                request.source_url.as_str(),
                hash.clone(),
                b"123456",
                "image/png",
                100,
                "image/webp",
            ))
            .await
            .unwrap();
        store.requeue_evicted([hash.clone()]);

        let sweeper = StoreSweeper::new(store.clone(), metadata.clone(), DEFAULT_INTERVAL);
        repo.set_fail_writes(true);
        assert_eq!(sweeper.sweep().await, 0);
        assert_eq!(repo.row_count(), 1);

        repo.set_fail_writes(false);
        assert_eq!(sweeper.sweep().await, 1);
        assert_eq!(repo.row_count(), 0);
        assert!(store.drain_evicted().is_empty());
    }

    #[tokio::test]
    async fn test_spawned_sweeper_stops_on_shutdown() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(
            DiskObjectStore::new(temp.path().to_path_buf(), 1024, 2)
                .await
                .unwrap(),
        );
        let repo = Arc::new(InMemoryMetadataRepository::new());
        let metadata = Arc::new(MetadataManager::new(repo, DEFAULT_CAPACITY, DEFAULT_TTL));
        let (tx, rx) = broadcast::channel(1);

        let handle = StoreSweeper::new(store, metadata, Duration::from_millis(10)).spawn(rx);
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
