//! Durable metadata store port definition.

use async_trait::async_trait;

use crate::domain::entities::{ImageMetadata, ObjectHash};
use crate::domain::errors::MetadataResult;

/// Port for durable persistence of [`ImageMetadata`] keyed by object hash.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    /// Inserts a record, silently ignoring an existing row with the same hash.
    async fn insert_ignore(&self, metadata: &ImageMetadata) -> MetadataResult<()>;

    /// Looks up a record by hash. A missing row is `Ok(None)`.
    async fn find_by_hash(&self, hash: &ObjectHash) -> MetadataResult<Option<ImageMetadata>>;

    /// Returns every record produced from `original_url`.
    async fn find_by_url(&self, original_url: &str) -> MetadataResult<Vec<ImageMetadata>>;

    /// Deletes the record for `hash`, if any.
    async fn delete_by_hash(&self, hash: &ObjectHash) -> MetadataResult<()>;

    /// Releases the underlying connections.
    async fn close(&self);
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::domain::errors::MetadataError;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory metadata repository for testing.
    #[derive(Default)]
    pub struct InMemoryMetadataRepository {
        rows: Mutex<Vec<ImageMetadata>>,
        lookups: AtomicUsize,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
    }

    impl InMemoryMetadataRepository {
        /// Creates empty repository.
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `find_by_hash` calls that reached the repository.
        pub fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        /// Number of stored rows.
        pub fn row_count(&self) -> usize {
            self.rows.lock().len()
        }

        /// Makes reads fail.
        pub fn set_fail_reads(&self, value: bool) {
            self.fail_reads.store(value, Ordering::SeqCst);
        }

        /// Makes writes fail.
        pub fn set_fail_writes(&self, value: bool) {
            self.fail_writes.store(value, Ordering::SeqCst);
        }

        fn check(flag: &AtomicBool) -> MetadataResult<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(MetadataError::Unavailable("mock failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MetadataRepository for InMemoryMetadataRepository {
        async fn insert_ignore(&self, metadata: &ImageMetadata) -> MetadataResult<()> {
            Self::check(&self.fail_writes)?;
            let mut rows = self.rows.lock();
            if !rows.iter().any(|r| r.object_hash == metadata.object_hash) {
                rows.push(metadata.clone());
            }
            Ok(())
        }

        async fn find_by_hash(&self, hash: &ObjectHash) -> MetadataResult<Option<ImageMetadata>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Self::check(&self.fail_reads)?;
            Ok(self
                .rows
                .lock()
                .iter()
                .find(|r| &r.object_hash == hash)
                .cloned())
        }

        async fn find_by_url(&self, original_url: &str) -> MetadataResult<Vec<ImageMetadata>> {
            Self::check(&self.fail_reads)?;
            Ok(self
                .rows
                .lock()
                .iter()
                .filter(|r| r.original_url == original_url)
                .cloned()
                .collect())
        }

        async fn delete_by_hash(&self, hash: &ObjectHash) -> MetadataResult<()> {
            Self::check(&self.fail_writes)?;
            self.rows.lock().retain(|r| &r.object_hash != hash);
            Ok(())
        }

        async fn close(&self) {}
    }
}
