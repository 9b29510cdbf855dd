//! Object store port definition.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::ObjectHash;
use crate::domain::errors::StoreResult;

/// Port for content-addressed blob storage.
///
/// A missing object must be reported as [`crate::domain::StoreError::NotFound`].
/// Implementations must be safe for concurrent use.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Reads the payload stored under `hash`.
    async fn get(&self, hash: &ObjectHash) -> StoreResult<Bytes>;

    /// Stores `data` under `hash`, overwriting any previous payload.
    async fn put(&self, hash: &ObjectHash, data: Bytes) -> StoreResult<()>;

    /// Removes the payload stored under `hash`.
    async fn delete(&self, hash: &ObjectHash) -> StoreResult<()>;
}
