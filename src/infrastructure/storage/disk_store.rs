//! Sharded, size-bounded object store on the local filesystem.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::domain::{ObjectHash, ObjectStorePort, StoreError, StoreResult};

/// Maximum store size in bytes (1 GiB default).
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

/// Default number of hash characters used as the shard directory name.
pub const DEFAULT_SHARD_PREFIX_LEN: usize = 2;

/// Stores objects as `<root>/<hash prefix>/<hash>`.
///
/// Keeps running totals of size and count. When a write pushes the total over
/// the budget, the least recently used objects are removed until the store is
/// 10% under budget. Removed hashes are queued for [`Self::drain_evicted`] so
/// their metadata can be dropped as well.
pub struct DiskObjectStore {
    root: PathBuf,
    max_size: u64,
    shard_prefix_len: usize,
    current_size: AtomicU64,
    item_count: AtomicUsize,
    evicted: Mutex<Vec<ObjectHash>>,
}

impl DiskObjectStore {
    /// Opens a store rooted at `root`, creating it if needed.
    ///
    /// # Errors
    /// Returns error if the root directory cannot be created or scanned.
    pub async fn new(root: PathBuf, max_size: u64, shard_prefix_len: usize) -> StoreResult<Self> {
        fs::create_dir_all(&root).await?;

        let store = Self {
            root,
            max_size,
            shard_prefix_len: shard_prefix_len.clamp(1, ObjectHash::LEN),
            current_size: AtomicU64::new(0),
            item_count: AtomicUsize::new(0),
            evicted: Mutex::new(Vec::new()),
        };

        let objects = store.scan().await?;
        let total: u64 = objects.iter().map(|o| o.size).sum();
        store.current_size.store(total, Ordering::Relaxed);
        store.item_count.store(objects.len(), Ordering::Relaxed);
        debug!(
            root = %store.root.display(),
            size = total,
            count = objects.len(),
            "Opened object store"
        );

        store.enforce_limit().await;
        Ok(store)
    }

    fn object_path(&self, hash: &ObjectHash) -> PathBuf {
        self.root
            .join(hash.prefix(self.shard_prefix_len))
            .join(hash.as_str())
    }

    /// Returns the current store size in bytes.
    pub fn current_size(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.item_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Takes the hashes removed by eviction since the last call.
    pub fn drain_evicted(&self) -> Vec<ObjectHash> {
        std::mem::take(&mut *self.evicted.lock())
    }

    /// Puts hashes back on the eviction queue for a later drain.
    pub fn requeue_evicted(&self, hashes: impl IntoIterator<Item = ObjectHash>) {
        self.evicted.lock().extend(hashes);
    }

    async fn write_then_rename(tmp: &Path, path: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        drop(file);
        fs::rename(tmp, path).await
    }

    /// Evicts least recently used objects if the store is over budget.
    ///
    /// Returns the number of objects removed.
    pub async fn enforce_limit(&self) -> usize {
        let current_size = self.current_size();
        if current_size <= self.max_size {
            return 0;
        }

        debug!(
            current_size,
            max_size = self.max_size,
            "Object store over limit, evicting"
        );

        let Ok(mut objects) = self.scan().await else {
            return 0;
        };
        objects.sort_by_key(|o| o.last_used);

        let target = current_size - self.max_size + (self.max_size / 10);
        let mut freed_size = 0u64;
        let mut removed = Vec::new();

        for object in objects {
            if freed_size >= target {
                break;
            }
            match fs::remove_file(&object.path).await {
                Ok(()) => {
                    trace!(hash = %object.hash, "Evicted object");
                    freed_size += object.size;
                    removed.push(object.hash);
                }
                Err(e) => warn!(path = %object.path.display(), error = %e, "Failed to evict object"),
            }
        }

        let count = removed.len();
        self.current_size.fetch_sub(freed_size.min(self.current_size()), Ordering::Relaxed);
        self.item_count.fetch_sub(count.min(self.len()), Ordering::Relaxed);
        self.evicted.lock().extend(removed);

        debug!(freed_size, freed_count = count, "Object store eviction complete");
        count
    }

    async fn scan(&self) -> StoreResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut shards = fs::read_dir(&self.root).await?;

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await.is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let mut entries = fs::read_dir(shard.path()).await?;
            while let Ok(Some(entry)) = entries.next_entry().await {
                let name = entry.file_name();
                let Some(hash) = name.to_str().and_then(ObjectHash::parse) else {
                    continue;
                };
                if let Ok(meta) = entry.metadata().await {
                    let last_used = meta
                        .modified()
                        .or_else(|_| meta.accessed())
                        .unwrap_or(SystemTime::UNIX_EPOCH);
                    objects.push(StoredObject {
                        path: entry.path(),
                        hash,
                        size: meta.len(),
                        last_used,
                    });
                }
            }
        }
        Ok(objects)
    }
}

struct StoredObject {
    path: PathBuf,
    hash: ObjectHash,
    size: u64,
    last_used: SystemTime,
}

/// Bumps the modification time so eviction treats the object as recently used.
fn touch(path: &Path) {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Ok(file) = std::fs::File::options().append(true).open(&path) {
            let _ = file.set_modified(SystemTime::now());
        }
    });
}

#[async_trait]
impl ObjectStorePort for DiskObjectStore {
    async fn get(&self, hash: &ObjectHash) -> StoreResult<Bytes> {
        let path = self.object_path(hash);
        match fs::read(&path).await {
            Ok(data) => {
                trace!(hash = %hash, "Object store hit");
                touch(&path);
                Ok(Bytes::from(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(hash.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, hash: &ObjectHash, data: Bytes) -> StoreResult<()> {
        let path = self.object_path(hash);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let old_size = fs::metadata(&path).await.map(|m| m.len()).ok();

        let tmp = path.with_extension("tmp");
        if let Err(e) = Self::write_then_rename(&tmp, &path, &data).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp file");
            }
            return Err(e.into());
        }

        let new_size = data.len() as u64;
        if let Some(old) = old_size {
            if new_size > old {
                self.current_size.fetch_add(new_size - old, Ordering::Relaxed);
            } else {
                self.current_size.fetch_sub(old - new_size, Ordering::Relaxed);
            }
        } else {
            self.current_size.fetch_add(new_size, Ordering::Relaxed);
            self.item_count.fetch_add(1, Ordering::Relaxed);
        }

        debug!(hash = %hash, size = new_size, "Stored object");
        self.enforce_limit().await;
        Ok(())
    }

    async fn delete(&self, hash: &ObjectHash) -> StoreResult<()> {
        let path = self.object_path(hash);
        let size = fs::metadata(&path).await.map(|m| m.len()).ok();
        match fs::remove_file(&path).await {
            Ok(()) => {
                if let Some(s) = size {
                    self.current_size.fetch_sub(s.min(self.current_size()), Ordering::Relaxed);
                    self.item_count.fetch_sub(usize::from(self.len() > 0), Ordering::Relaxed);
                }
                debug!(hash = %hash, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Returns the default object directory path.
#[must_use]
pub fn default_object_dir() -> PathBuf {
    directories::ProjectDirs::from("org", "optiproxy", "optiproxy").map_or_else(
        || std::env::temp_dir().join("optiproxy").join("objects"),
        |dirs| dirs.cache_dir().join("objects"),
    )
}
