pub mod disk;
pub mod memory;

use crate::core::cache::{CachePartition, CacheStore};
use crate::core::error::{CacheError, Result};
use async_trait::async_trait;
use disk::DiskStore;
use memory::MemoryStore;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Stand-in registry for when the backing store cannot be opened. Every
/// operation fails with `StorageUnavailable`, so handlers fall back to
/// network-only behavior.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn open(&self, _name: &str) -> Result<Arc<dyn CachePartition>> {
        Err(CacheError::storage(&self.reason))
    }

    async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        Err(CacheError::storage(&self.reason))
    }

    async fn delete_partition(&self, _name: &str) -> Result<bool> {
        Err(CacheError::storage(&self.reason))
    }
}

/// Opens the persistent store at `path`, degrading to an unavailable store
/// if the keyspace cannot be opened.
pub fn open_persistent(path: &Path) -> Arc<dyn CacheStore> {
    match DiskStore::open_at(path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Cache store unavailable, serving network-only"
            );
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

pub fn open_ephemeral() -> Arc<dyn CacheStore> {
    Arc::new(MemoryStore::new())
}
