use crate::core::entry::CacheEntry;
use crate::core::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// A named, disjoint keyspace of raw values.
#[async_trait]
pub trait CachePartition: Send + Sync {
    fn name(&self) -> &str;
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn delete_all(&self) -> Result<()>;
    async fn keys(&self) -> Result<Vec<String>>;

    async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }
}

/// Registry that owns every partition.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Opens or creates a partition. Calling it twice returns the same partition.
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>>;
    async fn list_partitions(&self) -> Result<BTreeSet<String>>;
    /// Returns false when no partition by that name existed.
    async fn delete_partition(&self, name: &str) -> Result<bool>;
}

impl dyn CachePartition {
    pub async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self.get(key).await? {
            Some(bytes) => {
                debug!(partition = self.name(), key, "Cache HIT");
                Ok(Some(CacheEntry::decode(&bytes)?))
            }
            None => {
                debug!(partition = self.name(), key, "Cache MISS");
                Ok(None)
            }
        }
    }

    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<()> {
        self.put(&entry.key, entry.encode()?).await?;
        debug!(partition = self.name(), key = %entry.key, "Cache PUT");
        Ok(())
    }
}
