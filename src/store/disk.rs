use crate::core::cache::{CachePartition, CacheStore};
use crate::core::error::{CacheError, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// A cache partition backed by an fjall partition.
pub struct DiskPartition {
    name: String,
    keyspace: Arc<Keyspace>,
    partition: PartitionHandle,
}

#[async_trait]
impl CachePartition for DiskPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.partition.get(key)?.map(|value| value.to_vec()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.partition.insert(key, value)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.partition.remove(key)?;
        debug!(partition = %self.name, key, "Cache REMOVE");
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut batch = self.keyspace.batch();
        for key in self.partition.keys() {
            batch.remove(&self.partition, key?);
        }
        batch.commit()?;
        debug!(partition = %self.name, "Cache CLEAR");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.partition
            .keys()
            .map(|key| {
                let key = key?;
                String::from_utf8(key.to_vec()).map_err(|e| CacheError::Codec(e.to_string()))
            })
            .collect()
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.partition.len()?)
    }
}

/// Registry of persistent partitions living in one fjall keyspace.
pub struct DiskStore {
    keyspace: Arc<Keyspace>,
    partitions: RwLock<HashMap<String, Arc<DiskPartition>>>,
}

impl DiskStore {
    pub fn open_at(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(CacheError::storage)?;
        let keyspace = Config::new(path).open()?;
        debug!(path = %path.display(), "Opened cache keyspace");
        Ok(Self {
            keyspace: Arc::new(keyspace),
            partitions: RwLock::new(HashMap::new()),
        })
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            warn!(error = %e, "Failed to flush cache keyspace");
        }
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>> {
        if let Some(partition) = self.partitions.read().await.get(name) {
            return Ok(partition.clone());
        }
        let mut partitions = self.partitions.write().await;
        if let Some(partition) = partitions.get(name) {
            return Ok(partition.clone());
        }
        let handle = self
            .keyspace
            .open_partition(name, PartitionCreateOptions::default())?;
        let partition = Arc::new(DiskPartition {
            name: name.to_string(),
            keyspace: self.keyspace.clone(),
            partition: handle,
        });
        partitions.insert(name.to_string(), partition.clone());
        debug!(partition = name, "Opened disk partition");
        Ok(partition)
    }

    async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .keyspace
            .list_partitions()
            .iter()
            .map(|name| name.to_string())
            .collect())
    }

    async fn delete_partition(&self, name: &str) -> Result<bool> {
        let mut partitions = self.partitions.write().await;
        let handle = match partitions.remove(name) {
            Some(partition) => partition.partition.clone(),
            None if self.keyspace.partition_exists(name) => self
                .keyspace
                .open_partition(name, PartitionCreateOptions::default())?,
            None => return Ok(false),
        };
        self.keyspace.delete_partition(handle)?;
        debug!(partition = name, "Deleted disk partition");
        Ok(true)
    }
}
