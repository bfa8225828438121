use crate::core::cache::{CachePartition, CacheStore};
use crate::core::error::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// In-memory partition; contents are lost when the process exits.
pub struct MemoryPartition {
    name: String,
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPartition {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl CachePartition for MemoryPartition {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        debug!(partition = %self.name, key, "Cache REMOVE");
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.clear();
        debug!(partition = %self.name, "Cache CLEAR");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().await;
        Ok(entries.keys().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().await.len())
    }
}

/// Registry of in-memory partitions, used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Arc<MemoryPartition>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>> {
        if let Some(partition) = self.partitions.read().await.get(name) {
            return Ok(partition.clone());
        }
        let mut partitions = self.partitions.write().await;
        let partition = partitions
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(partition = name, "Creating memory partition");
                Arc::new(MemoryPartition::new(name))
            })
            .clone();
        Ok(partition)
    }

    async fn list_partitions(&self) -> Result<BTreeSet<String>> {
        Ok(self.partitions.read().await.keys().cloned().collect())
    }

    async fn delete_partition(&self, name: &str) -> Result<bool> {
        let removed = self.partitions.write().await.remove(name);
        if let Some(partition) = &removed {
            // Outstanding handles must not keep serving deleted entries.
            partition.delete_all().await?;
        }
        Ok(removed.is_some())
    }
}
