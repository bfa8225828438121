//! Periodic expiry sweep over the non-static partitions.

use crate::core::entry::{CacheEntry, now_millis};
use crate::core::error::Result;
use crate::core::partition::PartitionKind;
use crate::engine::Engine;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub evicted: usize,
}

pub struct MaintenanceScheduler {
    engine: Engine,
    period: Duration,
}

impl MaintenanceScheduler {
    pub fn new(engine: Engine, period: Duration) -> Self {
        Self { engine, period }
    }

    /// Deletes every entry older than its class allows. Entries that no
    /// longer decode, or carry no marker, go too. A partition or key that
    /// fails is logged and skipped.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        let now = now_millis();

        for kind in [PartitionKind::Dynamic, PartitionKind::Api] {
            let name = self.engine.names().name(kind);
            if let Err(e) = self.sweep_partition(&name, now, &mut report).await {
                error!(partition = %name, error = %e, "Failed to sweep partition");
            }
        }

        info!(
            scanned = report.scanned,
            evicted = report.evicted,
            "Maintenance sweep finished"
        );
        Ok(report)
    }

    async fn sweep_partition(
        &self,
        name: &str,
        now: i64,
        report: &mut SweepReport,
    ) -> Result<()> {
        let partition = self.engine.store().open(name).await?;

        for key in partition.keys().await? {
            report.scanned += 1;
            let bytes = match partition.get(&key).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(partition = name, key, error = %e, "Failed to read entry");
                    continue;
                }
            };
            let expired = match CacheEntry::decode(&bytes) {
                Ok(entry) => self
                    .engine
                    .policies()
                    .is_stale(entry.class, entry.stored_at, now),
                Err(e) => {
                    warn!(partition = name, key, error = %e, "Dropping undecodable entry");
                    true
                }
            };
            if expired {
                match partition.delete(&key).await {
                    Ok(()) => report.evicted += 1,
                    Err(e) => {
                        warn!(partition = name, key, error = %e, "Failed to evict entry");
                    }
                }
            }
        }
        Ok(())
    }

    /// Sweeps once per period until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        debug!(
            interval_secs = self.period.as_secs(),
            "Maintenance scheduler started"
        );
        let mut ticker = interval(self.period);

        loop {
            tokio::select! {
                result = shutdown.recv() => {
                    match result {
                        Ok(()) | Err(broadcast::error::RecvError::Closed) => {
                            debug!("Maintenance scheduler received shutdown signal");
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(missed = n, "Maintenance shutdown receiver lagged");
                        }
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Maintenance sweep failed");
                    }
                }
            }
        }

        debug!("Maintenance scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::{CachePartition, CacheStore};
    use crate::core::classify::ContentClass;
    use crate::core::error::CacheError;
    use crate::engine::test_support::*;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    const MINUTE: i64 = 60_000;
    const DAY: i64 = 24 * 60 * MINUTE;

    #[tokio::test]
    async fn test_sweep_evicts_six_minute_old_api_entry() {
        let (engine, _transport, store) = engine();
        seed(&store, "api-v1", "/api/prices", "old", ContentClass::Api, Some(6 * MINUTE)).await;
        seed(&store, "api-v1", "/api/alerts", "new", ContentClass::Api, Some(MINUTE)).await;

        let report = MaintenanceScheduler::new(engine, Duration::from_secs(3600))
            .sweep()
            .await
            .unwrap();
        assert_eq!(report, SweepReport { scanned: 2, evicted: 1 });
        assert!(read(&store, "api-v1", "/api/prices").await.is_none());
        assert!(read(&store, "api-v1", "/api/alerts").await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_uses_entry_class_in_shared_partition() {
        let (engine, _transport, store) = engine();
        // two days: too old for a page, fine for an image
        seed(
            &store,
            "dynamic-v1",
            "/portfolio",
            "page",
            ContentClass::Dynamic,
            Some(2 * DAY),
        )
        .await;
        seed(
            &store,
            "dynamic-v1",
            "/coins/btc.png",
            "png",
            ContentClass::Image,
            Some(2 * DAY),
        )
        .await;
        seed(&store, "dynamic-v1", "/unmarked", "?", ContentClass::Dynamic, None).await;

        MaintenanceScheduler::new(engine, Duration::from_secs(3600))
            .sweep()
            .await
            .unwrap();
        assert!(read(&store, "dynamic-v1", "/portfolio").await.is_none());
        assert!(read(&store, "dynamic-v1", "/unmarked").await.is_none());
        assert!(read(&store, "dynamic-v1", "/coins/btc.png").await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_never_touches_static_partition() {
        let (engine, _transport, store) = engine();
        seed(&store, "static-v1", "/app.js", "js", ContentClass::Static, Some(400 * DAY)).await;

        MaintenanceScheduler::new(engine, Duration::from_secs(3600))
            .sweep()
            .await
            .unwrap();
        assert!(read(&store, "static-v1", "/app.js").await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_drops_undecodable_entries() {
        let (engine, _transport, store) = engine();
        let partition = store.open("api-v1").await.unwrap();
        partition.put("garbage", b"{not json".to_vec()).await.unwrap();

        let report = MaintenanceScheduler::new(engine, Duration::from_secs(3600))
            .sweep()
            .await
            .unwrap();
        assert_eq!(report.evicted, 1);
        assert!(partition.get("garbage").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_run_sweeps_until_shutdown() {
        let (engine, _transport, store) = engine();
        seed(&store, "api-v1", "/api/prices", "old", ContentClass::Api, Some(6 * MINUTE)).await;

        let scheduler = Arc::new(MaintenanceScheduler::new(engine, Duration::from_millis(10)));
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.run(rx).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert!(read(&store, "api-v1", "/api/prices").await.is_none());
    }

    /// Memory store that refuses to open one partition.
    struct BrokenPartitionStore {
        inner: Arc<MemoryStore>,
        broken: &'static str,
    }

    #[async_trait]
    impl CacheStore for BrokenPartitionStore {
        async fn open(&self, name: &str) -> Result<Arc<dyn CachePartition>> {
            if name == self.broken {
                return Err(CacheError::storage("disk gone"));
            }
            self.inner.open(name).await
        }

        async fn list_partitions(&self) -> Result<BTreeSet<String>> {
            self.inner.list_partitions().await
        }

        async fn delete_partition(&self, name: &str) -> Result<bool> {
            self.inner.delete_partition(name).await
        }
    }

    #[tokio::test]
    async fn test_sweep_continues_past_failed_partition() {
        let memory = Arc::new(MemoryStore::new());
        seed(&memory, "api-v1", "/api/prices", "old", ContentClass::Api, Some(6 * MINUTE)).await;
        let store = Arc::new(BrokenPartitionStore {
            inner: memory.clone(),
            broken: "dynamic-v1",
        });
        let engine = Engine::new(&config(), store, Arc::new(StubTransport::new())).unwrap();

        let report = MaintenanceScheduler::new(engine, Duration::from_secs(3600))
            .sweep()
            .await
            .unwrap();
        assert_eq!(report, SweepReport { scanned: 1, evicted: 1 });
        assert!(read(&memory, "api-v1", "/api/prices").await.is_none());
    }
}
