//! Deferred writes recorded while offline and replayed on reconnect.
//!
//! Tasks live in their own store, apart from the cache partitions, so
//! activation never garbage-collects them. Keys are zero-padded ids and
//! replay walks them in ascending order, which makes the queue FIFO.

use crate::core::cache::{CachePartition, CacheStore};
use crate::core::error::{CacheError, Result};
use crate::core::request::Request;
use crate::core::transport::Transport;
use crate::notify::{Notification, Notifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

const QUEUE_PARTITION: &str = "pending-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDomain {
    Portfolio,
    Alerts,
    Price,
}

impl Display for SyncDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SyncDomain::Portfolio => "portfolio",
                SyncDomain::Alerts => "alerts",
                SyncDomain::Price => "price",
            }
        )
    }
}

impl FromStr for SyncDomain {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "portfolio" => Ok(SyncDomain::Portfolio),
            "alerts" => Ok(SyncDomain::Alerts),
            "price" => Ok(SyncDomain::Price),
            _ => Err(anyhow::anyhow!("Invalid sync domain: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    pub domain: SyncDomain,
    pub payload: serde_json::Value,
    pub id: u64,
}

/// The domain collaborator a task is replayed against.
#[async_trait]
pub trait SyncTarget: Send + Sync {
    async fn apply(&self, task: &SyncTask) -> anyhow::Result<()>;
}

/// Replays a task by POSTing its payload to `{endpoint}/{domain}`.
pub struct HttpSyncTarget {
    transport: Arc<dyn Transport>,
    endpoint: Url,
}

impl HttpSyncTarget {
    pub fn new(transport: Arc<dyn Transport>, endpoint: Url) -> Self {
        Self {
            transport,
            endpoint,
        }
    }

    /// One target per domain, all posting to the same endpoint.
    pub fn for_all_domains(
        transport: Arc<dyn Transport>,
        endpoint: Url,
    ) -> HashMap<SyncDomain, Arc<dyn SyncTarget>> {
        let target: Arc<dyn SyncTarget> = Arc::new(Self::new(transport, endpoint));
        [SyncDomain::Portfolio, SyncDomain::Alerts, SyncDomain::Price]
            .into_iter()
            .map(|domain| (domain, target.clone()))
            .collect()
    }
}

#[async_trait]
impl SyncTarget for HttpSyncTarget {
    async fn apply(&self, task: &SyncTask) -> anyhow::Result<()> {
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        let url = base.join(&task.domain.to_string())?;
        let response = self
            .transport
            .fetch(&Request::post_json(url, &task.payload))
            .await?;
        if !response.is_success() {
            anyhow::bail!("HTTP error: {} for sync task {}", response.status, task.id);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub replayed: Vec<u64>,
    pub retained: Vec<(u64, String)>,
}

pub struct SyncQueue {
    partition: Arc<dyn CachePartition>,
    next_id: AtomicU64,
    // held for a whole replay so a task is never dispatched twice
    replaying: Mutex<()>,
}

impl SyncQueue {
    pub async fn open(store: &dyn CacheStore) -> Result<Self> {
        let partition = store.open(QUEUE_PARTITION).await?;
        let next_id = partition
            .keys()
            .await?
            .iter()
            .filter_map(|key| key.parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        debug!(next_id, "Opened sync queue");
        Ok(Self {
            partition,
            next_id: AtomicU64::new(next_id),
            replaying: Mutex::new(()),
        })
    }

    fn key(id: u64) -> String {
        format!("{id:020}")
    }

    pub async fn enqueue(
        &self,
        domain: SyncDomain,
        payload: serde_json::Value,
    ) -> Result<SyncTask> {
        let task = SyncTask {
            domain,
            payload,
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        self.partition
            .put(&Self::key(task.id), serde_json::to_vec(&task)?)
            .await?;
        debug!(id = task.id, %domain, "Queued sync task");
        Ok(task)
    }

    /// Pending tasks, oldest first. Tasks that no longer decode are dropped.
    pub async fn pending(&self) -> Result<Vec<SyncTask>> {
        let mut keys = self.partition.keys().await?;
        keys.sort();

        let mut tasks = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(bytes) = self.partition.get(&key).await? else {
                continue;
            };
            match serde_json::from_slice::<SyncTask>(&bytes) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    warn!(key, error = %e, "Dropping undecodable sync task");
                    self.partition.delete(&key).await?;
                }
            }
        }
        Ok(tasks)
    }

    /// Replays every pending task. A task is removed only once its target
    /// accepts it; failures stay queued for the next run. Concurrent calls
    /// run one after the other.
    pub async fn replay(
        &self,
        targets: &HashMap<SyncDomain, Arc<dyn SyncTarget>>,
        notifier: Option<&Notifier>,
    ) -> Result<SyncReport> {
        let _guard = self.replaying.lock().await;
        let mut report = SyncReport::default();
        let mut portfolio_seen = false;
        let mut portfolio_ok = true;

        for task in self.pending().await? {
            let outcome = match targets.get(&task.domain) {
                Some(target) => target.apply(&task).await.map_err(|e| e.to_string()),
                None => Err(format!("no target registered for {}", task.domain)),
            };
            if task.domain == SyncDomain::Portfolio {
                portfolio_seen = true;
                portfolio_ok &= outcome.is_ok();
            }

            match outcome {
                Ok(()) => {
                    self.partition.delete(&Self::key(task.id)).await?;
                    if let (SyncDomain::Price, Some(notifier)) = (task.domain, notifier) {
                        notifier.send(Notification::PriceUpdate {
                            data: task.payload.clone(),
                        });
                    }
                    report.replayed.push(task.id);
                }
                Err(reason) => {
                    let failure = CacheError::SyncTaskFailure {
                        id: task.id,
                        domain: task.domain.to_string(),
                        reason: reason.clone(),
                    };
                    warn!(error = %failure, "Keeping task for retry");
                    report.retained.push((task.id, reason));
                }
            }
        }

        if let (true, Some(notifier)) = (portfolio_seen, notifier) {
            notifier.send(Notification::PortfolioSyncComplete {
                success: portfolio_ok,
            });
        }
        info!(
            replayed = report.replayed.len(),
            retained = report.retained.len(),
            "Sync replay finished"
        );
        Ok(report)
    }
}
