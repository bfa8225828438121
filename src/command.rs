//! Foreground command protocol.
//!
//! Messages are JSON objects with a `type` tag and an optional `payload`.
//! Only `GET_CACHE_STATUS` produces a reply; the rest are side effects.

use crate::core::error::{CacheError, Result};
use crate::core::partition::PartitionKind;
use crate::engine::Engine;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    UpdateCache { partition: String, urls: Vec<String> },
    ClearCache { partition: Option<String> },
    Prefetch { urls: Vec<String> },
    GetStatus,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePayload {
    cache_name: String,
    urls: Vec<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ClearPayload {
    cache_name: Option<String>,
}

impl Command {
    pub fn parse(message: &serde_json::Value) -> Result<Self> {
        let envelope = Envelope::deserialize(message)
            .map_err(|e| CacheError::MalformedCommand(e.to_string()))?;
        let payload = envelope.payload;
        let malformed = |e: serde_json::Error| {
            CacheError::MalformedCommand(format!("{}: {}", envelope.kind, e))
        };

        match envelope.kind.as_str() {
            "CACHE_UPDATE" => {
                let p = UpdatePayload::deserialize(&payload).map_err(malformed)?;
                Ok(Command::UpdateCache {
                    partition: p.cache_name,
                    urls: p.urls,
                })
            }
            "CLEAR_CACHE" => {
                let p = if payload.is_null() {
                    ClearPayload::default()
                } else {
                    ClearPayload::deserialize(&payload).map_err(malformed)?
                };
                Ok(Command::ClearCache {
                    partition: p.cache_name,
                })
            }
            "PREFETCH_URLS" => {
                let urls = Vec::<String>::deserialize(&payload).map_err(malformed)?;
                Ok(Command::Prefetch { urls })
            }
            "GET_CACHE_STATUS" => Ok(Command::GetStatus),
            other => Err(CacheError::MalformedCommand(format!(
                "unknown command type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    CacheStatus { data: BTreeMap<String, usize> },
    CacheStatusError { error: String },
}

pub struct PendingCommand {
    pub command: Command,
    pub reply: Option<oneshot::Sender<Reply>>,
}

/// Per-item outcome of a batch; a failed item never stops the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct CommandChannel {
    engine: Engine,
}

impl CommandChannel {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Consumes commands until every sender is gone.
    pub async fn run(&self, mut rx: mpsc::Receiver<PendingCommand>) {
        while let Some(pending) = rx.recv().await {
            self.dispatch(pending).await;
        }
        debug!("Command channel closed");
    }

    /// Parses and dispatches a raw message. Malformed messages are logged
    /// and dropped.
    pub async fn handle_message(
        &self,
        message: &serde_json::Value,
        reply: Option<oneshot::Sender<Reply>>,
    ) {
        match Command::parse(message) {
            Ok(command) => self.dispatch(PendingCommand { command, reply }).await,
            Err(e) => warn!(error = %e, "Ignoring command"),
        }
    }

    #[instrument(name = "Command", skip(self, pending), fields(command = ?pending.command))]
    pub async fn dispatch(&self, pending: PendingCommand) {
        match pending.command {
            Command::UpdateCache { partition, urls } => {
                self.update_cache(&partition, &urls).await;
            }
            Command::ClearCache { partition } => {
                if let Err(e) = self.clear_cache(partition.as_deref()).await {
                    error!(error = %e, "Clear cache failed");
                }
            }
            Command::Prefetch { urls } => {
                self.prefetch(&urls).await;
            }
            Command::GetStatus => {
                let reply = match self.status().await {
                    Ok(data) => Reply::CacheStatus { data },
                    Err(e) => Reply::CacheStatusError {
                        error: e.to_string(),
                    },
                };
                match pending.reply {
                    Some(tx) => {
                        if tx.send(reply).is_err() {
                            debug!("Status requester went away");
                        }
                    }
                    None => warn!("Status requested without a reply path"),
                }
            }
        }
    }

    pub async fn update_cache(&self, partition: &str, urls: &[String]) -> BatchReport {
        let name = self.engine.names().resolve(partition);
        let report = self.store_all(&name, urls).await;
        info!(
            partition = %name,
            stored = report.succeeded.len(),
            failed = report.failed.len(),
            "Cache update finished"
        );
        report
    }

    pub async fn prefetch(&self, urls: &[String]) -> BatchReport {
        let name = self.engine.names().name(PartitionKind::Dynamic);
        let report = self.store_all(&name, urls).await;
        for (url, reason) in &report.failed {
            warn!(url, reason, "Prefetch failed");
        }
        report
    }

    async fn store_all(&self, partition: &str, urls: &[String]) -> BatchReport {
        debug!(partition, count = urls.len(), "Storing batch");
        let fetches = urls.iter().map(|raw| async move {
            let outcome = match Url::parse(raw) {
                Ok(url) => self
                    .engine
                    .fetch_and_store(partition, &url)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("invalid URL: {e}")),
            };
            (raw.clone(), outcome)
        });

        let mut report = BatchReport::default();
        for (url, outcome) in join_all(fetches).await {
            match outcome {
                Ok(()) => report.succeeded.push(url),
                Err(reason) => report.failed.push((url, reason)),
            }
        }
        report
    }

    /// Deletes one partition, or every partition when `partition` is None.
    pub async fn clear_cache(&self, partition: Option<&str>) -> Result<Vec<String>> {
        let store = self.engine.store();
        let targets: Vec<String> = match partition {
            Some(name) => vec![self.engine.names().resolve(name)],
            None => store.list_partitions().await?.into_iter().collect(),
        };

        let mut deleted = Vec::new();
        for name in targets {
            if store.delete_partition(&name).await? {
                info!(partition = %name, "Cleared partition");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    pub async fn status(&self) -> Result<BTreeMap<String, usize>> {
        let store = self.engine.store();
        let mut counts = BTreeMap::new();
        for name in store.list_partitions().await? {
            let partition = store.open(&name).await?;
            counts.insert(name, partition.keys().await?.len());
        }
        Ok(counts)
    }
}
