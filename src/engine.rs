//! The request interceptor: every outbound request enters through
//! [`Engine::handle`] and is routed to the strategy for its content class.

use crate::core::cache::{CachePartition, CacheStore};
use crate::core::classify::{Classifier, ContentClass};
use crate::core::config::AppConfig;
use crate::core::entry::CacheEntry;
use crate::core::error::{CacheError, Result};
use crate::core::partition::{PartitionKind, PartitionNames};
use crate::core::policy::PolicyTable;
use crate::core::request::{Request, Response};
use crate::core::transport::Transport;
use crate::strategy::{self, refresh::Refresher};
use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use url::Url;

/// Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    classifier: Arc<Classifier>,
    policies: Arc<PolicyTable>,
    names: PartitionNames,
    offline_document: Arc<Url>,
    refresher: Refresher,
}

impl Engine {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        let manifest = config
            .manifest_urls()
            .context("Failed to resolve static manifest")?;
        let classifier = Classifier::new(
            config.origin.clone(),
            &manifest,
            config.classifier.clone(),
        );
        Ok(Self {
            store,
            transport,
            classifier: Arc::new(classifier),
            policies: Arc::new(PolicyTable::from_config(&config.freshness)),
            names: PartitionNames::new(&config.version),
            offline_document: Arc::new(config.offline_document_url()?),
            refresher: Refresher::default(),
        })
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn names(&self) -> &PartitionNames {
        &self.names
    }

    pub fn classify(&self, request: &Request) -> ContentClass {
        self.classifier.classify(request)
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Answers a request. Never fails: every degraded path ends in a
    /// cached copy, a fallback, or a structured error response.
    #[instrument(
        name = "Intercept",
        skip(self, request),
        fields(method = %request.method, url = %request.url)
    )]
    pub async fn handle(&self, request: Request) -> Response {
        if !request.is_cacheable() {
            debug!("Passing request through");
            return match self.transport.fetch(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Pass-through request failed");
                    Response::unavailable()
                }
            };
        }

        let class = self.classify(&request);
        debug!(%class, "Classified request");
        match class {
            ContentClass::Api => strategy::api::handle(self, &request).await,
            ContentClass::Static => strategy::static_assets::handle(self, &request).await,
            ContentClass::Image => strategy::image::handle(self, &request).await,
            ContentClass::Dynamic => strategy::network_first::handle(self, &request).await,
        }
    }

    /// Opens a partition, or `None` when the store is unavailable.
    pub(crate) async fn partition(&self, kind: PartitionKind) -> Option<Arc<dyn CachePartition>> {
        let name = self.names.name(kind);
        match self.store.open(&name).await {
            Ok(partition) => Some(partition),
            Err(e) => {
                warn!(partition = %name, error = %e, "Cache unavailable, serving network-only");
                None
            }
        }
    }

    pub(crate) async fn lookup(
        &self,
        partition: Option<&Arc<dyn CachePartition>>,
        key: &str,
    ) -> Option<CacheEntry> {
        let partition = partition?;
        match partition.get_entry(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(partition = partition.name(), key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub(crate) async fn remember(
        &self,
        partition: Option<&Arc<dyn CachePartition>>,
        entry: &CacheEntry,
    ) {
        let Some(partition) = partition else {
            return;
        };
        if let Err(e) = partition.put_entry(entry).await {
            warn!(partition = partition.name(), key = %entry.key, error = %e, "Cache write failed");
        }
    }

    /// Looks up the designated offline document in the static partition.
    pub(crate) async fn offline_document(&self) -> Option<CacheEntry> {
        let partition = self.partition(PartitionKind::Static).await;
        self.lookup(partition.as_ref(), self.offline_document.as_str())
            .await
    }

    /// Fetches `url` and stores it in the named partition. Non-2xx
    /// responses count as failures and are not stored.
    pub async fn fetch_and_store(&self, partition_name: &str, url: &Url) -> Result<CacheEntry> {
        let request = Request::get(url.clone());
        let response = self.fetch_ok(&request).await?;
        let class = self.classify(&request);
        let entry = CacheEntry::from_response(request.cache_key(), &response, class);
        let partition = self.store.open(partition_name).await?;
        partition.put_entry(&entry).await?;
        Ok(entry)
    }

    pub(crate) async fn fetch_ok(&self, request: &Request) -> Result<Response> {
        let response = self.transport.fetch(request).await?;
        if !response.is_success() {
            return Err(CacheError::network(
                request.url.as_str(),
                format!("HTTP status {}", response.status),
            ));
        }
        Ok(response)
    }
}
