pub mod cli;
pub mod command;
pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod maintenance;
pub mod notify;
pub mod providers;
pub mod store;
pub mod strategy;
pub mod sync;

use crate::command::CommandChannel;
use crate::core::cache::CacheStore;
use crate::core::config::AppConfig;
use crate::core::transport::Transport;
use crate::engine::Engine;
use crate::lifecycle::Lifecycle;
use crate::maintenance::MaintenanceScheduler;
use crate::notify::Notifier;
use crate::providers::http::HttpTransport;
use crate::sync::{HttpSyncTarget, SyncDomain, SyncQueue, SyncTarget};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Install,
    Activate,
    Fetch {
        url: String,
        method: String,
        destination: String,
    },
    Status,
    Clear {
        partition: Option<String>,
    },
    Prefetch {
        urls: Vec<String>,
    },
    Update {
        partition: String,
        urls: Vec<String>,
    },
    Sweep,
    Enqueue {
        domain: String,
        payload: String,
    },
    Sync,
    Daemon,
}

/// Every component, wired against one store and one transport.
pub struct App {
    pub config: AppConfig,
    pub engine: Engine,
    pub lifecycle: Lifecycle,
    pub commands: CommandChannel,
    pub scheduler: MaintenanceScheduler,
    pub sync_queue: SyncQueue,
    pub notifier: Notifier,
}

impl App {
    pub async fn build(config: AppConfig, ephemeral: bool) -> Result<Self> {
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.transport)?);
        let (store, sync_store) = if ephemeral {
            debug!("Using in-memory stores");
            (store::open_ephemeral(), store::open_ephemeral())
        } else {
            let data_dir = config.data_dir()?;
            (
                store::open_persistent(&data_dir.join("cache")),
                store::open_persistent(&data_dir.join("sync")),
            )
        };
        Self::with_parts(config, store, sync_store, transport).await
    }

    pub async fn with_parts(
        config: AppConfig,
        store: Arc<dyn CacheStore>,
        sync_store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;
        let engine = Engine::new(&config, store, transport)?;
        let lifecycle = Lifecycle::new(
            engine.clone(),
            config.manifest_urls()?,
            config.eager_activation,
        );
        let scheduler = MaintenanceScheduler::new(
            engine.clone(),
            Duration::from_secs(config.maintenance.interval_secs),
        );
        let sync_queue = match SyncQueue::open(sync_store.as_ref()).await {
            Ok(queue) => queue,
            Err(e) => {
                warn!(
                    error = %e,
                    "Sync queue store unavailable, queued writes will not survive restart"
                );
                SyncQueue::open(store::open_ephemeral().as_ref()).await?
            }
        };

        Ok(Self {
            commands: CommandChannel::new(engine.clone()),
            config,
            engine,
            lifecycle,
            scheduler,
            sync_queue,
            notifier: Notifier::default(),
        })
    }

    /// Domain collaborators for replay; empty without a sync endpoint.
    pub fn sync_targets(&self) -> HashMap<SyncDomain, Arc<dyn SyncTarget>> {
        match &self.config.sync.endpoint {
            Some(endpoint) => HttpSyncTarget::for_all_domains(
                self.engine.transport().clone(),
                endpoint.clone(),
            ),
            None => HashMap::new(),
        }
    }
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    ephemeral: bool,
) -> Result<()> {
    info!("pricekeep starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let app = App::build(config, ephemeral)
        .await
        .context("Failed to initialize cache core")?;

    match command {
        AppCommand::Install => cli::cache::install(&app).await,
        AppCommand::Activate => cli::cache::activate(&app).await,
        AppCommand::Fetch {
            url,
            method,
            destination,
        } => cli::fetch::run(&app, &url, &method, &destination).await,
        AppCommand::Status => cli::status::run(&app).await,
        AppCommand::Clear { partition } => cli::cache::clear(&app, partition.as_deref()).await,
        AppCommand::Prefetch { urls } => cli::cache::prefetch(&app, &urls).await,
        AppCommand::Update { partition, urls } => {
            cli::cache::update(&app, &partition, &urls).await
        }
        AppCommand::Sweep => cli::cache::sweep(&app).await,
        AppCommand::Enqueue { domain, payload } => {
            cli::sync::enqueue(&app, &domain, &payload).await
        }
        AppCommand::Sync => cli::sync::replay(&app).await,
        AppCommand::Daemon => cli::daemon::run(app).await,
    }
}
