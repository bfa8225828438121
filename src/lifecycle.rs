//! Install and activation of a cache version.
//!
//! ```text
//! Uninstalled ─install─▶ Installing ─▶ Installed ─supersede/eager─▶ Activating ─▶ Active
//!      ▲                     │
//!      └──── any failure ────┘
//! ```

use crate::core::entry::CacheEntry;
use crate::core::error::{CacheError, Result};
use crate::core::partition::PartitionKind;
use crate::core::request::Request;
use crate::engine::Engine;
use futures::future::join_all;
use std::fmt::Display;
use std::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninstalled,
    Installing,
    Installed,
    Activating,
    Active,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LifecycleState::Uninstalled => "uninstalled",
                LifecycleState::Installing => "installing",
                LifecycleState::Installed => "installed",
                LifecycleState::Activating => "activating",
                LifecycleState::Active => "active",
            }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
    pub removed: Vec<String>,
    pub kept: Vec<String>,
}

pub struct Lifecycle {
    engine: Engine,
    manifest: Vec<Url>,
    eager_activation: bool,
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    pub fn new(engine: Engine, manifest: Vec<Url>, eager_activation: bool) -> Self {
        Self {
            engine,
            manifest,
            eager_activation,
            state: Mutex::new(LifecycleState::Uninstalled),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn manifest(&self) -> &[Url] {
        &self.manifest
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
        debug!(%state, "Lifecycle transition");
    }

    /// Moves to `to` if the current state is one of `from`.
    fn transition(&self, from: &[LifecycleState], to: LifecycleState) -> Result<LifecycleState> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let current = *state;
        if !from.contains(&current) {
            return Err(CacheError::InvalidTransition {
                from: current.to_string(),
                to: to.to_string(),
            });
        }
        *state = to;
        debug!(from = %current, to = %to, "Lifecycle transition");
        Ok(current)
    }

    pub async fn install(&self) -> Result<Option<ActivationReport>> {
        self.install_with_progress(&|| {}).await
    }

    /// Pre-populates the static partition with the whole manifest. Nothing
    /// is written unless every asset was fetched.
    pub async fn install_with_progress(
        &self,
        on_fetched: &(dyn Fn() + Sync),
    ) -> Result<Option<ActivationReport>> {
        self.transition(&[LifecycleState::Uninstalled], LifecycleState::Installing)?;

        if let Err(e) = self.populate_static(on_fetched).await {
            warn!(error = %e, "Install failed");
            self.set_state(LifecycleState::Uninstalled);
            return Err(e);
        }
        self.set_state(LifecycleState::Installed);
        info!(assets = self.manifest.len(), "Installed static assets");

        if self.eager_activation {
            return self.activate().await.map(Some);
        }
        Ok(None)
    }

    async fn populate_static(&self, on_fetched: &(dyn Fn() + Sync)) -> Result<()> {
        let fetches = self.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let result = self.engine.fetch_ok(&request).await.map(|response| {
                CacheEntry::from_response(
                    request.cache_key(),
                    &response,
                    self.engine.classify(&request),
                )
            });
            on_fetched();
            result
        });
        let entries = join_all(fetches)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let name = self.engine.names().name(PartitionKind::Static);
        let partition = self.engine.store().open(&name).await?;
        for entry in &entries {
            partition.put_entry(entry).await?;
        }
        Ok(())
    }

    /// Re-derives `Installed` after a restart: a static partition already
    /// holding every manifest asset means a previous run finished install.
    pub async fn recover(&self) -> Result<LifecycleState> {
        if self.state() != LifecycleState::Uninstalled {
            return Ok(self.state());
        }
        let name = self.engine.names().name(PartitionKind::Static);
        if !self.engine.store().list_partitions().await?.contains(&name) {
            return Ok(LifecycleState::Uninstalled);
        }

        let partition = self.engine.store().open(&name).await?;
        for url in &self.manifest {
            let key = Request::get(url.clone()).cache_key();
            if partition.get(&key).await?.is_none() {
                debug!(key, "Manifest asset missing, install required");
                return Ok(LifecycleState::Uninstalled);
            }
        }
        self.transition(&[LifecycleState::Uninstalled], LifecycleState::Installed)?;
        Ok(LifecycleState::Installed)
    }

    /// Called when the host reports the previous version is gone.
    pub async fn supersede(&self) -> Result<ActivationReport> {
        if self.state() != LifecycleState::Installed {
            return Err(CacheError::InvalidTransition {
                from: self.state().to_string(),
                to: LifecycleState::Activating.to_string(),
            });
        }
        self.activate().await
    }

    /// Deletes every partition that is not one of this version's three.
    /// Safe to run again once active.
    pub async fn activate(&self) -> Result<ActivationReport> {
        let previous = self.transition(
            &[LifecycleState::Installed, LifecycleState::Active],
            LifecycleState::Activating,
        )?;

        match self.collect_garbage().await {
            Ok(report) => {
                self.set_state(LifecycleState::Active);
                info!(removed = report.removed.len(), "Activated");
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Activation failed");
                self.set_state(previous);
                Err(e)
            }
        }
    }

    async fn collect_garbage(&self) -> Result<ActivationReport> {
        let names = self.engine.names();
        let store = self.engine.store();
        let mut report = ActivationReport::default();

        for name in store.list_partitions().await? {
            if names.is_expected(&name) {
                continue;
            }
            warn!(error = %CacheError::OrphanPartition(name.clone()), "Removing partition");
            store.delete_partition(&name).await?;
            report.removed.push(name);
        }
        for name in names.expected() {
            store.open(&name).await?;
            report.kept.push(name);
        }
        Ok(report)
    }
}
