use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, warn};

type KeySet = Arc<std::sync::Mutex<HashSet<String>>>;

/// Owns detached background refreshes. Callers hand work over and move
/// on; nothing on the request path ever awaits these tasks.
#[derive(Clone, Default)]
pub struct Refresher {
    tasks: Arc<Mutex<JoinSet<()>>>,
    refreshing: KeySet,
}

/// Releases a key when its refresh finishes, panics or is aborted.
struct KeyClaim {
    keys: KeySet,
    key: String,
}

impl Drop for KeyClaim {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

impl Refresher {
    /// Spawns a refresh for `key` unless one is already running for it.
    /// Returns whether a task was spawned.
    pub async fn spawn_for<F>(&self, key: &str, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let claimed = self
            .refreshing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string());
        if !claimed {
            debug!(key, "Refresh already in flight");
            return false;
        }
        let claim = KeyClaim {
            keys: self.refreshing.clone(),
            key: key.to_string(),
        };
        self.spawn(async move {
            let _claim = claim;
            task.await;
        })
        .await;
        true
    }

    pub async fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().await;
        // reap whatever already finished
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
    }

    pub async fn in_flight(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Waits for every refresh spawned so far.
    pub async fn settle(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Background refresh task aborted");
            }
        }
    }
}
