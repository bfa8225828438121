//! One caching strategy per content class.
//!
//! | class   | strategy                                   | offline substitute     |
//! |---------|--------------------------------------------|------------------------|
//! | api     | cache-first, stale entries refreshed async | `{errorKind:"offline"}`|
//! | static  | cache-first, no age check                  | fallback document/503  |
//! | image   | cache-first, stale entries refreshed async | empty 404              |
//! | dynamic | network-first                              | fallback document/503  |

pub mod api;
pub mod image;
pub mod network_first;
pub mod refresh;
pub mod static_assets;

use crate::core::classify::ContentClass;
use crate::core::entry::{CacheEntry, now_millis};
use crate::core::partition::PartitionKind;
use crate::core::request::{Request, Response, ResponseSource};
use crate::engine::Engine;
use tracing::{debug, warn};

/// Cache-first with background revalidation, shared by api and image.
pub(crate) async fn stale_while_revalidate(
    engine: &Engine,
    request: &Request,
    class: ContentClass,
    offline: fn() -> Response,
) -> Response {
    let key = request.cache_key();
    let partition = engine.partition(PartitionKind::for_class(class)).await;

    if let Some(entry) = engine.lookup(partition.as_ref(), &key).await {
        if !engine
            .policies()
            .is_stale(entry.class, entry.stored_at, now_millis())
        {
            return entry.to_response(ResponseSource::Cache);
        }
        debug!(key, "Serving stale entry, refreshing in background");
        spawn_refresh(engine, request, class).await;
        return entry.to_response(ResponseSource::StaleCache);
    }

    match engine.transport().fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                let entry = CacheEntry::from_response(key, &response, class);
                engine.remember(partition.as_ref(), &entry).await;
            }
            response
        }
        Err(e) => {
            warn!(key, error = %e, "Network fetch failed");
            // a concurrent refresh may have stored something meanwhile
            match engine.lookup(partition.as_ref(), &key).await {
                Some(entry) => entry.to_response(ResponseSource::StaleCache),
                None => offline(),
            }
        }
    }
}

async fn spawn_refresh(engine: &Engine, request: &Request, class: ContentClass) {
    let task_engine = engine.clone();
    let request = request.clone();
    let key = request.cache_key();
    engine
        .refresher()
        .spawn_for(&key, async move {
            let key = request.cache_key();
            match task_engine.fetch_ok(&request).await {
                Ok(response) => {
                    let kind = PartitionKind::for_class(class);
                    let partition = task_engine.partition(kind).await;
                    let entry = CacheEntry::from_response(key, &response, class);
                    task_engine.remember(partition.as_ref(), &entry).await;
                    debug!(key = %entry.key, "Background refresh stored");
                }
                Err(e) => warn!(key, error = %e, "Background refresh failed"),
            }
        })
        .await;
}

/// Offline substitute for document requests, else an empty 503.
pub(crate) async fn document_fallback(engine: &Engine, request: &Request) -> Response {
    if request.is_document() {
        if let Some(entry) = engine.offline_document().await {
            return entry.to_response(ResponseSource::Fallback);
        }
        warn!("Offline document missing from static partition");
    }
    Response::unavailable()
}
