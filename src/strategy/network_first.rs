use super::document_fallback;
use crate::core::classify::ContentClass;
use crate::core::entry::CacheEntry;
use crate::core::partition::PartitionKind;
use crate::core::request::{Request, Response, ResponseSource};
use crate::engine::Engine;
use tracing::warn;

/// Network-first for everything the other strategies don't claim.
pub async fn handle(engine: &Engine, request: &Request) -> Response {
    let key = request.cache_key();
    let partition = engine.partition(PartitionKind::Dynamic).await;

    match engine.transport().fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                let entry = CacheEntry::from_response(key, &response, ContentClass::Dynamic);
                engine.remember(partition.as_ref(), &entry).await;
            }
            response
        }
        Err(e) => {
            warn!(key, error = %e, "Network fetch failed, trying cache");
            match engine.lookup(partition.as_ref(), &key).await {
                Some(entry) => entry.to_response(ResponseSource::StaleCache),
                None => document_fallback(engine, request).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::classify::ContentClass;
    use crate::core::request::{Request, ResponseSource};
    use crate::engine::test_support::*;

    const MINUTE: i64 = 60_000;

    #[tokio::test]
    async fn test_network_wins_even_over_fresh_cache() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "dynamic-v1",
            "/portfolio",
            "cached",
            ContentClass::Dynamic,
            Some(MINUTE),
        )
        .await;
        transport.route(url("/portfolio").as_str(), 200, "live");

        let response = engine.handle(Request::get(url("/portfolio"))).await;
        assert!(is_from(&response, ResponseSource::Network));
        assert_eq!(body(&response), "live");
        assert_eq!(read(&store, "dynamic-v1", "/portfolio").await.unwrap().body, b"live");
    }

    #[tokio::test]
    async fn test_offline_falls_back_to_cache() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "dynamic-v1",
            "/portfolio",
            "cached",
            ContentClass::Dynamic,
            Some(1000 * MINUTE),
        )
        .await;
        transport.set_offline(true);

        let response = engine.handle(Request::get(url("/portfolio"))).await;
        assert_eq!(body(&response), "cached");
    }

    #[tokio::test]
    async fn test_offline_document_without_cache_gets_fallback_page() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "static-v1",
            "/offline.html",
            "offline page",
            ContentClass::Static,
            Some(0),
        )
        .await;
        transport.set_offline(true);

        let response = engine.handle(Request::document(url("/alerts"))).await;
        assert!(is_from(&response, ResponseSource::Fallback));
        assert_eq!(body(&response), "offline page");
    }

    #[tokio::test]
    async fn test_offline_without_anything_is_503() {
        let (engine, transport, _store) = engine();
        transport.set_offline(true);

        let response = engine.handle(Request::document(url("/alerts"))).await;
        assert_eq!(response.status, 503);
    }
}
