use super::document_fallback;
use crate::core::classify::ContentClass;
use crate::core::entry::CacheEntry;
use crate::core::partition::PartitionKind;
use crate::core::request::{Request, Response, ResponseSource};
use crate::engine::Engine;
use tracing::warn;

/// Pure cache-first. Age is never checked: static entries are only
/// replaced when a new version installs its own partition.
pub async fn handle(engine: &Engine, request: &Request) -> Response {
    let key = request.cache_key();
    let partition = engine.partition(PartitionKind::Static).await;

    if let Some(entry) = engine.lookup(partition.as_ref(), &key).await {
        return entry.to_response(ResponseSource::Cache);
    }

    match engine.transport().fetch(request).await {
        Ok(response) => {
            if response.is_success() {
                let entry = CacheEntry::from_response(key, &response, ContentClass::Static);
                engine.remember(partition.as_ref(), &entry).await;
            }
            response
        }
        Err(e) => {
            warn!(key, error = %e, "Static asset fetch failed");
            document_fallback(engine, request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::core::classify::ContentClass;
    use crate::core::request::{Request, ResponseSource};
    use crate::engine::test_support::*;

    const YEAR: i64 = 365 * 24 * 60 * 60 * 1000;

    #[tokio::test]
    async fn test_hit_returned_regardless_of_age() {
        let (engine, transport, store) = engine();
        seed(&store, "static-v1", "/app.js", "ancient", ContentClass::Static, Some(YEAR)).await;
        transport.route(url("/app.js").as_str(), 200, "newer");

        for _ in 0..2 {
            let response = engine.handle(Request::get(url("/app.js"))).await;
            assert!(is_from(&response, ResponseSource::Cache));
            assert_eq!(body(&response), "ancient");
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_is_fetched_and_stored() {
        let (engine, transport, store) = engine();
        transport.route(url("/styles/main.css").as_str(), 200, "body{}");

        let response = engine.handle(Request::get(url("/styles/main.css"))).await;
        assert_eq!(body(&response), "body{}");
        assert!(read(&store, "static-v1", "/styles/main.css").await.is_some());
    }

    #[tokio::test]
    async fn test_offline_document_gets_fallback_page() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "static-v1",
            "/offline.html",
            "<h1>offline</h1>",
            ContentClass::Static,
            Some(0),
        )
        .await;
        transport.set_offline(true);

        let response = engine.handle(Request::document(url("/"))).await;
        assert_eq!(response.status, 200);
        assert!(is_from(&response, ResponseSource::Fallback));
        assert_eq!(body(&response), "<h1>offline</h1>");
    }

    #[tokio::test]
    async fn test_offline_non_document_gets_503() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "static-v1",
            "/offline.html",
            "<h1>offline</h1>",
            ContentClass::Static,
            Some(0),
        )
        .await;
        transport.set_offline(true);

        let response = engine.handle(Request::get(url("/vendor.js"))).await;
        assert_eq!(response.status, 503);
        assert!(response.body.is_empty());
    }
}
