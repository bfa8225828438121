use super::stale_while_revalidate;
use crate::core::classify::ContentClass;
use crate::core::request::{Request, Response};
use crate::engine::Engine;

pub async fn handle(engine: &Engine, request: &Request) -> Response {
    stale_while_revalidate(engine, request, ContentClass::Api, Response::offline_api).await
}

#[cfg(test)]
mod tests {
    use crate::core::classify::ContentClass;
    use crate::core::entry::now_millis;
    use crate::core::request::{Request, ResponseSource};
    use crate::engine::test_support::*;

    const MINUTE: i64 = 60_000;

    #[tokio::test]
    async fn test_miss_fetches_and_stores() {
        let (engine, transport, store) = engine();
        transport.route(url("/api/prices").as_str(), 200, r#"{"btc":1}"#);

        let before = now_millis();
        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert!(is_from(&response, ResponseSource::Network));
        assert_eq!(body(&response), r#"{"btc":1}"#);

        let entry = read(&store, "api-v1", "/api/prices").await.unwrap();
        assert_eq!(entry.class, ContentClass::Api);
        assert!(entry.stored_at.unwrap() >= before);
    }

    #[tokio::test]
    async fn test_second_call_within_a_minute_is_served_from_cache() {
        let (engine, transport, _store) = engine();
        transport.route(url("/api/prices").as_str(), 200, "first");

        engine.handle(Request::get(url("/api/prices"))).await;
        assert_eq!(transport.calls(), 1);

        transport.route(url("/api/prices").as_str(), 200, "second");
        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert!(is_from(&response, ResponseSource::Cache));
        assert_eq!(body(&response), "first");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_entry_served_then_refreshed() {
        let (engine, transport, store) = engine();
        seed(&store, "api-v1", "/api/prices", "old", ContentClass::Api, Some(6 * MINUTE)).await;
        transport.route(url("/api/prices").as_str(), 200, "new");

        let before = now_millis();
        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert!(is_from(&response, ResponseSource::StaleCache));
        assert_eq!(body(&response), "old");

        engine.refresher().settle().await;
        let entry = read(&store, "api-v1", "/api/prices").await.unwrap();
        assert_eq!(entry.body, b"new");
        assert!(entry.stored_at.unwrap() >= before);

        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert!(is_from(&response, ResponseSource::Cache));
        assert_eq!(body(&response), "new");
    }

    #[tokio::test]
    async fn test_entry_without_marker_is_refreshed() {
        let (engine, transport, store) = engine();
        seed(&store, "api-v1", "/api/prices", "unmarked", ContentClass::Api, None).await;
        transport.route(url("/api/prices").as_str(), 200, "marked");

        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert!(is_from(&response, ResponseSource::StaleCache));
        engine.refresher().settle().await;
        assert!(read(&store, "api-v1", "/api/prices").await.unwrap().stored_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let (engine, transport, store) = engine();
        seed(&store, "api-v1", "/api/prices", "old", ContentClass::Api, Some(10 * MINUTE)).await;
        transport.set_offline(true);

        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert_eq!(response.status, 200);
        assert_eq!(body(&response), "old");

        engine.refresher().settle().await;
        assert_eq!(read(&store, "api-v1", "/api/prices").await.unwrap().body, b"old");
    }

    #[tokio::test]
    async fn test_offline_without_entry_returns_structured_error() {
        let (engine, transport, _store) = engine();
        transport.set_offline(true);

        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert_eq!(response.status, 503);
        let payload: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(payload, serde_json::json!({"errorKind": "offline", "httpStatus": 503}));
    }

    #[tokio::test]
    async fn test_error_status_is_returned_but_not_cached() {
        let (engine, transport, store) = engine();
        transport.route(url("/api/prices").as_str(), 429, "slow down");

        let response = engine.handle(Request::get(url("/api/prices"))).await;
        assert_eq!(response.status, 429);
        assert!(read(&store, "api-v1", "/api/prices").await.is_none());
    }
}
