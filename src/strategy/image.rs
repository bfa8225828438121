use super::stale_while_revalidate;
use crate::core::classify::ContentClass;
use crate::core::request::{Request, Response};
use crate::engine::Engine;

pub async fn handle(engine: &Engine, request: &Request) -> Response {
    stale_while_revalidate(engine, request, ContentClass::Image, Response::missing_image).await
}

#[cfg(test)]
mod tests {
    use crate::core::classify::ContentClass;
    use crate::core::request::{Destination, Request, ResponseSource};
    use crate::engine::test_support::*;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    #[tokio::test]
    async fn test_images_land_in_dynamic_partition() {
        let (engine, transport, store) = engine();
        transport.route(url("/coins/btc.png").as_str(), 200, "png-bytes");

        let response = engine.handle(Request::get(url("/coins/btc.png"))).await;
        assert!(is_from(&response, ResponseSource::Network));

        let entry = read(&store, "dynamic-v1", "/coins/btc.png").await.unwrap();
        assert_eq!(entry.class, ContentClass::Image);
    }

    #[tokio::test]
    async fn test_day_old_image_is_still_fresh() {
        let (engine, transport, store) = engine();
        seed(&store, "dynamic-v1", "/coins/eth.svg", "svg", ContentClass::Image, Some(DAY)).await;

        let response = engine.handle(Request::get(url("/coins/eth.svg"))).await;
        assert!(is_from(&response, ResponseSource::Cache));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_week_old_image_is_revalidated() {
        let (engine, transport, store) = engine();
        seed(
            &store,
            "dynamic-v1",
            "/coins/eth.svg",
            "old",
            ContentClass::Image,
            Some(8 * DAY),
        )
        .await;
        transport.route(url("/coins/eth.svg").as_str(), 200, "new");

        let response = engine.handle(Request::get(url("/coins/eth.svg"))).await;
        assert!(is_from(&response, ResponseSource::StaleCache));
        engine.refresher().settle().await;
        assert_eq!(read(&store, "dynamic-v1", "/coins/eth.svg").await.unwrap().body, b"new");
    }

    #[tokio::test]
    async fn test_offline_image_is_empty_404() {
        let (engine, transport, _store) = engine();
        transport.set_offline(true);

        let request = Request::get(url("/avatars/42")).with_destination(Destination::Image);
        let response = engine.handle(request).await;
        assert_eq!(response.status, 404);
        assert!(response.body.is_empty());
        assert!(is_from(&response, ResponseSource::Fallback));
    }
}
