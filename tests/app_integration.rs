use async_trait::async_trait;
use pricekeep::App;
use pricekeep::core::cache::{CachePartition, CacheStore};
use pricekeep::core::config::AppConfig;
use pricekeep::core::error::{CacheError, Result};
use pricekeep::core::request::{Request, Response, ResponseSource};
use pricekeep::core::transport::Transport;
use pricekeep::notify::Notification;
use pricekeep::providers::http::HttpTransport;
use pricekeep::store::disk::DiskStore;
use pricekeep::store::memory::MemoryStore;
use pricekeep::sync::SyncDomain;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;
use tracing::info;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    /// Real HTTP transport that can be switched off to simulate going
    /// offline without tearing down the mock server.
    pub struct SwitchableTransport {
        inner: HttpTransport,
        offline: AtomicBool,
    }

    impl SwitchableTransport {
        pub fn new(config: &AppConfig) -> Self {
            Self {
                inner: HttpTransport::new(&config.transport).unwrap(),
                offline: AtomicBool::new(false),
            }
        }

        pub fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for SwitchableTransport {
        async fn fetch(&self, request: &Request) -> Result<Response> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(CacheError::network(request.url.as_str(), "offline"));
            }
            self.inner.fetch(request).await
        }
    }

    pub async fn mount_get(server: &MockServer, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    /// Origin serving the whole static manifest.
    pub async fn origin_server() -> MockServer {
        let server = MockServer::start().await;
        mount_get(&server, "/", "<html>home</html>").await;
        mount_get(&server, "/offline.html", "<html>offline</html>").await;
        mount_get(&server, "/app.js", "console.log('app')").await;
        server
    }

    pub fn config_for(server: &MockServer, version: &str) -> AppConfig {
        let mut config = AppConfig::for_origin(Url::parse(&server.uri()).unwrap());
        config.version = version.to_string();
        config.static_manifest = vec![
            "/".to_string(),
            "/offline.html".to_string(),
            "/app.js".to_string(),
        ];
        config.transport.retries = 0;
        config.transport.timeout_secs = 5;
        config
    }

    pub async fn app_with(
        config: AppConfig,
        store: Arc<dyn CacheStore>,
    ) -> (App, Arc<SwitchableTransport>) {
        let transport = Arc::new(SwitchableTransport::new(&config));
        let sync_store = Arc::new(MemoryStore::new());
        let app = App::with_parts(config, store, sync_store, transport.clone())
            .await
            .unwrap();
        (app, transport)
    }
}

use test_utils::*;

#[test_log::test(tokio::test)]
async fn test_version_upgrade_replaces_previous_partitions() {
    let server = origin_server().await;
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn CacheStore> = Arc::new(DiskStore::open_at(dir.path()).unwrap());

    let (v1, _transport) = app_with(config_for(&server, "v1"), store.clone()).await;
    v1.lifecycle.install().await.unwrap();
    store.delete_partition("api-v1").await.unwrap();
    let before: BTreeSet<String> = ["static-v1", "dynamic-v1"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(store.list_partitions().await.unwrap(), before);

    let (v2, _transport) = app_with(config_for(&server, "v2"), store.clone()).await;
    let report = v2.lifecycle.install().await.unwrap().unwrap();
    info!(?report, "Activated v2");

    let after: BTreeSet<String> = ["static-v2", "dynamic-v2", "api-v2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(store.list_partitions().await.unwrap(), after);
}

#[test_log::test(tokio::test)]
async fn test_second_api_call_within_a_minute_is_served_from_cache() {
    let server = origin_server().await;
    Mock::given(method("GET"))
        .and(path("/api/prices"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"BTC":64000}"#))
        .expect(1)
        .mount(&server)
        .await;

    let (app, _transport) = app_with(config_for(&server, "v1"), Arc::new(MemoryStore::new())).await;
    let prices = Url::parse(&format!("{}/api/prices", server.uri())).unwrap();

    let first = app.engine.handle(Request::get(prices.clone())).await;
    assert_eq!(first.source, ResponseSource::Network);

    let second = app.engine.handle(Request::get(prices)).await;
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.body, br#"{"BTC":64000}"#);

    app.engine.refresher().settle().await;
    // `expect(1)` is verified when the server drops
}

#[test_log::test(tokio::test)]
async fn test_offline_behavior_per_class() {
    let server = origin_server().await;
    mount_get(&server, "/portfolio", "<html>portfolio</html>").await;

    let dir = TempDir::new().unwrap();
    let store: Arc<dyn CacheStore> = Arc::new(DiskStore::open_at(dir.path()).unwrap());
    let (app, transport) = app_with(config_for(&server, "v1"), store).await;
    app.lifecycle.install().await.unwrap();

    let url = |p: &str| Url::parse(&server.uri()).unwrap().join(p).unwrap();
    app.engine.handle(Request::document(url("/portfolio"))).await;

    transport.set_offline(true);

    let page = app.engine.handle(Request::document(url("/portfolio"))).await;
    assert_eq!(page.source, ResponseSource::StaleCache);
    assert_eq!(page.body, b"<html>portfolio</html>");

    let unknown = app.engine.handle(Request::document(url("/alerts"))).await;
    assert_eq!(unknown.source, ResponseSource::Fallback);
    assert_eq!(unknown.body, b"<html>offline</html>");

    let script = app.engine.handle(Request::get(url("/app.js"))).await;
    assert_eq!(script.source, ResponseSource::Cache);

    let api = app.engine.handle(Request::get(url("/api/alerts"))).await;
    assert_eq!(api.status, 503);
    let body: serde_json::Value = serde_json::from_slice(&api.body).unwrap();
    assert_eq!(body["errorKind"], "offline");

    let image = app.engine.handle(Request::get(url("/coins/eth.png"))).await;
    assert_eq!(image.status, 404);
    assert!(image.body.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_status_counts_match_partitions() {
    let server = origin_server().await;
    mount_get(&server, "/api/prices", "{}").await;
    mount_get(&server, "/markets", "markets").await;

    let (app, _transport) = app_with(config_for(&server, "v1"), Arc::new(MemoryStore::new())).await;
    app.lifecycle.install().await.unwrap();
    let report = app
        .commands
        .prefetch(&[format!("{}/markets", server.uri())])
        .await;
    assert!(report.is_complete());
    app.commands
        .update_cache("api", &[format!("{}/api/prices", server.uri())])
        .await;

    let status = app.commands.status().await.unwrap();
    assert_eq!(status["static-v1"], 3);
    assert_eq!(status["dynamic-v1"], 1);
    assert_eq!(status["api-v1"], 1);
}

#[test_log::test(tokio::test)]
async fn test_sync_replay_posts_queued_writes() {
    let server = origin_server().await;
    Mock::given(method("POST"))
        .and(path("/sync/portfolio"))
        .and(body_json(serde_json::json!({"symbol": "BTC", "units": 2})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sync/alerts"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut config = config_for(&server, "v1");
    config.sync.endpoint = Some(Url::parse(&format!("{}/sync", server.uri())).unwrap());
    let (app, _transport) = app_with(config, Arc::new(MemoryStore::new())).await;

    app.sync_queue
        .enqueue(SyncDomain::Portfolio, serde_json::json!({"symbol": "BTC", "units": 2}))
        .await
        .unwrap();
    let alert = app
        .sync_queue
        .enqueue(SyncDomain::Alerts, serde_json::json!({"above": 70000}))
        .await
        .unwrap();

    let mut notifications = app.notifier.subscribe();
    let report = app
        .sync_queue
        .replay(&app.sync_targets(), Some(&app.notifier))
        .await
        .unwrap();

    assert_eq!(report.replayed.len(), 1);
    assert_eq!(report.retained.len(), 1);
    let pending = app.sync_queue.pending().await.unwrap();
    assert_eq!(pending, vec![alert]);
    assert_eq!(
        notifications.recv().await.unwrap(),
        Notification::PortfolioSyncComplete { success: true }
    );
}

#[test_log::test(tokio::test)]
async fn test_run_command_with_config_file() {
    let server = origin_server().await;
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.yaml");
    let yaml = format!(
        concat!(
            "version: v1\norigin: {}\ndata_path: {}\n",
            "static_manifest: ['/', '/offline.html', '/app.js']\n"
        ),
        server.uri(),
        dir.path().join("data").display()
    );
    std::fs::write(&config_path, yaml).unwrap();
    let config_path = config_path.to_str().unwrap();

    pricekeep::run_command(pricekeep::AppCommand::Install, Some(config_path), false)
        .await
        .unwrap();
    pricekeep::run_command(pricekeep::AppCommand::Status, Some(config_path), false)
        .await
        .unwrap();
    pricekeep::run_command(pricekeep::AppCommand::Activate, Some(config_path), false)
        .await
        .unwrap();

    let store = DiskStore::open_at(&dir.path().join("data").join("cache")).unwrap();
    let static_v1 = store.open("static-v1").await.unwrap();
    assert_eq!(static_v1.len().await.unwrap(), 3);
}
