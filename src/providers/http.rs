use crate::core::config::TransportConfig;
use crate::core::error::{CacheError, Result};
use crate::core::request::{Method, Request, Response};
use crate::core::transport::Transport;
use crate::providers::util::with_retry;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
    retries: usize,
    retry_delay_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CacheError::network("<client>", e))?;
        Ok(Self {
            client,
            retries: config.retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    async fn send_once(&self, request: &Request) -> std::result::Result<Response, reqwest::Error> {
        let mut builder = self
            .client
            .request(Self::method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        let mut out = Response::new(status, body);
        out.headers = headers;
        Ok(out)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(
        name = "HttpFetch",
        skip(self, request),
        fields(method = %request.method, url = %request.url)
    )]
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let response = with_retry(
            || self.send_once(request),
            self.retries,
            self.retry_delay_ms,
        )
        .await
        .map_err(|e| CacheError::network(request.url.as_str(), e))?;
        debug!(status = response.status, bytes = response.body.len(), "Received response");
        Ok(response)
    }
}
