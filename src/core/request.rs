//! Request and response descriptors that flow through the core.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Method::Get => "GET",
                Method::Head => "HEAD",
                Method::Post => "POST",
                Method::Put => "PUT",
                Method::Patch => "PATCH",
                Method::Delete => "DELETE",
            }
        )
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(anyhow::anyhow!("Invalid request method: {}", s)),
        }
    }
}

/// What the page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Destination {
    Document,
    Script,
    Style,
    Font,
    Image,
    Manifest,
    #[default]
    Other,
}

impl FromStr for Destination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "document" => Ok(Destination::Document),
            "script" => Ok(Destination::Script),
            "style" => Ok(Destination::Style),
            "font" => Ok(Destination::Font),
            "image" => Ok(Destination::Image),
            "manifest" => Ok(Destination::Manifest),
            "other" | "" => Ok(Destination::Other),
            _ => Err(anyhow::anyhow!("Invalid request destination: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::Get,
            url,
            destination: Destination::Other,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn document(url: Url) -> Self {
        Self {
            destination: Destination::Document,
            ..Self::get(url)
        }
    }

    pub fn post_json(url: Url, payload: &serde_json::Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            method: Method::Post,
            url,
            destination: Destination::Other,
            headers,
            body: Some(payload.to_string().into_bytes()),
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Identity of the request inside a cache partition.
    pub fn cache_key(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    pub fn is_document(&self) -> bool {
        self.destination == Destination::Document
            || self
                .headers
                .get("accept")
                .is_some_and(|accept| accept.contains("text/html"))
    }

    /// Only plain GETs over http(s) are eligible for caching.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get && matches!(self.url.scheme(), "http" | "https")
    }
}

/// Where a response handed back to the caller came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    StaleCache,
    Fallback,
}

impl Display for ResponseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ResponseSource::Network => "network",
                ResponseSource::Cache => "cache",
                ResponseSource::StaleCache => "stale-cache",
                ResponseSource::Fallback => "fallback",
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub source: ResponseSource,
}

impl Response {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body,
            source: ResponseSource::Network,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    /// Structured body returned for API requests that cannot be served.
    pub fn offline_api() -> Self {
        let body = serde_json::json!({
            "errorKind": "offline",
            "httpStatus": 503,
        });
        let mut response = Self::new(503, body.to_string().into_bytes());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response.with_source(ResponseSource::Fallback)
    }

    pub fn unavailable() -> Self {
        Self::new(503, Vec::new()).with_source(ResponseSource::Fallback)
    }

    /// Zero-length stand-in for images that cannot be served.
    pub fn missing_image() -> Self {
        Self::new(404, Vec::new()).with_source(ResponseSource::Fallback)
    }
}
