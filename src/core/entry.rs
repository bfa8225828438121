//! Cached responses and their stored representation.

use crate::core::classify::ContentClass;
use crate::core::error::{CacheError, Result};
use crate::core::request::{Response, ResponseSource};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    /// Freshness marker in epoch millis; written once per entry.
    pub stored_at: Option<i64>,
    pub class: ContentClass,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    key: String,
    status: u16,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    body: String,
    #[serde(default)]
    cached_at: Option<String>,
    class: ContentClass,
}

impl CacheEntry {
    /// Stamps a fresh marker on a response that just came off the network.
    pub fn from_response(key: String, response: &Response, class: ContentClass) -> Self {
        Self {
            key,
            status: response.status,
            headers: response.headers.clone(),
            body: response.body.clone(),
            stored_at: Some(now_millis()),
            class,
        }
    }

    pub fn age_millis(&self, now: i64) -> Option<i64> {
        self.stored_at.map(|stored_at| now.saturating_sub(stored_at))
    }

    pub fn to_response(&self, source: ResponseSource) -> Response {
        Response {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
            source,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let stored = StoredEntry {
            key: self.key.clone(),
            status: self.status,
            headers: self.headers.clone(),
            body: STANDARD.encode(&self.body),
            cached_at: self.stored_at.map(|ts| ts.to_string()),
            class: self.class,
        };
        Ok(serde_json::to_vec(&stored)?)
    }

    /// An unparsable marker decodes as no marker at all.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let stored: StoredEntry = serde_json::from_slice(bytes)?;
        let body = STANDARD
            .decode(stored.body.as_bytes())
            .map_err(|e| CacheError::Codec(e.to_string()))?;
        Ok(Self {
            key: stored.key,
            status: stored.status,
            headers: stored.headers,
            body,
            stored_at: stored.cached_at.and_then(|ts| ts.parse().ok()),
            class: stored.class,
        })
    }
}
