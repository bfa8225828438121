//! Maps every request to the content class that picks its cache strategy.

use crate::core::config::ClassifierConfig;
use crate::core::request::{Destination, Request};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentClass {
    Api,
    Static,
    Image,
    Dynamic,
}

impl Display for ContentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ContentClass::Api => "api",
                ContentClass::Static => "static",
                ContentClass::Image => "image",
                ContentClass::Dynamic => "dynamic",
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    manifest_paths: HashSet<String>,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(origin: Url, manifest: &[Url], config: ClassifierConfig) -> Self {
        let manifest_paths = manifest
            .iter()
            .filter(|url| url.origin() == origin.origin())
            .map(|url| url.path().to_string())
            .collect();
        Self {
            origin,
            manifest_paths,
            config,
        }
    }

    /// First match wins, in the order api, static, image; dynamic otherwise.
    pub fn classify(&self, request: &Request) -> ContentClass {
        if self.is_api(request) {
            ContentClass::Api
        } else if self.is_static(request) {
            ContentClass::Static
        } else if self.is_image(request) {
            ContentClass::Image
        } else {
            ContentClass::Dynamic
        }
    }

    fn is_api(&self, request: &Request) -> bool {
        let path = request.url.path();
        let host_match = request
            .url
            .host_str()
            .is_some_and(|host| self.config.api_hosts.iter().any(|h| h == host));
        host_match
            || self
                .config
                .api_path_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    fn is_static(&self, request: &Request) -> bool {
        let same_origin = request.url.origin() == self.origin.origin();
        if same_origin && self.manifest_paths.contains(request.url.path()) {
            return true;
        }
        if matches!(
            request.destination,
            Destination::Script | Destination::Style | Destination::Font | Destination::Manifest
        ) {
            return true;
        }
        extension(&request.url).is_some_and(|ext| {
            self.config
                .static_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
    }

    fn is_image(&self, request: &Request) -> bool {
        if request.destination == Destination::Image {
            return true;
        }
        extension(&request.url).is_some_and(|ext| {
            self.config
                .image_extensions
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ext))
        })
    }
}

fn extension(url: &Url) -> Option<&str> {
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    (!stem.is_empty()).then_some(ext)
}
