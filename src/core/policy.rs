use crate::core::classify::ContentClass;
use crate::core::config::FreshnessConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub class: ContentClass,
    /// `None` means entries never go stale by age.
    pub max_age: Option<Duration>,
}

/// Immutable class to max-age table, built once at startup.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    api: FreshnessPolicy,
    static_assets: FreshnessPolicy,
    image: FreshnessPolicy,
    dynamic: FreshnessPolicy,
}

impl PolicyTable {
    pub fn from_config(config: &FreshnessConfig) -> Self {
        Self {
            api: FreshnessPolicy {
                class: ContentClass::Api,
                max_age: Some(Duration::from_secs(config.api_secs)),
            },
            static_assets: FreshnessPolicy {
                class: ContentClass::Static,
                max_age: None,
            },
            image: FreshnessPolicy {
                class: ContentClass::Image,
                max_age: Some(Duration::from_secs(config.image_secs)),
            },
            dynamic: FreshnessPolicy {
                class: ContentClass::Dynamic,
                max_age: Some(Duration::from_secs(config.dynamic_secs)),
            },
        }
    }

    pub fn policy(&self, class: ContentClass) -> FreshnessPolicy {
        match class {
            ContentClass::Api => self.api,
            ContentClass::Static => self.static_assets,
            ContentClass::Image => self.image,
            ContentClass::Dynamic => self.dynamic,
        }
    }

    /// An entry without a marker is always stale; static entries never are.
    pub fn is_stale(&self, class: ContentClass, stored_at: Option<i64>, now_millis: i64) -> bool {
        let Some(max_age) = self.policy(class).max_age else {
            return false;
        };
        match stored_at {
            Some(stored_at) => {
                let age = now_millis.saturating_sub(stored_at);
                age > max_age.as_millis() as i64
            }
            None => true,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::from_config(&FreshnessConfig::default())
    }
}
