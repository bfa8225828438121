use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;
use url::Url;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FreshnessConfig {
    #[serde(default = "FreshnessConfig::default_api_secs")]
    pub api_secs: u64,
    #[serde(default = "FreshnessConfig::default_image_secs")]
    pub image_secs: u64,
    #[serde(default = "FreshnessConfig::default_dynamic_secs")]
    pub dynamic_secs: u64,
}

impl FreshnessConfig {
    fn default_api_secs() -> u64 {
        5 * 60
    }

    fn default_image_secs() -> u64 {
        7 * 24 * 60 * 60
    }

    fn default_dynamic_secs() -> u64 {
        24 * 60 * 60
    }
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        FreshnessConfig {
            api_secs: Self::default_api_secs(),
            image_secs: Self::default_image_secs(),
            dynamic_secs: Self::default_dynamic_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub interval_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        MaintenanceConfig {
            interval_secs: 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub api_path_prefixes: Vec<String>,
    pub api_hosts: Vec<String>,
    pub static_extensions: Vec<String>,
    pub image_extensions: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let owned =
            |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        ClassifierConfig {
            api_path_prefixes: owned(&["/api/"]),
            api_hosts: Vec::new(),
            static_extensions: owned(&["js", "css", "woff", "woff2", "ttf", "webmanifest"]),
            image_extensions: owned(&["png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "avif"]),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TransportConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            user_agent: "pricekeep/0.1".to_string(),
            timeout_secs: 30,
            retries: 1,
            retry_delay_ms: 250,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SyncConfig {
    pub endpoint: Option<Url>,
}

fn default_version() -> String {
    "v1".to_string()
}

fn default_offline_document() -> String {
    "/offline.html".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: String,
    pub origin: Url,
    pub data_path: Option<String>,
    #[serde(default)]
    pub static_manifest: Vec<String>,
    #[serde(default = "default_offline_document")]
    pub offline_document: String,
    #[serde(default = "default_true")]
    pub eager_activation: bool,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Minimal configuration for an origin, every other knob at its default.
    pub fn for_origin(origin: Url) -> Self {
        AppConfig {
            version: default_version(),
            origin,
            data_path: None,
            static_manifest: Vec::new(),
            offline_document: default_offline_document(),
            eager_activation: true,
            freshness: FreshnessConfig::default(),
            maintenance: MaintenanceConfig::default(),
            classifier: ClassifierConfig::default(),
            transport: TransportConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "pricekeep", "pricekeep")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "pricekeep", "pricekeep")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.validate()?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Partition names embed the version, so it must be a valid store name.
    /// The maintenance interval drives a ticker and must not be zero.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty()
            || !self
                .version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            bail!(
                "Invalid version '{}': use letters, digits, '-' or '_'",
                self.version
            );
        }
        if !self.static_manifest.is_empty()
            && !self
                .static_manifest
                .iter()
                .any(|entry| entry == &self.offline_document)
        {
            bail!(
                "Offline document '{}' must be part of the static manifest",
                self.offline_document
            );
        }
        if self.maintenance.interval_secs == 0 {
            bail!("maintenance.interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Absolute URLs for every manifest entry.
    pub fn manifest_urls(&self) -> Result<Vec<Url>> {
        self.static_manifest
            .iter()
            .map(|entry| self.resolve(entry))
            .collect()
    }

    pub fn offline_document_url(&self) -> Result<Url> {
        self.resolve(&self.offline_document)
    }

    pub fn resolve(&self, entry: &str) -> Result<Url> {
        self.origin
            .join(entry)
            .with_context(|| format!("Invalid URL or path: {entry}"))
    }
}
