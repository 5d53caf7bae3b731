//! Configuration storage
//!
//! JSON file holding the update source and helper layout:
//! - Atomic writes using temp file + rename
//! - Thread-safe access via RwLock
//! - Default configuration generation

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

use crate::core::options::{HelperExecutable, UpdateOptions};
use crate::update::manager::UpdateManager;
use crate::update::source::{ManifestSource, ReleaseFeedSource, UpdateSource};

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration store settings
#[derive(Debug, Clone)]
pub struct ConfigStoreConfig {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Whether to create default config if not exists
    pub create_default: bool,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        let app_data = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("app-update");

        Self {
            config_path: app_data.join("update.json"),
            create_default: true,
        }
    }
}

/// Where releases are published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON manifest with per-platform artifacts
    Manifest { url: Url },
    /// GitHub-style "latest release" endpoint
    ReleaseFeed {
        url: Url,
        asset_prefix: String,
        #[serde(default = "default_extension")]
        extension: String,
    },
}

fn default_extension() -> String {
    ".zip".to_string()
}

impl SourceConfig {
    /// Build the configured source on top of `client`
    pub fn build(&self, client: reqwest::Client) -> Arc<dyn UpdateSource> {
        match self {
            SourceConfig::Manifest { url } => Arc::new(ManifestSource::new(url.clone(), client)),
            SourceConfig::ReleaseFeed {
                url,
                asset_prefix,
                extension,
            } => Arc::new(ReleaseFeedSource::new(
                url.clone(),
                asset_prefix.clone(),
                extension.clone(),
                client,
            )),
        }
    }
}

/// Update subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Release source; updates are disabled while unset
    #[serde(default)]
    pub source: Option<SourceConfig>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Helper directory, relative to the application root
    #[serde(default = "default_helper_dir")]
    pub helper_relative_dir: PathBuf,

    /// Helper executable name per OS
    #[serde(default)]
    pub helper_executable: HelperExecutable,

    /// Root for downloads and staged helpers; system temp dir when unset
    #[serde(default)]
    pub temp_root: Option<PathBuf>,

    /// Last modified timestamp
    #[serde(default = "default_timestamp")]
    pub last_modified: String,
}

fn default_http_timeout() -> u64 {
    60
}

fn default_helper_dir() -> PathBuf {
    PathBuf::from("updater")
}

fn default_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            source: None,
            http_timeout_secs: default_http_timeout(),
            helper_relative_dir: default_helper_dir(),
            helper_executable: HelperExecutable::default(),
            temp_root: None,
            last_modified: default_timestamp(),
        }
    }
}

impl UpdateConfig {
    /// Options for one operation; version, platform and layout providers keep
    /// their defaults.
    pub fn to_options(&self) -> UpdateOptions {
        let mut options = UpdateOptions::new()
            .with_helper(self.helper_relative_dir.clone(), self.helper_executable.clone());
        options.http_timeout = Duration::from_secs(self.http_timeout_secs);
        if let Some(temp_root) = &self.temp_root {
            options.temp_root = temp_root.clone();
        }
        options
    }

    /// Manager for the configured source, using `options`
    pub fn build_manager(&self, options: UpdateOptions) -> ConfigResult<UpdateManager> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no update source configured".to_string()))?;
        let client = options
            .http_client()
            .map_err(|e| ConfigError::Invalid(format!("http client: {}", e)))?;
        Ok(UpdateManager::with_client(
            source.build(client.clone()),
            options,
            client,
        ))
    }
}

/// Thread-safe configuration store
pub struct ConfigStore {
    config: Arc<RwLock<UpdateConfig>>,
    settings: ConfigStoreConfig,
}

impl ConfigStore {
    /// Create a new configuration store
    pub async fn new(settings: ConfigStoreConfig) -> ConfigResult<Self> {
        if let Some(parent) = settings.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let config = if settings.config_path.exists() {
            Self::load_from_file(&settings.config_path).await?
        } else if settings.create_default {
            let default_config = UpdateConfig::default();
            Self::save_to_file(&settings.config_path, &default_config).await?;
            default_config
        } else {
            return Err(ConfigError::NotFound(settings.config_path.clone()));
        };

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            settings,
        })
    }

    async fn load_from_file(path: &Path) -> ConfigResult<UpdateConfig> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: UpdateConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file with atomic write
    async fn save_to_file(path: &Path, config: &UpdateConfig) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(config)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    /// Get current configuration (read-only)
    pub async fn get(&self) -> UpdateConfig {
        self.config.read().await.clone()
    }

    /// Update configuration
    pub async fn update<F>(&self, updater: F) -> ConfigResult<UpdateConfig>
    where
        F: FnOnce(&mut UpdateConfig),
    {
        let mut config = self.config.write().await;
        updater(&mut config);
        config.last_modified = chrono::Utc::now().to_rfc3339();
        Self::save_to_file(&self.settings.config_path, &config).await?;
        Ok(config.clone())
    }

    /// Point updates at a different source
    pub async fn set_source(&self, source: SourceConfig) -> ConfigResult<UpdateConfig> {
        self.update(|config| config.source = Some(source)).await
    }

    /// Reset to default configuration
    pub async fn reset(&self) -> ConfigResult<UpdateConfig> {
        self.update(|config| *config = UpdateConfig::default()).await
    }

    /// Get configuration file path
    pub fn config_path(&self) -> &Path {
        &self.settings.config_path
    }
}
