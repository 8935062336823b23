//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! backend base URL, the platform identifier sent on token refresh, where
//! credentials are persisted, and which locale resource to load.
//!
//! Configuration is stored at `~/.config/jobdesk/config.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
use crate::models::Platform;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "jobdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Credential file name in the cache directory (file backend)
const CREDENTIALS_FILE: &str = "credentials.json";

/// Default backend base URL
pub const DEFAULT_API_BASE_URL: &str = "https://api.jobdesk.app";

/// HTTP request timeout in seconds.
/// 30s allows for slow mobile networks while failing fast enough for good UX.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "JOBDESK_API_URL";

/// Environment variable overriding `locale_path`
pub const LOCALE_ENV: &str = "JOBDESK_LOCALE";

/// Where session credentials are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// OS keychain
    Keyring,
    /// JSON file in the cache directory
    #[default]
    File,
    /// Process memory only
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub platform: Platform,
    pub request_timeout_secs: u64,
    pub credential_backend: CredentialBackend,
    pub locale_path: Option<PathBuf>,
    pub last_email: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            platform: Platform::current(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            credential_backend: CredentialBackend::default(),
            locale_path: None,
            last_email: None,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&contents).context("Failed to parse config file")
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `JOBDESK_API_URL` / `JOBDESK_LOCALE` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(locale) = lookup(LOCALE_ENV).filter(|v| !v.trim().is_empty()) {
            self.locale_path = Some(PathBuf::from(locale));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Build the configured credential backend
    pub fn credential_storage(&self) -> Result<Arc<dyn KeyValueStore>> {
        let storage: Arc<dyn KeyValueStore> = match self.credential_backend {
            CredentialBackend::Keyring => Arc::new(KeyringStore::new(APP_NAME)),
            CredentialBackend::File => {
                Arc::new(FileStore::new(self.cache_dir()?.join(CREDENTIALS_FILE)))
            }
            CredentialBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Ok(storage)
    }
}
