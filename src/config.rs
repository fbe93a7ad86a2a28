use crate::engine::{Theme, DEFAULT_BLOCKLIST_KEY, DEFAULT_THEME_KEY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub theme: ThemeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
    #[serde(default = "default_blocklist_key")]
    pub blocklist_key: String,
    #[serde(default = "default_theme_key")]
    pub theme_key: String,
    // 0 disables the deadline
    #[serde(default = "default_storage_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub quota_bytes_per_item: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ThemeConfig {
    #[serde(default)]
    pub fallback: Theme,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Defaults
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_storage_backend() -> String {
    "sqlite".to_string()
}
fn default_sqlite_path() -> String {
    "nope-list.db".to_string()
}
fn default_blocklist_key() -> String {
    DEFAULT_BLOCKLIST_KEY.to_string()
}
fn default_theme_key() -> String {
    DEFAULT_THEME_KEY.to_string()
}
fn default_storage_timeout_ms() -> u64 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage: StorageConfig::default(),
            theme: ThemeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            sqlite_path: default_sqlite_path(),
            blocklist_key: default_blocklist_key(),
            theme_key: default_theme_key(),
            timeout_ms: default_storage_timeout_ms(),
            quota_bytes_per_item: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config TOML")
    }
}
