//! Initialization helpers for the application startup.

use crate::config::Config;
use crate::engine::{BlocklistStore, ThemeStore};
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Sets up the tracing subscriber with the configured filters.
pub fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress hyper/tower logs unless explicitly enabled/overridden
        if !filter.contains("hyper") {
            filter.push_str(",hyper=off");
        }
        if !filter.contains("tower_http") {
            filter.push_str(",tower_http=off");
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Opens the storage backend named in `[storage]`.
pub fn init_storage(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let storage = &config.storage;
    match storage.backend.as_str() {
        "sqlite" => {
            info!("Using SQLite storage at {}", storage.sqlite_path);
            let store = SqliteStore::open(storage.sqlite_path.clone())
                .context("Failed to open SQLite storage")?;
            Ok(Arc::new(store))
        }
        other => {
            if other != "memory" {
                warn!("Unknown storage backend '{}', defaulting to memory", other);
            }
            info!("Using in-memory storage; the blocklist will not survive a restart.");
            let store = match storage.quota_bytes_per_item {
                Some(quota) => MemoryStore::with_quota(quota),
                None => MemoryStore::new(),
            };
            Ok(Arc::new(store))
        }
    }
}

/// Builds both stores over the same storage backend.
pub fn init_stores(
    config: &Config,
    storage: Arc<dyn KeyValueStore>,
) -> (Arc<BlocklistStore>, Arc<ThemeStore>) {
    let blocklist = Arc::new(BlocklistStore::from_config(
        storage.clone(),
        &config.storage,
    ));
    let theme = Arc::new(ThemeStore::new(
        storage,
        config.storage.theme_key.clone(),
        config.theme.fallback,
    ));
    (blocklist, theme)
}
