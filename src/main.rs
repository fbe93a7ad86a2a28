use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use nope_list::api::{start_api_server, ApiState};
use nope_list::config::Config;
use nope_list::init::{init_storage, init_stores, setup_logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting nope-list...");

    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // 3. Init Storage & Stores
    let storage = init_storage(&config)?;
    let (blocklist, theme) = init_stores(&config, storage);

    // 4. Initial Load (a failed read leaves an empty list, not a dead process)
    if let Err(e) = blocklist.load().await {
        warn!("Starting with an empty blocklist: {}", e);
    }
    let current_theme = theme.load().await;
    info!("Theme: {:?}", current_theme);

    // 5. Log Blocklist Changes
    let mut events = blocklist.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(?event, "Blocklist changed"),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Change log lagged, {} events skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 6. Start API Server
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("Invalid host address '{}'", config.host))?,
        config.port,
    );
    let state = Arc::new(ApiState { blocklist, theme });

    // 7. Graceful Shutdown
    tokio::select! {
        res = start_api_server(state, addr) => res?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    Ok(())
}
