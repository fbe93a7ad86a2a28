use crate::storage::{KeyValueStore, StorageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

pub const DEFAULT_THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

#[derive(Debug, Error)]
#[error("failed to save theme: {0}")]
pub struct ThemeError(#[source] pub StorageError);

/// Light/dark preference kept under its own storage key.
///
/// Unlike the blocklist, the preference is applied in memory before the write:
/// a failed save is reported but does not revert the visible theme. Loads and
/// writes queue behind one async mutex so memory and storage end on the same
/// value.
pub struct ThemeStore {
    storage: Arc<dyn KeyValueStore>,
    key: String,
    fallback: Theme,
    gate: Mutex<()>,
    current: RwLock<Theme>,
}

impl ThemeStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, key: impl Into<String>, fallback: Theme) -> Self {
        Self {
            storage,
            key: key.into(),
            fallback,
            gate: Mutex::new(()),
            current: RwLock::new(Theme::default()),
        }
    }

    pub fn current(&self) -> Theme {
        *self.current.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the saved theme. Absent means light; a failed read or an unknown
    /// value falls back to the configured theme.
    pub async fn load(&self) -> Theme {
        let _turn = self.gate.lock().await;
        let theme = match self.storage.get(&self.key).await {
            Ok(None) => Theme::Light,
            Ok(Some(value)) => parse_theme(value).unwrap_or_else(|| {
                warn!("Unrecognized theme value, using {:?}", self.fallback);
                self.fallback
            }),
            Err(e) => {
                error!("Error loading theme: {}", e);
                self.fallback
            }
        };

        self.apply(theme);
        theme
    }

    pub async fn set(&self, theme: Theme) -> Result<Theme, ThemeError> {
        let _turn = self.gate.lock().await;
        self.write(theme).await
    }

    pub async fn toggle(&self) -> Result<Theme, ThemeError> {
        let _turn = self.gate.lock().await;
        self.write(self.current().toggled()).await
    }

    // Caller holds `gate`.
    async fn write(&self, theme: Theme) -> Result<Theme, ThemeError> {
        self.apply(theme);

        let value = serde_json::to_value(theme).map_err(|e| ThemeError(e.into()))?;
        if let Err(e) = self.storage.set(&self.key, value).await {
            error!("Error saving theme: {}", e);
            return Err(ThemeError(e));
        }

        info!("Theme set to {:?}", theme);
        Ok(theme)
    }

    fn apply(&self, theme: Theme) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = theme;
    }
}

fn parse_theme(value: Value) -> Option<Theme> {
    serde_json::from_value(value).ok()
}
