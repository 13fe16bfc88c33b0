//! Settings store
//!
//! Loaded once at startup and shared through AppState. The TOML file is only
//! rewritten on an explicit save, and run overrides (environment or CLI)
//! never reach it.

use mvs_common::config::{write_toml_config, Settings, SettingsOverrides, TomlConfig};
use mvs_common::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Clone)]
pub struct SettingsStore {
    /// None keeps settings in memory only
    path: Option<PathBuf>,
    /// Config as persisted, without overrides
    config: Arc<RwLock<TomlConfig>>,
    overrides: Arc<RwLock<SettingsOverrides>>,
}

impl SettingsStore {
    pub fn new(config: TomlConfig, path: Option<PathBuf>) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(config)),
            overrides: Arc::new(RwLock::new(SettingsOverrides::default())),
        }
    }

    /// In-memory store with default settings
    pub fn in_memory(settings: Settings) -> Self {
        Self::new(
            TomlConfig {
                settings,
                ..TomlConfig::default()
            },
            None,
        )
    }

    pub fn with_overrides(self, overrides: SettingsOverrides) -> Self {
        Self {
            overrides: Arc::new(RwLock::new(overrides)),
            ..self
        }
    }

    /// Settings in effect: persisted values with run overrides applied
    pub async fn settings(&self) -> Settings {
        let config = self.config.read().await;
        let mut settings = config.settings.clone();
        self.overrides.read().await.apply(&mut settings);
        settings
    }

    /// Validate, persist, then publish new settings
    ///
    /// `settings` are the effective values. Fields still equal to a run
    /// override are saved with their persisted value; a field the user
    /// changed replaces its override. On any error the previous settings
    /// stay in effect.
    pub async fn save(&self, settings: Settings) -> Result<()> {
        settings.validate()?;

        let mut config = self.config.write().await;
        let mut overrides = self.overrides.write().await;

        let mut remaining = overrides.clone();
        let mut updated = config.clone();
        updated.settings = remaining.split(settings, &config.settings);

        if let Some(path) = &self.path {
            write_toml_config(&updated, path)?;
        }

        *config = updated;
        *overrides = remaining;
        info!("Settings saved");
        Ok(())
    }
}
