//! Configuration loading and settings persistence
//!
//! One TOML file carries both bootstrap values (port, logging) and the user
//! settings the UI edits (orchestrator host, AI host, image defaults, polling).
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `MVS_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/mvstudio/mvs-ui.toml`)
//! 4. `./mvs-ui.toml` (fallback)
//!
//! A missing file is not an error: defaults are used and a warning logged.
//! Settings are written back only on an explicit save.

use crate::poller::PollConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "MVS_CONFIG";
/// Environment override for the orchestrator base URL
pub const ORCHESTRATOR_ENV_VAR: &str = "MVS_ORCHESTRATOR_URL";
/// Environment override for the AI host
pub const AI_HOST_ENV_VAR: &str = "MVS_AI_HOST";

const CONFIG_DIR_NAME: &str = "mvstudio";
const CONFIG_FILE_NAME: &str = "mvs-ui.toml";

/// Complete TOML file contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP port of the UI service
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub settings: Settings,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            settings: Settings::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// User-editable settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Orchestrator base URL, e.g. `http://localhost:8000`
    #[serde(default = "default_orchestrator_host")]
    pub orchestrator_host: String,

    /// AI service base URL (prompt/image models run here)
    #[serde(default = "default_ai_host")]
    pub ai_host: String,

    #[serde(default)]
    pub image: ImageDefaults,

    #[serde(default)]
    pub polling: PollingSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            orchestrator_host: default_orchestrator_host(),
            ai_host: default_ai_host(),
            image: ImageDefaults::default(),
            polling: PollingSettings::default(),
        }
    }
}

/// Parameters applied to every image created from lyrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageDefaults {
    pub width: u32,
    pub height: u32,
    pub model: String,
    /// Used when prompt generation returns no negative prompt
    pub negative_prompt: String,
    pub genre: String,
    pub background_style: String,
}

impl Default for ImageDefaults {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            model: "sdxl".to_string(),
            negative_prompt: "blurry, low quality, text, watermark".to_string(),
            genre: "pop".to_string(),
            background_style: "cinematic".to_string(),
        }
    }
}

/// Polling cadence overrides (milliseconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub single_timeout_ms: u64,
    pub batch_timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: PollConfig::SINGLE_IMAGE.interval.as_millis() as u64,
            single_timeout_ms: PollConfig::SINGLE_IMAGE.timeout.as_millis() as u64,
            batch_timeout_ms: PollConfig::BATCH_IMAGES.timeout.as_millis() as u64,
        }
    }
}

impl PollingSettings {
    /// Cadence for single-image jobs
    pub fn single(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.single_timeout_ms),
        )
    }

    /// Cadence for batch jobs
    pub fn batch(&self) -> PollConfig {
        PollConfig::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.batch_timeout_ms),
        )
    }
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_orchestrator_host() -> String {
    "http://localhost:8000".to_string()
}

fn default_ai_host() -> String {
    "http://localhost:7860".to_string()
}

impl Settings {
    /// Validate before use or save
    pub fn validate(&self) -> Result<()> {
        validate_host("orchestrator_host", &self.orchestrator_host)?;
        validate_host("ai_host", &self.ai_host)?;

        for (name, value) in [("width", self.image.width), ("height", self.image.height)] {
            if value == 0 || value % 8 != 0 {
                return Err(Error::Config(format!(
                    "image {} must be a non-zero multiple of 8 (got {})",
                    name, value
                )));
            }
        }

        if self.image.model.trim().is_empty() {
            return Err(Error::Config("image model cannot be empty".to_string()));
        }

        let polling = &self.polling;
        if polling.interval_ms == 0 {
            return Err(Error::Config("polling interval must be positive".to_string()));
        }
        if polling.single_timeout_ms < polling.interval_ms
            || polling.batch_timeout_ms < polling.interval_ms
        {
            return Err(Error::Config(
                "polling timeouts must be at least one interval".to_string(),
            ));
        }

        Ok(())
    }
}

/// Host overrides for the current run
///
/// Applied on top of the persisted settings and never written back: a save
/// keeps the file's own value for a field whose override is still in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub orchestrator_host: Option<String>,
    pub ai_host: Option<String>,
}

impl SettingsOverrides {
    /// Overrides from `MVS_ORCHESTRATOR_URL` / `MVS_AI_HOST`
    pub fn from_env() -> Self {
        Self {
            orchestrator_host: env_host(ORCHESTRATOR_ENV_VAR),
            ai_host: env_host(AI_HOST_ENV_VAR),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orchestrator_host.is_none() && self.ai_host.is_none()
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.orchestrator_host {
            settings.orchestrator_host = host.clone();
        }
        if let Some(host) = &self.ai_host {
            settings.ai_host = host.clone();
        }
    }

    /// Split effective settings into the values to persist
    ///
    /// A field still equal to its override takes the value from `persisted`.
    /// A field the caller changed drops its override, so the new value is
    /// both saved and in effect.
    pub fn split(&mut self, effective: Settings, persisted: &Settings) -> Settings {
        let mut out = effective;
        if let Some(host) = &self.orchestrator_host {
            if out.orchestrator_host == *host {
                out.orchestrator_host = persisted.orchestrator_host.clone();
            } else {
                self.orchestrator_host = None;
            }
        }
        if let Some(host) = &self.ai_host {
            if out.ai_host == *host {
                out.ai_host = persisted.ai_host.clone();
            } else {
                self.ai_host = None;
            }
        }
        out
    }
}

fn env_host(var: &str) -> Option<String> {
    let host = std::env::var(var).ok()?;
    let host = host.trim();
    if host.is_empty() {
        return None;
    }
    info!("Host overridden by {}", var);
    Some(host.to_string())
}

fn validate_host(field: &str, value: &str) -> Result<()> {
    let value = value.trim();
    let rest = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))
        .ok_or_else(|| {
            Error::Config(format!("{} must start with http:// or https:// (got {:?})", field, value))
        })?;

    let authority = rest.split('/').next().unwrap_or_default();
    if authority.is_empty() || authority.contains(char::is_whitespace) {
        return Err(Error::Config(format!("{} has no host (got {:?})", field, value)));
    }
    Ok(())
}

/// Resolve the config file path
pub fn resolve_config_path(cli_arg: Option<&Path>) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3/4: Platform config dir, then working directory
    default_config_path()
}

/// Platform config file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Load the TOML config, falling back to defaults when the file is missing
///
/// A file that exists but does not parse is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Write the TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    info!("Config written to {}", path.display());
    Ok(())
}
