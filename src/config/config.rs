//! Sitesmith configuration management
//! Handles loading and saving the YAML config file

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Sitesmith configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database path
    #[serde(default = "default_db_path")]
    pub database_path: String,

    /// Delay before a burst of edits is written to storage
    #[serde(default = "default_debounce_ms")]
    pub autosave_debounce_ms: u64,

    /// Generation backend settings
    #[serde(default)]
    pub gemini: GeminiConfig,
}

fn default_db_path() -> String {
    "~/.sitesmith/sitesmith.db".to_string()
}

fn default_debounce_ms() -> u64 {
    800
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            autosave_debounce_ms: default_debounce_ms(),
            gemini: GeminiConfig::default(),
        }
    }
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; falls back to GEMINI_API_KEY / API_KEY when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeminiConfig {
    /// Configured key, else the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.is_empty()))
            .or_else(|| std::env::var("API_KEY").ok().filter(|k| !k.is_empty()))
    }
}

impl Config {
    /// Load config from the default location or specified path
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = Self::config_path(path)?;

        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&raw).context("Failed to parse config file")?;

        debug!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self, path: Option<&str>) -> Result<()> {
        let config_path = Self::config_path(path)?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(&self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        info!("Saved config to {:?}", config_path);
        Ok(())
    }

    /// Get the config file path
    fn config_path(path: Option<&str>) -> Result<PathBuf> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        if let Ok(env_path) = std::env::var("SITESMITH_CONFIG") {
            return Ok(PathBuf::from(env_path));
        }

        let home = dirs::home_dir().context("Cannot find home directory")?;
        Ok(home.join(".sitesmith").join("config.yml"))
    }

    /// Resolve database path (expand ~)
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if !self.database_path.starts_with('~') {
            return Ok(PathBuf::from(&self.database_path));
        }
        let home = dirs::home_dir().context("Cannot find home directory")?;
        let path = self.database_path.replacen('~', &home.to_string_lossy(), 1);
        Ok(PathBuf::from(path))
    }
}
