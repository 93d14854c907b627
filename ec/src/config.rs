//! Configuration types and loading for editchunk

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured API root
pub const API_URL_ENV: &str = "EDITMODE_OVERRIDE_API_URL";

/// Main editchunk configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project whose chunks are resolved
    #[serde(rename = "project-id")]
    pub project_id: String,

    /// API access token, passed through for the transport
    #[serde(rename = "access-token")]
    pub access_token: String,

    /// Whether the view layer auto-includes the editor script
    #[serde(rename = "auto-include")]
    pub auto_include: bool,

    /// API base URL
    #[serde(rename = "api-url")]
    pub api_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Cache store configuration
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            access_token: String::new(),
            auto_include: false,
            api_url: "https://api.editmode.com".to_string(),
            timeout_ms: 30_000,
            log_level: None,
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Create a config for a project with every other setting defaulted
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.project_id.trim().is_empty() {
            return Err(eyre::eyre!(
                "Project id not configured. Set project-id in .editchunk.yml or pass --config."
            ));
        }
        Ok(())
    }

    /// API root, honoring the environment override
    pub fn api_root(&self) -> String {
        let root = match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => self.api_url.clone(),
        };
        root.trim_end_matches('/').to_string()
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .editchunk.yml
        let local_config = PathBuf::from(".editchunk.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/editchunk/editchunk.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("editchunk").join("editchunk.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Which cache store backs chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local in-memory map
    #[default]
    Memory,
    /// One JSON file per key under `path`
    File,
}

/// Cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Directory used by the file backend
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            path: default_cache_path(),
        }
    }
}

fn default_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("editchunk")
        .join("cache")
}
