//! Configuration loading and backend URL resolution
//!
//! # Sources Priority
//!
//! 1. Command-line arguments (`--config`, `--backend-url`)
//! 2. Environment variables (`CLAB_CONFIG`, `CLAB_BACKEND_URL`)
//! 3. TOML configuration file (`<config dir>/clab/config.toml`)
//! 4. Built-in defaults (code constants)
//!
//! A missing default config file never stops startup. A file named explicitly
//! on the command line or through `CLAB_CONFIG` must exist and parse.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Backend address used by the original deployment
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CLAB_CONFIG";

/// Environment variable overriding the backend URL
pub const BACKEND_URL_ENV_VAR: &str = "CLAB_BACKEND_URL";

/// Configuration loaded from TOML file
///
/// Every section is optional; missing keys fall back to built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Clustering backend connection
    #[serde(default)]
    pub backend: BackendConfig,

    /// Label export destination
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Clustering backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend (e.g. `http://127.0.0.1:5000`)
    #[serde(default)]
    pub url: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Label export settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    /// Where to write the label table once review completes
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }
}

/// Where a configuration file path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine,
    Environment,
    DefaultLocation,
}

/// Resolves and loads the TOML configuration
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Locate the config file following the priority order
    pub fn config_path(&self) -> Option<(PathBuf, ConfigSource)> {
        if let Some(path) = &self.cli_path {
            return Some((path.clone(), ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.is_empty() {
                return Some((PathBuf::from(path), ConfigSource::Environment));
            }
        }

        default_config_path().map(|path| (path, ConfigSource::DefaultLocation))
    }

    /// Load the configuration, falling back to defaults when no file applies
    pub fn load(&self) -> Result<TomlConfig> {
        match self.config_path() {
            Some((path, ConfigSource::DefaultLocation)) => {
                if !path.exists() {
                    info!("No config file at {}, using defaults", path.display());
                    return Ok(TomlConfig::default());
                }
                match TomlConfig::load(&path) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        Ok(config)
                    }
                    Err(e) => {
                        warn!("Ignoring config file {}: {}", path.display(), e);
                        Ok(TomlConfig::default())
                    }
                }
            }
            Some((path, _)) => {
                let config = TomlConfig::load(&path)?;
                info!("Loaded config from {}", path.display());
                Ok(config)
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(TomlConfig::default())
            }
        }
    }
}

/// Get default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clab").join("config.toml"))
}

/// Backend URL resolution:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. Compiled default
pub fn resolve_backend_url(cli_arg: Option<&str>, env_var_name: &str, config: &TomlConfig) -> String {
    let url = if let Some(url) = cli_arg {
        url.to_string()
    } else if let Some(url) = std::env::var(env_var_name).ok().filter(|v| !v.is_empty()) {
        url
    } else if let Some(url) = &config.backend.url {
        url.clone()
    } else {
        DEFAULT_BACKEND_URL.to_string()
    };

    url.trim_end_matches('/').to_string()
}
