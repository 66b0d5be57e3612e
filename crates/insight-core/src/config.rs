//! Configuration management for Insight.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default PageSpeed Insights v5 endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/pagespeedonline/v5/runPagespeed";

/// Main application configuration.
///
/// This is loaded from `~/.config/insight/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Remote API settings
    pub api: ApiConfig,
    /// Batch execution settings
    pub batch: BatchConfig,
    /// Default analysis parameters
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `INSIGHT_API_KEYS`: Comma separated API keys
    /// - `INSIGHT_KEY_ROTATION`: `single`, `random` or `round-robin`
    /// - `INSIGHT_MAX_CONCURRENCY`: Override the batch concurrency cap
    /// - `INSIGHT_ENDPOINT`: Override the API endpoint
    /// - `INSIGHT_TIMEOUT_SECS`: Override the request timeout
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    ///
    /// Unparseable numeric values are ignored; an unknown rotation mode is
    /// reported as an invalid value.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("INSIGHT_API_KEYS") {
            self.api.keys = val
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToString::to_string)
                .collect();
            tracing::debug!("Override api.keys from env: {} keys", self.api.keys.len());
        }

        if let Some(val) = lookup("INSIGHT_KEY_ROTATION") {
            self.api.key_rotation = val.parse()?;
            tracing::debug!("Override api.key_rotation from env: {}", self.api.key_rotation);
        }

        if let Some(val) = lookup("INSIGHT_MAX_CONCURRENCY") {
            if let Ok(max) = val.parse() {
                self.batch.max_concurrency = max;
                tracing::debug!("Override batch.max_concurrency from env: {}", max);
            }
        }

        if let Some(val) = lookup("INSIGHT_ENDPOINT") {
            tracing::debug!("Override api.endpoint from env: {}", val);
            self.api.endpoint = val;
        }

        if let Some(val) = lookup("INSIGHT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.api.timeout_secs = secs;
                tracing::debug!("Override api.timeout_secs from env: {}", secs);
            }
        }

        Ok(())
    }

    /// Check values that would make the client unusable.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.api.endpoint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api.endpoint".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.batch.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.max_concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/insight/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "insight", "insight").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// `runPagespeed` endpoint URL
    pub endpoint: String,
    /// API keys; empty means unauthenticated requests
    pub keys: Vec<String>,
    /// How keys are picked when more than one is configured
    pub key_rotation: RotationMode,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            keys: Vec::new(),
            key_rotation: RotationMode::RoundRobin,
            // A full Lighthouse run regularly takes more than 30 seconds.
            timeout_secs: 120,
            user_agent: "Insight/0.1.0 (+https://github.com/insight-tools/insight)".to_string(),
        }
    }
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of analyses in flight at once
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Default analysis parameters applied to every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Lighthouse categories, e.g. `PERFORMANCE`, `SEO`
    pub categories: Vec<String>,
    /// `mobile` or `desktop`; empty leaves the server default
    pub strategy: String,
    /// Locale used for localized results
    pub locale: Option<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            categories: vec!["PERFORMANCE".to_string()],
            strategy: "mobile".to_string(),
            locale: None,
        }
    }
}

/// Key selection policy for a multi-key credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationMode {
    /// Always use the first key
    Single,
    /// Uniformly random key on every call
    Random,
    /// Keys in order, wrapping around
    #[default]
    RoundRobin,
}

impl fmt::Display for RotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Random => "random",
            Self::RoundRobin => "round-robin",
        };
        f.write_str(name)
    }
}

impl FromStr for RotationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "random" => Ok(Self::Random),
            "round-robin" | "round_robin" | "roundrobin" => Ok(Self::RoundRobin),
            other => Err(ConfigError::InvalidValue {
                field: "api.key_rotation".to_string(),
                reason: format!("unknown rotation mode '{other}'"),
            }),
        }
    }
}
