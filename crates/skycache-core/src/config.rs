use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `provider.api_key`.
pub const API_KEY_ENV: &str = "SKYCACHE_API_KEY";

/// Upper bound for minute-valued settings: one year.
pub const MAX_MINUTES: u64 = 60 * 24 * 365;

const DEFAULT_GEOCODING_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";
const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// How an SDK instance keeps its cache current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    /// Fetch only when a caller asks.
    #[default]
    OnDemand,
    /// Also refresh every cached city in the background.
    Proactive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Remote weather provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// OpenWeatherMap API key (the environment variable wins when set)
    pub api_key: Option<String>,

    /// Direct geocoding endpoint
    pub geocoding_url: String,

    /// One Call endpoint for current weather
    pub weather_url: String,

    pub connect_timeout_secs: u64,

    /// Upper bound on a whole request, body included
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            geocoding_url: DEFAULT_GEOCODING_URL.to_string(),
            weather_url: DEFAULT_WEATHER_URL.to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cities kept at once
    pub capacity: usize,

    /// Cached weather younger than this is served without a request
    pub freshness_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            freshness_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub mode: OperatingMode,

    /// Minutes between background refresh passes
    pub interval_minutes: u64,

    /// Pause between two cities within one pass
    pub inter_city_delay_ms: u64,

    /// How long shutdown waits for an in-flight pass
    pub shutdown_grace_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            mode: OperatingMode::OnDemand,
            interval_minutes: 10,
            inter_city_delay_ms: 100,
            shutdown_grace_secs: 5,
        }
    }
}

/// Pick the effective API key: a non-blank env value, else a non-blank file value.
fn resolve_api_key(from_env: Option<String>, from_file: Option<&str>) -> Option<String> {
    from_env
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .or_else(|| {
            from_file
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
        })
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Ok(Self::load_from(&config_path)?)
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> std::result::Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and fail on validation errors.
    ///
    /// Warnings are logged and returned alongside the config.
    pub fn load_validated(path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// The API key to use, honouring the environment override.
    pub fn api_key(&self) -> Option<String> {
        resolve_api_key(
            std::env::var(API_KEY_ENV).ok(),
            self.provider.api_key.as_deref(),
        )
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.geocoding_url, "provider.geocoding_url", &mut result);
        self.validate_url(&self.provider.weather_url, "provider.weather_url", &mut result);

        if self.provider.connect_timeout_secs == 0 {
            result.add_error("provider.connect_timeout_secs", "Timeout must be greater than 0");
        }
        if self.provider.request_timeout_secs == 0 {
            result.add_error("provider.request_timeout_secs", "Timeout must be greater than 0");
        }

        if self.cache.capacity == 0 {
            result.add_error("cache.capacity", "Cache must hold at least one city");
        }
        if self.cache.freshness_minutes == 0 {
            result.add_warning(
                "cache.freshness_minutes",
                "Freshness window is 0; every request will hit the provider",
            );
        } else if self.cache.freshness_minutes > MAX_MINUTES {
            result.add_error("cache.freshness_minutes", "Freshness window is more than a year");
        }

        if self.refresh.interval_minutes == 0 {
            result.add_error("refresh.interval_minutes", "Refresh interval must be greater than 0");
        } else if self.refresh.interval_minutes > MAX_MINUTES {
            result.add_error("refresh.interval_minutes", "Refresh interval is more than a year");
        } else if self.refresh.interval_minutes > 1440 {
            result.add_warning(
                "refresh.interval_minutes",
                "Refresh interval is more than 24 hours",
            );
        }
        if self.refresh.inter_city_delay_ms > 10_000 {
            result.add_warning(
                "refresh.inter_city_delay_ms",
                "Delay between cities is more than 10 seconds",
            );
        }

        if self.provider.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            result.add_warning(
                "provider.api_key",
                format!("No API key in config; {} must be set", API_KEY_ENV),
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to an explicit file, creating parent directories
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the default configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("skycache");

        Ok(config_dir.join("config.toml"))
    }
}
