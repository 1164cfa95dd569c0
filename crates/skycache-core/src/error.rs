//! Error types shared across skycache crates.
//!
//! `WeatherError` is what SDK callers see. `ConfigError` covers loading the
//! settings file; `AppError` wraps both for the binary.

use thiserror::Error;

/// What the `skycache` binary reports when a run fails.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Weather(#[from] WeatherError),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Short text for the terminal; details go to the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Other(_) => "skycache failed unexpectedly. Run with RUST_LOG=debug for details.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file {0} does not exist")]
    NotFound(String),

    #[error("Config rejected: {0}")]
    Invalid(String),

    #[error("Config is not valid TOML: {0}")]
    ParseError(String),

    #[error("No OpenWeatherMap API key configured")]
    MissingApiKey,
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Config file not found. Check the --config path.",
            ConfigError::Invalid(_) => "Config values are out of range. Check the log for details.",
            ConfigError::ParseError(_) => "Config file is not valid TOML.",
            ConfigError::MissingApiKey => {
                "No API key. Pass --api-key, set SKYCACHE_API_KEY or add provider.api_key to the config file."
            }
        }
    }
}

/// Errors surfaced by the weather SDK.
///
/// The on-demand fetch path returns these unchanged. `Network` and
/// `Provider` are both failures of the remote service.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API key rejected: {0}")]
    Credential(String),

    #[error("City not found: {0}")]
    NotFound(String),

    #[error("Weather provider error: {0}")]
    Provider(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Async runtime unavailable: {0}")]
    Runtime(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::InvalidArgument(_) => "Invalid input. Check the API key and city name.",
            WeatherError::Credential(_) => "Weather API key is invalid. Check settings.",
            WeatherError::NotFound(_) => "City not found. Check the spelling and try again.",
            WeatherError::Provider(_) => "Weather service error. Please try again.",
            WeatherError::Network(_) => "Network error. Check your connection.",
            WeatherError::Runtime(_) => "Background refresh could not be started.",
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WeatherError::Network(_))
    }

    /// Whether the failure came from the remote service rather than the caller.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            WeatherError::Provider(_) | WeatherError::Network(_) | WeatherError::Credential(_)
        )
    }
}
