pub mod config;
pub mod error;

pub use config::{
    CacheConfig, Config, ConfigValidationError, OperatingMode, ProviderConfig, RefreshConfig,
    ValidationResult, API_KEY_ENV,
};
pub use error::{AppError, ConfigError, WeatherError};

use anyhow::Result;

fn env_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

/// Initialize logging for a skycache binary.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    tracing::info!("skycache core initialized");
    Ok(())
}
