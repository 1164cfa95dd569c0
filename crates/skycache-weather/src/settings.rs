//! Runtime settings derived from [`skycache_core::Config`].

use std::time::Duration;

use skycache_core::config::MAX_MINUTES;
use skycache_core::Config;

/// Minute values are capped at one year so timer arithmetic cannot overflow.
fn minutes(value: u64) -> Duration {
    Duration::from_secs(value.min(MAX_MINUTES) * 60)
}

/// HTTP settings for [`crate::OpenWeatherClient`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub geocoding_url: String,
    pub weather_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ProviderSettings {
    fn from(config: &Config) -> Self {
        Self {
            geocoding_url: config.provider.geocoding_url.clone(),
            weather_url: config.provider.weather_url.clone(),
            connect_timeout: Duration::from_secs(config.provider.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.provider.request_timeout_secs),
        }
    }
}

/// Cadence and teardown policy of the background refresh loop.
#[derive(Debug, Clone, Copy)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub inter_city_delay: Duration,
    pub shutdown_grace: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RefreshSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: minutes(config.refresh.interval_minutes),
            inter_city_delay: Duration::from_millis(config.refresh.inter_city_delay_ms),
            shutdown_grace: Duration::from_secs(config.refresh.shutdown_grace_secs),
        }
    }
}

/// Everything a [`crate::WeatherSdk`] needs besides its key and mode.
#[derive(Debug, Clone)]
pub struct SdkSettings {
    pub cache_capacity: usize,
    pub freshness_window: Duration,
    pub refresh: RefreshSettings,
    pub provider: ProviderSettings,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SdkSettings {
    fn from(config: &Config) -> Self {
        Self {
            cache_capacity: config.cache.capacity,
            freshness_window: minutes(config.cache.freshness_minutes),
            refresh: RefreshSettings::from(config),
            provider: ProviderSettings::from(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SdkSettings::default();
        assert_eq!(settings.cache_capacity, 10);
        assert_eq!(settings.freshness_window, Duration::from_secs(600));
        assert_eq!(settings.refresh.interval, Duration::from_secs(600));
        assert_eq!(settings.refresh.inter_city_delay, Duration::from_millis(100));
        assert_eq!(settings.refresh.shutdown_grace, Duration::from_secs(5));
        assert_eq!(settings.provider.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_huge_minute_values_are_capped() {
        let mut config = Config::default();
        config.cache.freshness_minutes = u64::MAX;
        config.refresh.interval_minutes = u64::MAX;

        let settings = SdkSettings::from(&config);
        let year = Duration::from_secs(MAX_MINUTES * 60);
        assert_eq!(settings.freshness_window, year);
        assert_eq!(settings.refresh.interval, year);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.cache.capacity = 3;
        config.cache.freshness_minutes = 1;
        config.refresh.interval_minutes = 2;
        config.provider.weather_url = "http://localhost:9000/onecall".into();

        let settings = SdkSettings::from(&config);
        assert_eq!(settings.cache_capacity, 3);
        assert_eq!(settings.freshness_window, Duration::from_secs(60));
        assert_eq!(settings.refresh.interval, Duration::from_secs(120));
        assert_eq!(settings.provider.weather_url, "http://localhost:9000/onecall");
    }
}
