//! `WeatherSdk`: the public entry point.
//!
//! Serves current weather from the cache while it is fresh and fetches it
//! otherwise. In proactive mode a [`RefreshLoop`] keeps cached cities warm.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::{debug, error, info};

use skycache_core::OperatingMode;

use crate::cache::WeatherCache;
use crate::provider::{OpenWeatherClient, WeatherApi};
use crate::refresh::RefreshLoop;
use crate::settings::SdkSettings;
use crate::types::WeatherSnapshot;
use crate::WeatherError;

pub(crate) fn validate_api_key(api_key: &str) -> Result<(), WeatherError> {
    if api_key.trim().is_empty() {
        return Err(WeatherError::InvalidArgument(
            "apiKey cannot be null or empty".to_string(),
        ));
    }
    Ok(())
}

fn shut_down_error() -> WeatherError {
    WeatherError::Provider("SDK has been shut down".to_string())
}

pub struct WeatherSdk {
    api_key: String,
    mode: OperatingMode,
    freshness_window: Duration,
    cache: Arc<WeatherCache>,
    api: Arc<dyn WeatherApi>,
    refresh: Option<RefreshLoop>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for WeatherSdk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherSdk")
            .field("api_key", &"<redacted>")
            .field("mode", &self.mode)
            .field("cached_cities", &self.cache.len())
            .finish()
    }
}

impl WeatherSdk {
    /// Create an SDK with default settings talking to OpenWeatherMap.
    ///
    /// Proactive mode must be called from within a Tokio runtime, which
    /// hosts the refresh loop.
    pub fn new(api_key: &str, mode: OperatingMode) -> Result<Self, WeatherError> {
        Self::with_settings(api_key, mode, SdkSettings::default())
    }

    pub fn with_settings(
        api_key: &str,
        mode: OperatingMode,
        settings: SdkSettings,
    ) -> Result<Self, WeatherError> {
        validate_api_key(api_key)?;
        let api = Arc::new(OpenWeatherClient::new(api_key, &settings.provider)?);
        Self::with_provider(api_key, mode, settings, api)
    }

    /// Create an SDK on top of any [`WeatherApi`] implementation.
    pub fn with_provider(
        api_key: &str,
        mode: OperatingMode,
        settings: SdkSettings,
        api: Arc<dyn WeatherApi>,
    ) -> Result<Self, WeatherError> {
        validate_api_key(api_key)?;

        let cache = Arc::new(WeatherCache::new(settings.cache_capacity));
        let refresh = match mode {
            OperatingMode::OnDemand => None,
            OperatingMode::Proactive => {
                let runtime =
                    Handle::try_current().map_err(|e| WeatherError::Runtime(e.to_string()))?;
                let refresh =
                    RefreshLoop::new(cache.clone(), api.clone(), settings.refresh, runtime);
                refresh.start();
                Some(refresh)
            }
        };

        info!(?mode, capacity = cache.capacity(), "Weather SDK created");

        Ok(Self {
            api_key: api_key.to_string(),
            mode,
            freshness_window: settings.freshness_window,
            cache,
            api,
            refresh,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn is_polling(&self) -> bool {
        self.mode == OperatingMode::Proactive
    }

    /// Whether the background refresh loop is currently scheduled.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.as_ref().is_some_and(RefreshLoop::is_running)
    }

    pub fn cached_cities(&self) -> Vec<String> {
        self.cache
            .list_known_cities()
            .into_iter()
            .map(|(city, _)| city)
            .collect()
    }

    /// Current weather for `city` as JSON.
    pub async fn get_current_weather(&self, city: &str) -> Result<String, WeatherError> {
        let snapshot = self.current_weather(city).await?;
        snapshot
            .to_json()
            .map_err(|e| WeatherError::Provider(format!("Failed to serialize weather: {}", e)))
    }

    /// Current weather for `city`, from the cache when fresh.
    ///
    /// Provider errors are returned unchanged. After [`Self::shut_down`]
    /// every lookup fails with `Provider`.
    pub async fn current_weather(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        if city.trim().is_empty() {
            return Err(WeatherError::InvalidArgument(
                "city cannot be empty".to_string(),
            ));
        }
        if self.is_shut_down() {
            return Err(shut_down_error());
        }

        if let Some(cached) = self.cache.get_fresh(city, self.freshness_window) {
            debug!("Weather cache hit for {}", city);
            return Ok(cached);
        }

        debug!("Weather cache miss for {}", city);
        self.fetch_and_store(city).await
    }

    async fn fetch_and_store(&self, city: &str) -> Result<WeatherSnapshot, WeatherError> {
        let coordinates = match self.cache.get_coordinates(city) {
            Some(coordinates) => coordinates,
            None => self.api.resolve_coordinates(city).await?,
        };

        let snapshot = self.api.fetch_current_weather(&coordinates).await?;
        if self.is_shut_down() {
            return Err(shut_down_error());
        }

        let key = snapshot.city_name.clone();
        if let Some(evicted) = self.cache.store(snapshot.clone(), coordinates) {
            debug!("Stored {} after evicting {}", key, evicted);
        }
        // A closed cache drops the store; shutdown won the race.
        if self.cache.is_closed() {
            return Err(shut_down_error());
        }

        // Hand back the stored copy, which carries the ingestion time.
        Ok(self.cache.get(&key).unwrap_or(snapshot))
    }

    /// Stop background refresh, release the HTTP client and drop cached data.
    ///
    /// Safe to call more than once; later calls do nothing.
    pub async fn shut_down(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(refresh) = &self.refresh {
            refresh.stop().await;
        }
        if let Err(e) = self.api.release() {
            error!("Failed to release weather provider: {}", e);
        }
        self.cache.close();

        info!("Weather SDK shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
