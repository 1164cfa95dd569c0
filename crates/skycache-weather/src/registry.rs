//! One `WeatherSdk` per API key.
//!
//! The registry is an ordinary value owned by whoever composes the
//! application; there is no process-wide instance.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use skycache_core::OperatingMode;

use crate::provider::{OpenWeatherClient, WeatherApi};
use crate::sdk::{validate_api_key, WeatherSdk};
use crate::settings::{ProviderSettings, SdkSettings};
use crate::WeatherError;

/// Builds the provider for a newly created SDK.
pub type ProviderFactory = Arc<
    dyn Fn(&str, &ProviderSettings) -> Result<Arc<dyn WeatherApi>, WeatherError> + Send + Sync,
>;

fn open_weather_provider(
    api_key: &str,
    settings: &ProviderSettings,
) -> Result<Arc<dyn WeatherApi>, WeatherError> {
    Ok(Arc::new(OpenWeatherClient::new(api_key, settings)?))
}

pub struct SdkRegistry {
    settings: SdkSettings,
    factory: ProviderFactory,
    instances: Mutex<HashMap<String, Arc<WeatherSdk>>>,
}

impl Default for SdkRegistry {
    fn default() -> Self {
        Self::new(SdkSettings::default())
    }
}

impl SdkRegistry {
    /// Registry whose SDKs talk to OpenWeatherMap.
    pub fn new(settings: SdkSettings) -> Self {
        Self::with_factory(settings, Arc::new(open_weather_provider))
    }

    pub fn with_factory(settings: SdkSettings, factory: ProviderFactory) -> Self {
        Self {
            settings,
            factory,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Create and register an SDK for `api_key`.
    ///
    /// Fails with `InvalidArgument` for an empty key or a key that already
    /// has a live instance.
    pub fn create(
        &self,
        api_key: &str,
        mode: OperatingMode,
    ) -> Result<Arc<WeatherSdk>, WeatherError> {
        validate_api_key(api_key)?;

        let mut instances = self.instances.lock();
        if instances.contains_key(api_key) {
            return Err(WeatherError::InvalidArgument(
                "An instance with this apiKey already exists".to_string(),
            ));
        }

        let api = (self.factory)(api_key, &self.settings.provider)?;
        let sdk = Arc::new(WeatherSdk::with_provider(
            api_key,
            mode,
            self.settings.clone(),
            api,
        )?);
        instances.insert(api_key.to_string(), sdk.clone());

        info!(?mode, total = instances.len(), "Registered weather SDK");
        Ok(sdk)
    }

    pub fn get(&self, api_key: &str) -> Result<Option<Arc<WeatherSdk>>, WeatherError> {
        validate_api_key(api_key)?;
        Ok(self.instances.lock().get(api_key).cloned())
    }

    /// Unregister the SDK for `api_key` and shut it down.
    pub async fn delete(&self, api_key: &str) -> Result<(), WeatherError> {
        validate_api_key(api_key)?;

        let removed = self.instances.lock().remove(api_key);
        let Some(sdk) = removed else {
            return Err(WeatherError::InvalidArgument(
                "No instance with this apiKey exists".to_string(),
            ));
        };

        sdk.shut_down().await;
        info!("Deleted weather SDK");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Shut down and unregister every instance.
    pub async fn shut_down_all(&self) {
        let drained: Vec<_> = self.instances.lock().drain().map(|(_, sdk)| sdk).collect();
        for sdk in drained {
            sdk.shut_down().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeApi;
    use std::sync::atomic::Ordering;

    fn registry() -> (SdkRegistry, Arc<FakeApi>) {
        let api = Arc::new(FakeApi::default());
        let shared = api.clone();
        let factory: ProviderFactory = Arc::new(
            move |_: &str, _: &ProviderSettings| -> Result<Arc<dyn WeatherApi>, WeatherError> {
                Ok(shared.clone())
            },
        );
        (SdkRegistry::with_factory(SdkSettings::default(), factory), api)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (registry, _api) = registry();

        let sdk = registry.create("key-1", OperatingMode::OnDemand).unwrap();
        let found = registry.get("key-1").unwrap().unwrap();

        assert!(Arc::ptr_eq(&sdk, &found));
        assert!(registry.get("key-2").unwrap().is_none());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_key_rejected() {
        let (registry, _api) = registry();
        registry.create("key-1", OperatingMode::OnDemand).unwrap();

        let err = registry.create("key-1", OperatingMode::Proactive).unwrap_err();
        assert!(matches!(err, WeatherError::InvalidArgument(_)));
        assert_eq!(registry.len(), 1);

        registry.shut_down_all().await;
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let (registry, _api) = registry();

        assert!(matches!(
            registry.create("", OperatingMode::OnDemand),
            Err(WeatherError::InvalidArgument(_))
        ));
        assert!(matches!(registry.get(""), Err(WeatherError::InvalidArgument(_))));
        assert!(matches!(
            registry.delete("").await,
            Err(WeatherError::InvalidArgument(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_delete_shuts_instance_down() {
        let (registry, api) = registry();
        let sdk = registry.create("key-1", OperatingMode::Proactive).unwrap();

        registry.delete("key-1").await.unwrap();

        assert!(sdk.is_shut_down());
        assert!(!sdk.is_refreshing());
        assert_eq!(api.release_calls.load(Ordering::SeqCst), 1);
        assert!(registry.get("key-1").unwrap().is_none());

        // The key can be registered again once deleted.
        registry.create("key-1", OperatingMode::OnDemand).unwrap();
    }

    #[tokio::test]
    async fn test_delete_unknown_key() {
        let (registry, _api) = registry();
        let err = registry.delete("missing").await.unwrap_err();
        assert!(matches!(err, WeatherError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_factory_error_leaves_registry_unchanged() {
        let factory: ProviderFactory = Arc::new(
            |_: &str, _: &ProviderSettings| -> Result<Arc<dyn WeatherApi>, WeatherError> {
                Err(WeatherError::Provider("no client".into()))
            },
        );
        let registry = SdkRegistry::with_factory(SdkSettings::default(), factory);

        let err = registry.create("key-1", OperatingMode::OnDemand).unwrap_err();
        assert!(matches!(err, WeatherError::Provider(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_shut_down_all() {
        let (registry, api) = registry();
        let first = registry.create("key-1", OperatingMode::OnDemand).unwrap();
        let second = registry.create("key-2", OperatingMode::Proactive).unwrap();

        registry.shut_down_all().await;

        assert!(registry.is_empty());
        assert!(first.is_shut_down());
        assert!(second.is_shut_down());
        assert_eq!(api.release_calls.load(Ordering::SeqCst), 2);
    }
}
