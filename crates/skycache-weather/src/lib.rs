//! Weather SDK for skycache
//!
//! Serves current weather from OpenWeatherMap through a small freshness
//! cache, optionally kept warm by a background refresh loop.

pub mod types;
pub mod settings;
pub mod provider;
pub mod cache;
pub mod refresh;
pub mod sdk;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use skycache_core::{OperatingMode, WeatherError};

pub use types::*;
pub use settings::{ProviderSettings, RefreshSettings, SdkSettings};
pub use provider::{OpenWeatherClient, WeatherApi};
pub use cache::{CacheEntry, WeatherCache};
pub use refresh::{RefreshLoop, RefreshReport};
pub use sdk::WeatherSdk;
pub use registry::{ProviderFactory, SdkRegistry};
