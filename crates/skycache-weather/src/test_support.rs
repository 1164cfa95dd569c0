//! Scripted provider shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::WeatherApi;
use crate::types::{CityCoordinates, Condition, Sun, Temperature, WeatherSnapshot, Wind};
use crate::WeatherError;

pub(crate) fn snapshot(city: &str) -> WeatherSnapshot {
    WeatherSnapshot::new(
        Condition {
            main: "Clear".into(),
            description: "clear sky".into(),
        },
        Temperature {
            temp: 280.0,
            feels_like: 278.5,
        },
        10000,
        Wind { speed: 2.5 },
        1700000000,
        Sun {
            sunrise: 1699990000,
            sunset: 1700025000,
        },
        0,
        city,
    )
}

#[derive(Default)]
pub(crate) struct FakeApi {
    pub resolve_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
    pub reject_key: AtomicBool,
    pub fail_release: AtomicBool,
    pub panic_next_fetch: AtomicBool,
    unknown: Mutex<HashSet<String>>,
    failing: Mutex<HashSet<String>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn unknown_city(&self, city: &str) {
        self.unknown.lock().insert(city.to_string());
    }

    pub fn fail_fetch(&self, city: &str) {
        self.failing.lock().insert(city.to_string());
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = Some(delay);
    }

    pub fn resolves(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn fetched_cities(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn resolve_coordinates(&self, city: &str) -> Result<CityCoordinates, WeatherError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_key.load(Ordering::SeqCst) {
            return Err(WeatherError::Credential("Invalid API key".into()));
        }
        if self.unknown.lock().contains(city) {
            return Err(WeatherError::NotFound(format!("The city {} was not found", city)));
        }
        Ok(CityCoordinates::new(city, 10.0, 20.0))
    }

    async fn fetch_current_weather(
        &self,
        coordinates: &CityCoordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let call = self.fetch_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.fetched.lock().push(coordinates.city_name.clone());
        if self.panic_next_fetch.swap(false, Ordering::SeqCst) {
            panic!("scripted panic fetching {}", coordinates.city_name);
        }

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().contains(&coordinates.city_name) {
            return Err(WeatherError::Provider("upstream returned 500".into()));
        }

        let mut weather = snapshot(&coordinates.city_name);
        weather.visibility = call as i64;
        Ok(weather)
    }

    fn release(&self) -> Result<(), WeatherError> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            return Err(WeatherError::Provider("release failed".into()));
        }
        Ok(())
    }
}
