//! Bounded in-memory weather cache.
//!
//! Keys are city names exactly as stored; no case folding or other
//! normalization. When a new city arrives at capacity, the entry with the
//! oldest ingestion time is evicted. The cache is small and fixed-size, so
//! eviction is a linear scan.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::types::{CityCoordinates, WeatherSnapshot};

pub const DEFAULT_CAPACITY: usize = 10;

/// A snapshot together with the coordinates it was fetched for.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub weather: WeatherSnapshot,
    pub coordinates: CityCoordinates,
}

/// Thread-safe weather cache keyed by city name.
///
/// Every mutation takes the write lock, so the capacity check, eviction and
/// insert of `store` happen as one step. Readers always see a whole entry.
#[derive(Debug)]
pub struct WeatherCache {
    capacity: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    // Only written while `entries` is write-locked.
    closed: AtomicBool,
}

impl Default for WeatherCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Ingestion times for one key must strictly increase, even when the clock
/// has not moved since the previous store.
fn next_ingestion_time(previous: Option<Instant>) -> Instant {
    let now = Instant::now();
    match previous {
        Some(prev) if now <= prev => prev + Duration::from_nanos(1),
        _ => now,
    }
}

fn oldest_key(entries: &HashMap<String, CacheEntry>) -> Option<String> {
    entries
        .iter()
        .min_by_key(|(_, entry)| entry.weather.ingested_at)
        .map(|(key, _)| key.clone())
}

impl WeatherCache {
    /// Create a cache holding at most `capacity` cities (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::with_capacity(capacity.max(1))),
            closed: AtomicBool::new(false),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn has(&self, city: &str) -> bool {
        self.entries.read().contains_key(city)
    }

    pub fn get(&self, city: &str) -> Option<WeatherSnapshot> {
        self.entries.read().get(city).map(|e| e.weather.clone())
    }

    pub fn get_coordinates(&self, city: &str) -> Option<CityCoordinates> {
        self.entries.read().get(city).map(|e| e.coordinates.clone())
    }

    /// The cached snapshot for `city` if it is younger than `window`.
    pub fn get_fresh(&self, city: &str, window: Duration) -> Option<WeatherSnapshot> {
        self.entries
            .read()
            .get(city)
            .filter(|e| e.weather.is_fresh(window))
            .map(|e| e.weather.clone())
    }

    /// Store a snapshot and its coordinates under `snapshot.city_name`.
    ///
    /// Returns the key evicted to make room, if any. Updating an existing
    /// key never evicts. A closed cache ignores the store.
    pub fn store(&self, mut snapshot: WeatherSnapshot, coordinates: CityCoordinates) -> Option<String> {
        let mut entries = self.entries.write();
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("Dropped {} stored after cache close", snapshot.city_name);
            return None;
        }
        let key = snapshot.city_name.clone();
        let previous = entries.get(&key).map(|e| e.weather.ingested_at);

        let mut evicted = None;
        if previous.is_none() && entries.len() >= self.capacity {
            if let Some(oldest) = oldest_key(&entries) {
                entries.remove(&oldest);
                tracing::debug!("Evicted {} from weather cache", oldest);
                evicted = Some(oldest);
            }
        }

        snapshot.ingested_at = next_ingestion_time(previous);
        entries.insert(
            key,
            CacheEntry {
                weather: snapshot,
                coordinates,
            },
        );
        evicted
    }

    /// Replace only the snapshot of an existing city, keeping its coordinates.
    ///
    /// Returns `false` without storing anything when the city is no longer
    /// cached.
    pub fn store_weather_only(&self, mut snapshot: WeatherSnapshot, city: &str) -> bool {
        let mut entries = self.entries.write();
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        match entries.get_mut(city) {
            Some(entry) => {
                snapshot.ingested_at = next_ingestion_time(Some(entry.weather.ingested_at));
                entry.weather = snapshot;
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of every cached city and its coordinates.
    pub fn list_known_cities(&self) -> Vec<(String, CityCoordinates)> {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.coordinates.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop every entry and refuse all later stores.
    pub fn close(&self) {
        let mut entries = self.entries.write();
        self.closed.store(true, Ordering::SeqCst);
        entries.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
