use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Short condition code plus a human description, e.g. `Clouds` / `broken clouds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub temp: f64,
    pub feels_like: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

/// Sunrise and sunset, epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sun {
    pub sunrise: i64,
    pub sunset: i64,
}

/// A city as resolved by the geocoder.
///
/// `city_name` is the provider's display name and may differ from what the
/// caller typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityCoordinates {
    pub city_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl CityCoordinates {
    pub fn new(city_name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            city_name: city_name.into(),
            latitude,
            longitude,
        }
    }
}

/// Current weather for one city.
///
/// Serializes to the public JSON shape. `ingested_at` is local bookkeeping:
/// it is stamped when the cache stores the snapshot and decides freshness.
/// The provider's own observation time lives in `datetime` and is only
/// for display.
#[derive(Debug, Clone, Serialize)]
pub struct WeatherSnapshot {
    pub weather: Condition,
    pub temperature: Temperature,
    pub visibility: i64,
    pub wind: Wind,
    /// Observation time reported by the provider, epoch seconds
    pub datetime: i64,
    pub sys: Sun,
    /// Offset from UTC in seconds
    pub timezone: i32,
    #[serde(rename = "name")]
    pub city_name: String,
    #[serde(skip)]
    pub(crate) ingested_at: Instant,
}

impl WeatherSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        weather: Condition,
        temperature: Temperature,
        visibility: i64,
        wind: Wind,
        datetime: i64,
        sys: Sun,
        timezone: i32,
        city_name: impl Into<String>,
    ) -> Self {
        Self {
            weather,
            temperature,
            visibility,
            wind,
            datetime,
            sys,
            timezone,
            city_name: city_name.into(),
            ingested_at: Instant::now(),
        }
    }

    /// When this snapshot was stored in the cache.
    pub fn ingested_at(&self) -> Instant {
        self.ingested_at
    }

    pub fn age(&self) -> Duration {
        self.ingested_at.elapsed()
    }

    /// True while the snapshot is younger than `window`.
    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age() < window
    }

    /// Provider observation time as a UTC timestamp.
    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.datetime, 0)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WeatherSnapshot {
        WeatherSnapshot::new(
            Condition {
                main: "Clouds".into(),
                description: "scattered clouds".into(),
            },
            Temperature {
                temp: 269.6,
                feels_like: 267.57,
            },
            10000,
            Wind { speed: 1.38 },
            1675744800,
            Sun {
                sunrise: 1675751262,
                sunset: 1675787560,
            },
            3600,
            "Zocca",
        )
    }

    #[test]
    fn test_json_shape() {
        let value: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();

        assert_eq!(value["weather"]["main"], "Clouds");
        assert_eq!(value["weather"]["description"], "scattered clouds");
        assert_eq!(value["temperature"]["temp"], 269.6);
        assert_eq!(value["temperature"]["feels_like"], 267.57);
        assert_eq!(value["visibility"], 10000);
        assert_eq!(value["wind"]["speed"], 1.38);
        assert_eq!(value["datetime"], 1675744800);
        assert_eq!(value["sys"]["sunrise"], 1675751262);
        assert_eq!(value["sys"]["sunset"], 1675787560);
        assert_eq!(value["timezone"], 3600);
        assert_eq!(value["name"], "Zocca");
    }

    #[test]
    fn test_ingestion_time_not_serialized() {
        let json = sample().to_json().unwrap();
        assert!(!json.contains("ingested"));
        assert!(!json.contains("city_name"));
    }

    #[test]
    fn test_observed_at() {
        let observed = sample().observed_at().unwrap();
        assert_eq!(observed.timestamp(), 1675744800);
    }

    #[tokio::test(start_paused = true)]
    async fn test_freshness_follows_ingestion_time() {
        let snapshot = sample();
        let window = Duration::from_secs(600);
        assert!(snapshot.is_fresh(window));

        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(snapshot.is_fresh(window));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!snapshot.is_fresh(window));
    }
}
