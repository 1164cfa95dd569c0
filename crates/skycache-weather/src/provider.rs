//! OpenWeatherMap client: direct geocoding plus One Call current weather.

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;

use crate::settings::ProviderSettings;
use crate::types::{CityCoordinates, Condition, Sun, Temperature, WeatherSnapshot, Wind};
use crate::WeatherError;

const USER_AGENT: &str = concat!("skycache/", env!("CARGO_PKG_VERSION"));

/// The two remote operations the SDK depends on.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    /// Resolve a city name to coordinates.
    ///
    /// Fails with `NotFound` for unknown cities and `Credential` when the key
    /// is rejected.
    async fn resolve_coordinates(&self, city: &str) -> Result<CityCoordinates, WeatherError>;

    /// Fetch current weather at the given coordinates.
    async fn fetch_current_weather(
        &self,
        coordinates: &CityCoordinates,
    ) -> Result<WeatherSnapshot, WeatherError>;

    /// Release network resources. Called once at teardown.
    fn release(&self) -> Result<(), WeatherError>;
}

#[derive(Debug, Deserialize)]
struct GeocodingEntry {
    name: String,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    #[serde(default)]
    timezone_offset: i32,
    current: CurrentConditions,
}

#[derive(Debug, Deserialize)]
struct CurrentConditions {
    dt: i64,
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    visibility: i64,
    #[serde(default)]
    wind_speed: f64,
    #[serde(default)]
    weather: Vec<ApiCondition>,
}

#[derive(Debug, Deserialize)]
struct ApiCondition {
    main: String,
    description: String,
}

/// OpenWeatherMap error bodies look like `{"cod": 401, "message": "..."}`.
/// `cod` is a number on some endpoints and a string on others.
fn api_error(body: &Value) -> Option<(String, String)> {
    let cod = match body.get("cod")? {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((cod, message))
}

fn coordinates_from_body(body: Value, city: &str) -> Result<CityCoordinates, WeatherError> {
    if let Some((cod, message)) = api_error(&body) {
        return Err(if cod == "401" {
            WeatherError::Credential(message)
        } else {
            WeatherError::NotFound(message)
        });
    }

    let entries: Vec<GeocodingEntry> = serde_json::from_value(body)
        .map_err(|e| WeatherError::Provider(format!("Geocoding parse error: {}", e)))?;

    entries
        .into_iter()
        .next()
        .map(|entry| CityCoordinates::new(entry.name, entry.lat, entry.lon))
        .ok_or_else(|| WeatherError::NotFound(format!("The city {} was not found", city)))
}

fn snapshot_from_body(body: Value, city_name: &str) -> Result<WeatherSnapshot, WeatherError> {
    if let Some((cod, message)) = api_error(&body) {
        return Err(if cod == "401" {
            WeatherError::Credential(message)
        } else {
            WeatherError::Provider(format!("{}: {}", cod, message))
        });
    }

    let response: OneCallResponse = serde_json::from_value(body)
        .map_err(|e| WeatherError::Provider(format!("Weather parse error: {}", e)))?;
    let current = response.current;
    let condition = current.weather.into_iter().next().ok_or_else(|| {
        WeatherError::Provider(format!("No weather conditions reported for {}", city_name))
    })?;

    Ok(WeatherSnapshot::new(
        Condition {
            main: condition.main,
            description: condition.description,
        },
        Temperature {
            temp: current.temp,
            feels_like: current.feels_like,
        },
        current.visibility,
        Wind {
            speed: current.wind_speed,
        },
        current.dt,
        Sun {
            sunrise: current.sunrise,
            sunset: current.sunset,
        },
        response.timezone_offset,
        city_name,
    ))
}

/// HTTP client for OpenWeatherMap.
///
/// One instance is shared by every caller of an SDK and by its refresh loop.
pub struct OpenWeatherClient {
    client: RwLock<Option<Client>>,
    api_key: String,
    geocoding_url: String,
    weather_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: &str, settings: &ProviderSettings) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: RwLock::new(Some(client)),
            api_key: api_key.to_string(),
            geocoding_url: settings.geocoding_url.clone(),
            weather_url: settings.weather_url.clone(),
        })
    }

    fn http(&self) -> Result<Client, WeatherError> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| WeatherError::Provider("HTTP client has been released".to_string()))
    }

    /// GET `url` and parse the body as JSON whatever the status code;
    /// OpenWeatherMap reports errors in the body. URLs are stripped from
    /// transport errors since they carry the key.
    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, WeatherError> {
        let response = self
            .http()?
            .get(url)
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| WeatherError::Network(e.without_url()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| WeatherError::Network(e.without_url()))?;

        serde_json::from_str(&text).map_err(|e| {
            let excerpt: String = text.chars().take(200).collect();
            WeatherError::Provider(format!(
                "{} returned a non-JSON body ({}): {}",
                status,
                e,
                excerpt.trim()
            ))
        })
    }
}

#[async_trait]
impl WeatherApi for OpenWeatherClient {
    #[instrument(skip(self), level = "debug")]
    async fn resolve_coordinates(&self, city: &str) -> Result<CityCoordinates, WeatherError> {
        let query = [("q", city.to_string()), ("limit", "1".to_string())];
        let body = self.get_json(&self.geocoding_url, &query).await?;
        coordinates_from_body(body, city)
    }

    #[instrument(skip(self, coordinates), fields(city = %coordinates.city_name), level = "debug")]
    async fn fetch_current_weather(
        &self,
        coordinates: &CityCoordinates,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let query = [
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("exclude", "minutely,hourly,daily".to_string()),
        ];
        let body = self.get_json(&self.weather_url, &query).await?;
        snapshot_from_body(body, &coordinates.city_name)
    }

    fn release(&self) -> Result<(), WeatherError> {
        if self.client.write().take().is_some() {
            tracing::debug!("Released OpenWeatherMap HTTP client");
        }
        Ok(())
    }
}
