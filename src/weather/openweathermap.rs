//! OpenWeatherMap client: current conditions, air pollution and geocoding.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::traits::{AirQualityReport, Coordinates, Pollutants, WeatherReport, WeatherSource};
use crate::providers::{api_error, sanitize_api_error};

/// Air quality moves slower than conditions, so it is kept longer by default.
pub const DEFAULT_AIR_QUALITY_CACHE_TTL: Duration = Duration::from_secs(600);

/// Per-city responses kept for a fixed time. A zero TTL disables it.
///
/// Every insert drops entries that have already expired, so the map only
/// holds cities looked up within the last TTL.
struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, V)>>,
}

impl<V: Clone> TtlCache<V> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: String, value: &V) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock();
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
        entries.insert(key, (Instant::now(), value.clone()));
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

pub struct OpenWeatherMap {
    api_key: String,
    base_url: String,
    weather_cache: TtlCache<WeatherReport>,
    air_cache: TtlCache<AirQualityReport>,
    client: Client,
}

impl OpenWeatherMap {
    pub fn new(api_key: &str, base_url: &str, cache_ttl: Duration) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            weather_cache: TtlCache::new(cache_ttl),
            air_cache: TtlCache::new(DEFAULT_AIR_QUALITY_CACHE_TTL),
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn with_air_quality_cache_ttl(mut self, ttl: Duration) -> Self {
        self.air_cache = TtlCache::new(ttl);
        self
    }

    fn cache_key(city: &str) -> String {
        city.trim().to_lowercase()
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(query)
            .query(&[("appid", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_api_error(&e.to_string())))?;

        if !response.status().is_success() {
            return Err(api_error("OpenWeatherMap", response).await);
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    name: String,
    sys: Sys,
    main: Main,
    #[serde(default)]
    visibility: Option<f64>,
    wind: Wind,
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Sys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct Main {
    temp: f64,
    feels_like: f64,
    humidity: u32,
    pressure: u32,
}

#[derive(Debug, Deserialize)]
struct Wind {
    speed: f64,
    #[serde(default)]
    deg: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    id: u32,
    description: String,
}

#[derive(Debug, Deserialize)]
struct GeoPlace {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GeoPoint {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct AirPollutionResponse {
    #[serde(default)]
    list: Vec<AirSample>,
}

#[derive(Debug, Deserialize)]
struct AirSample {
    components: Pollutants,
}

/// Parse a `/data/2.5/air_pollution` body. `None` when it holds no samples.
pub fn parse_air_pollution(location: &str, body: &str) -> anyhow::Result<Option<AirQualityReport>> {
    let raw: AirPollutionResponse = serde_json::from_str(body)?;
    Ok(first_air_quality(location, raw))
}

fn first_air_quality(location: &str, raw: AirPollutionResponse) -> Option<AirQualityReport> {
    raw.list
        .into_iter()
        .next()
        .map(|sample| AirQualityReport::from_pollutants(location, sample.components))
}

fn into_report(raw: CurrentResponse) -> anyhow::Result<WeatherReport> {
    let condition = raw
        .weather
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("OpenWeatherMap response has no weather conditions"))?;

    Ok(WeatherReport {
        city: raw.name,
        country: raw.sys.country,
        temperature_c: raw.main.temp,
        feels_like_c: raw.main.feels_like,
        humidity_pct: raw.main.humidity,
        pressure_hpa: raw.main.pressure,
        visibility_km: raw.visibility.unwrap_or(0.0) / 1000.0,
        wind_speed_ms: raw.wind.speed,
        wind_direction_deg: raw.wind.deg.unwrap_or(0),
        condition: condition.description,
        condition_id: condition.id,
        observed_at: Utc::now(),
    })
}

/// Parse a `/data/2.5/weather` body.
pub fn parse_current(body: &str) -> anyhow::Result<WeatherReport> {
    let raw: CurrentResponse = serde_json::from_str(body)?;
    into_report(raw)
}

fn first_place_name(places: Vec<GeoPlace>) -> Option<String> {
    places
        .into_iter()
        .map(|p| p.name)
        .find(|name| !name.trim().is_empty())
}

#[async_trait]
impl WeatherSource for OpenWeatherMap {
    async fn current(&self, city: &str) -> anyhow::Result<WeatherReport> {
        let key = Self::cache_key(city);
        if key.is_empty() {
            anyhow::bail!("city must not be empty");
        }
        if let Some(report) = self.weather_cache.get(&key) {
            tracing::debug!(city = %key, "weather cache hit");
            return Ok(report);
        }

        let raw: CurrentResponse = self
            .get_json(
                "/data/2.5/weather",
                &[("q", city.trim().to_string()), ("units", "metric".to_string())],
            )
            .await?;
        let report = into_report(raw)?;
        tracing::info!(city = %report.city, "fetched current weather");
        self.weather_cache.insert(key, &report);
        Ok(report)
    }

    async fn air_quality(&self, city: &str) -> anyhow::Result<Option<AirQualityReport>> {
        let key = Self::cache_key(city);
        if key.is_empty() {
            anyhow::bail!("city must not be empty");
        }
        if let Some(report) = self.air_cache.get(&key) {
            tracing::debug!(city = %key, "air quality cache hit");
            return Ok(Some(report));
        }

        let points: Vec<GeoPoint> = self
            .get_json(
                "/geo/1.0/direct",
                &[("q", city.trim().to_string()), ("limit", "1".to_string())],
            )
            .await?;
        let Some(point) = points.into_iter().next() else {
            tracing::debug!(city = %key, "no coordinates for air quality lookup");
            return Ok(None);
        };

        let raw: AirPollutionResponse = self
            .get_json(
                "/data/2.5/air_pollution",
                &[("lat", point.lat.to_string()), ("lon", point.lon.to_string())],
            )
            .await?;
        let report = first_air_quality(city.trim(), raw);
        if let Some(report) = &report {
            tracing::info!(city = %report.location, aqi = report.aqi, "fetched air quality");
            self.air_cache.insert(key, report);
        }
        Ok(report)
    }

    async fn city_for(&self, coords: Coordinates) -> anyhow::Result<Option<String>> {
        if !coords.is_valid() {
            anyhow::bail!(
                "coordinates out of range: {}, {}",
                coords.latitude,
                coords.longitude
            );
        }
        let places: Vec<GeoPlace> = self
            .get_json(
                "/geo/1.0/reverse",
                &[
                    ("lat", coords.latitude.to_string()),
                    ("lon", coords.longitude.to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(first_place_name(places))
    }

    fn name(&self) -> &str {
        "openweathermap"
    }
}
