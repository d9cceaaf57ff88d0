//! Live weather data used to ground agent replies.

pub mod openweathermap;
pub mod traits;

pub use openweathermap::OpenWeatherMap;
pub use traits::{AirQualityReport, AqiLevel, Coordinates, Pollutants, WeatherReport, WeatherSource};

use std::sync::Arc;
use std::time::Duration;

use crate::config::WeatherConfig;

/// City name used when reverse geocoding yields nothing.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Build the configured weather source, or `None` when no API key is set.
pub fn create_weather_source(config: &WeatherConfig) -> Option<Arc<dyn WeatherSource>> {
    let key = config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())?;
    Some(Arc::new(
        OpenWeatherMap::new(
            key,
            &config.api_url,
            Duration::from_secs(config.cache_ttl_secs),
        )
        .with_air_quality_cache_ttl(Duration::from_secs(config.air_quality_cache_ttl_secs)),
    ))
}
