use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point reported by the browser's geolocation API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Current conditions for one city, in metric units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherReport {
    pub city: String,
    pub country: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub humidity_pct: u32,
    pub pressure_hpa: u32,
    pub visibility_km: f64,
    pub wind_speed_ms: f64,
    pub wind_direction_deg: u32,
    pub condition: String,
    pub condition_id: u32,
    pub observed_at: DateTime<Utc>,
}

impl WeatherReport {
    /// Plain-text block handed to the model alongside the user's question.
    pub fn render(&self) -> String {
        format!(
            "Current weather in {}, {}:\n\
             Temperature: {:.1}°C (feels like {:.1}°C)\n\
             Condition: {}\n\
             Humidity: {}%\n\
             Visibility: {:.1} km\n\
             Wind: {:.1} m/s\n\
             Pressure: {} hPa",
            self.city,
            self.country,
            self.temperature_c,
            self.feels_like_c,
            self.condition,
            self.humidity_pct,
            self.visibility_km,
            self.wind_speed_ms,
            self.pressure_hpa,
        )
    }
}

/// US EPA PM2.5 breakpoints: concentration range (μg/m³) to index range.
const PM25_BREAKPOINTS: &[(f64, f64, u32, u32)] = &[
    (0.0, 12.0, 0, 50),
    (12.1, 35.4, 51, 100),
    (35.5, 55.4, 101, 150),
    (55.5, 150.4, 151, 200),
    (150.5, 250.4, 201, 300),
    (250.5, 350.4, 301, 400),
    (350.5, 500.4, 401, 500),
];

/// Air quality index from a PM2.5 concentration, capped at 500.
pub fn aqi_from_pm25(pm25: f64) -> u32 {
    if !pm25.is_finite() || pm25 <= 0.0 {
        return 0;
    }
    for &(lo, hi, index_lo, index_hi) in PM25_BREAKPOINTS {
        if pm25 <= hi {
            let scaled = (pm25 - lo) / (hi - lo) * f64::from(index_hi - index_lo);
            return (scaled + f64::from(index_lo)).max(0.0) as u32;
        }
    }
    500
}

/// EPA category for an air quality index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthyForSensitiveGroups,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    pub fn from_aqi(aqi: u32) -> Self {
        match aqi {
            0..=50 => Self::Good,
            51..=100 => Self::Moderate,
            101..=150 => Self::UnhealthyForSensitiveGroups,
            151..=200 => Self::Unhealthy,
            201..=300 => Self::VeryUnhealthy,
            _ => Self::Hazardous,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Moderate => "Moderate",
            Self::UnhealthyForSensitiveGroups => "Unhealthy for Sensitive Groups",
            Self::Unhealthy => "Unhealthy",
            Self::VeryUnhealthy => "Very Unhealthy",
            Self::Hazardous => "Hazardous",
        }
    }

    pub fn recommendations(self) -> &'static [&'static str] {
        match self {
            Self::Good => &[
                "Air quality is good; outdoor activities are fine",
                "No health impacts expected for the general population",
            ],
            Self::Moderate => &[
                "Air quality is acceptable for most people",
                "Sensitive individuals may notice minor breathing irritation",
            ],
            Self::UnhealthyForSensitiveGroups => &[
                "Children, older adults and people with heart or lung disease should limit time outdoors",
                "Consider a mask if you are sensitive to pollution",
            ],
            Self::Unhealthy => &[
                "Everyone may experience health effects",
                "Sensitive groups should avoid outdoor activity",
                "Limit prolonged outdoor exertion",
            ],
            Self::VeryUnhealthy => &[
                "Everyone should avoid outdoor activity",
                "Stay indoors with windows closed if possible",
            ],
            Self::Hazardous => &[
                "Stay indoors and avoid all outdoor activity",
                "Run an air purifier indoors if you have one",
            ],
        }
    }
}

/// Pollutant concentrations in μg/m³, named as OpenWeatherMap reports them.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Pollutants {
    #[serde(default)]
    pub pm2_5: Option<f64>,
    #[serde(default)]
    pub pm10: Option<f64>,
    #[serde(default)]
    pub o3: Option<f64>,
    #[serde(default)]
    pub no2: Option<f64>,
    #[serde(default)]
    pub so2: Option<f64>,
    #[serde(default)]
    pub co: Option<f64>,
}

/// Current air quality for one place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AirQualityReport {
    pub location: String,
    pub aqi: u32,
    pub level: AqiLevel,
    pub pollutants: Pollutants,
    pub health_recommendations: Vec<String>,
    pub observed_at: DateTime<Utc>,
}

impl AirQualityReport {
    /// Derive the index, category and advice from PM2.5.
    pub fn from_pollutants(location: &str, pollutants: Pollutants) -> Self {
        let aqi = aqi_from_pm25(pollutants.pm2_5.unwrap_or(0.0));
        let level = AqiLevel::from_aqi(aqi);
        Self {
            location: location.to_string(),
            aqi,
            level,
            pollutants,
            health_recommendations: level
                .recommendations()
                .iter()
                .map(|r| (*r).to_string())
                .collect(),
            observed_at: Utc::now(),
        }
    }

    pub fn render(&self) -> String {
        let mut text = format!(
            "Air quality in {}: AQI {} ({})",
            self.location,
            self.aqi,
            self.level.label()
        );
        let readings = [
            ("PM2.5", self.pollutants.pm2_5),
            ("PM10", self.pollutants.pm10),
            ("O3", self.pollutants.o3),
            ("NO2", self.pollutants.no2),
        ];
        for (name, value) in readings {
            if let Some(value) = value {
                text.push_str(&format!("\n{name}: {value:.1} μg/m³"));
            }
        }
        text.push_str("\nAdvice: ");
        text.push_str(&self.health_recommendations.join("; "));
        text
    }
}

/// Live weather lookups.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Current conditions for `city`.
    async fn current(&self, city: &str) -> anyhow::Result<WeatherReport>;

    /// Current air quality for `city`. `Ok(None)` when the place has no readings.
    async fn air_quality(&self, city: &str) -> anyhow::Result<Option<AirQualityReport>>;

    /// Reverse-geocode to a city name. `Ok(None)` when nothing is near the point.
    async fn city_for(&self, coords: Coordinates) -> anyhow::Result<Option<String>>;

    fn name(&self) -> &str;
}
