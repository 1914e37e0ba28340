//! # Weather Data Providers
//!
//! The clock shows current conditions when weather is enabled. Data comes
//! from a [`WeatherProvider`]; the production one calls the OpenWeatherMap
//! "current weather" endpoint, and [`StaticWeather`] serves a fixed answer
//! for tests and offline setups.
//!
//! ## Error Handling
//!
//! Providers report failures through [`WeatherError`], but the composer
//! never propagates them: a failed fetch renders the clock without the
//! weather block. Requests are bounded by the configured timeout so a slow
//! API cannot hold a render hostage.
//!
//! Calls are blocking and are made from the render worker thread, never
//! from the async executor.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::WeatherConfig;
use crate::WeatherSnapshot;

const OPENWEATHERMAP_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Errors that can occur while fetching weather data.
#[derive(Error, Debug)]
pub enum WeatherError {
    /// HTTP request failed (network, timeout, or protocol error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("weather API returned status {0}")]
    Status(u16),

    /// The response had no usable condition entry
    #[error("weather response contained no conditions")]
    Empty,

    /// The provider has nothing to report
    #[error("no weather data available")]
    Unavailable,
}

/// Source of current weather conditions.
pub trait WeatherProvider: Send + Sync {
    fn current(&self) -> Result<WeatherSnapshot, WeatherError>;
}

/// OpenWeatherMap current-weather client.
#[derive(Clone, Debug)]
pub struct OpenWeatherMap {
    api_key: String,
    city: String,
    units: String,
    timeout: Duration,
}

impl OpenWeatherMap {
    pub fn new(config: &WeatherConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            city: config.city.clone(),
            units: config.units.clone(),
            timeout: Duration::from_secs(config.timeout_seconds.max(1)),
        }
    }
}

impl WeatherProvider for OpenWeatherMap {
    fn current(&self) -> Result<WeatherSnapshot, WeatherError> {
        // The blocking client owns a runtime of its own, so it is built on the
        // calling worker thread rather than stored across async contexts.
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let response = client
            .get(OPENWEATHERMAP_URL)
            .query(&[
                ("q", self.city.as_str()),
                ("appid", self.api_key.as_str()),
                ("units", self.units.as_str()),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body: OwmResponse = response.json()?;
        body.into_snapshot()
    }
}

/// Subset of the OpenWeatherMap response the clock uses.
#[derive(Debug, Deserialize)]
struct OwmResponse {
    weather: Vec<OwmCondition>,
    main: OwmMain,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
}

impl OwmResponse {
    fn into_snapshot(self) -> Result<WeatherSnapshot, WeatherError> {
        let condition = self.weather.into_iter().next().ok_or(WeatherError::Empty)?;
        Ok(WeatherSnapshot {
            description: title_case(&condition.description),
            temperature: self.main.temp.round(),
            icon_code: condition.icon,
        })
    }
}

/// "light rain" -> "Light Rain"
fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Provider returning a fixed snapshot, or nothing.
#[derive(Clone, Debug, Default)]
pub struct StaticWeather {
    snapshot: Option<WeatherSnapshot>,
}

impl StaticWeather {
    pub fn new(snapshot: WeatherSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
        }
    }

    /// A provider that always reports [`WeatherError::Unavailable`].
    pub fn unavailable() -> Self {
        Self { snapshot: None }
    }
}

impl WeatherProvider for StaticWeather {
    fn current(&self) -> Result<WeatherSnapshot, WeatherError> {
        self.snapshot.clone().ok_or(WeatherError::Unavailable)
    }
}
