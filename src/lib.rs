//! # SumiClock Core Library
//!
//! This library renders a clock face (time, date and optional weather) as a
//! grayscale PNG for e-ink picture frames and serves it over HTTP. Images are
//! cached per minute, since the picture cannot change more often than that.
//!
//! ## Rendering Pipeline
//!
//! 1. **Time**: convert "now" to the configured timezone and pick light or
//!    dark mode from the local hour ([`dark_mode`])
//! 2. **Weather**: optionally ask a [`weather::WeatherProvider`] for the
//!    current conditions; any failure simply means "no weather"
//! 3. **Template**: if an SVG template exists for the orientation, fill in
//!    its placeholders and rasterize it ([`template`])
//! 4. **Procedural fallback**: otherwise lay out the text and icon blocks by
//!    hand ([`composer`])
//! 5. **Encode**: grayscale PNG, stored in the [`cache`] under a
//!    minute-granular key
//!
//! ## Degradation Policy
//!
//! Missing assets (fonts, templates, icons) and unavailable collaborators
//! (weather API, cache store) never fail a request. A plainer or uncached
//! image is always preferable to an error on a wall clock.
//!
//! ## Core Types
//!
//! - [`Orientation`]: landscape or portrait canvas layout
//! - [`WeatherSnapshot`]: current conditions in a fixed schema
//! - [`ClockData`]: the formatted strings a single render draws
//! - [`RenderRequest`]: per-request overrides

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Module declarations
pub mod cache;
pub mod canvas;
pub mod composer;
pub mod config;
pub mod dark_mode;
pub mod error;
pub mod server;
pub mod svg;
pub mod template;
pub mod weather;
pub mod weather_icon;

#[cfg(test)]
mod tests;

/// Canvas layout.
///
/// Portrait swaps the configured width and height when the configured
/// canvas is wider than it is tall.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Lowercase name, also used for template file names and cache keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an orientation string is neither `landscape` nor `portrait`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("orientation must be 'landscape' or 'portrait', got '{0}'")]
pub struct InvalidOrientation(pub String);

impl FromStr for Orientation {
    type Err = InvalidOrientation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "landscape" => Ok(Orientation::Landscape),
            "portrait" => Ok(Orientation::Portrait),
            _ => Err(InvalidOrientation(s.to_string())),
        }
    }
}

/// Current weather conditions as reported by a provider.
///
/// `icon_code` follows the OpenWeatherMap convention: a two-digit condition
/// followed by `d` (day) or `n` (night), e.g. `"01d"`.
///
/// # Example
/// ```
/// use sumiclock_lib::WeatherSnapshot;
///
/// let weather = WeatherSnapshot {
///     description: "Clear Sky".to_string(),
///     temperature: 23.0,
///     icon_code: "01d".to_string(),
/// };
/// assert_eq!(weather.icon_code.len(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub description: String,
    pub temperature: f64,
    pub icon_code: String,
}

/// Everything a single render draws, already formatted.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockData {
    /// 24-hour `HH:MM`
    pub time: String,
    /// e.g. `Friday, April 4, 2025`
    pub date: String,
    /// `None` when weather is disabled or the provider failed
    pub weather: Option<WeatherSnapshot>,
    /// Unit suffix appended to the temperature (`°C`, `°F` or `K`)
    pub temperature_unit: &'static str,
}

impl ClockData {
    /// Temperature with its unit, e.g. `23°C`. `None` without weather.
    pub fn temperature_text(&self) -> Option<String> {
        self.weather.as_ref().map(|w| {
            let rounded = w.temperature.round();
            // -0.4 rounds to -0.0, which would print as "-0"
            let rounded = if rounded == 0.0 { 0.0 } else { rounded };
            format!("{rounded:.0}{}", self.temperature_unit)
        })
    }
}

/// Per-request rendering options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderRequest {
    /// `None` uses the configured default orientation
    pub orientation: Option<Orientation>,
    /// IANA timezone name overriding the configured one (used by tests)
    pub timezone: Option<String>,
}

impl RenderRequest {
    pub fn with_orientation(orientation: Orientation) -> Self {
        Self {
            orientation: Some(orientation),
            timezone: None,
        }
    }
}
