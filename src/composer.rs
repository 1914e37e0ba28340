//! # Clock Face Composition
//!
//! [`ClockComposer`] turns "now" into a finished grayscale clock image.
//!
//! ## Rendering Strategy
//!
//! Rendering is a two-step fallback chain, not a pluggable strategy:
//! 1. **Template**: if the orientation has an SVG template, fill and
//!    rasterize it ([`TemplateRenderer`])
//! 2. **Procedural**: otherwise draw time, date and weather directly
//!
//! ## Layout
//!
//! ```text
//!  Landscape                          Portrait
//! +------------------------------+   +----------------+
//! |                              |   |                |
//! |      Friday, April 4, 2025   |   |  Friday, Apr.. |
//! |            14:25             |   |     14:25      |
//! |                              |   |----------------|  <- mid height
//! |   [icon] 23°C  Clear Sky     |   |     [icon]     |  <- 65% height
//! +------------------------------+   |      23°C      |
//!                                    |   Clear Sky    |
//!                                    +----------------+
//! ```
//!
//! Missing weather means no weather block at all. A missing icon turns the
//! block into a single `23°C (Clear Sky)` line.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, GrayAlphaImage, GrayImage, ImageEncoder};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::canvas::{Canvas, FontSet, TextFace};
use crate::config::{parse_timezone, Config};
use crate::dark_mode::{dark_mode_active, ColorScheme};
use crate::error::RenderError;
use crate::template::TemplateRenderer;
use crate::weather::{OpenWeatherMap, WeatherProvider};
use crate::weather_icon::WeatherIconRenderer;
use crate::{ClockData, Orientation, RenderRequest, WeatherSnapshot};

/// Landscape: gap between the date line and the time
const LANDSCAPE_DATE_GAP: i32 = 60;
/// Landscape: distance from the bottom of the time to the weather row
const LANDSCAPE_WEATHER_OFFSET: i32 = 120;
/// Landscape: gap between icon and temperature
const LANDSCAPE_ICON_GAP: i32 = 30;
/// Landscape: gap between temperature and description
const LANDSCAPE_TEXT_GAP: i32 = 40;
/// Portrait: gap between the date line and the time
const PORTRAIT_DATE_GAP: i32 = 40;
/// Portrait: top of the weather column as a fraction of canvas height
const PORTRAIT_WEATHER_ANCHOR: f32 = 0.65;
/// Portrait: gap between icon and temperature
const PORTRAIT_ICON_GAP: i32 = 30;
/// Portrait: gap between temperature and description
const PORTRAIT_TEXT_GAP: i32 = 15;

/// Produces clock images from configuration and the current time.
///
/// Holds only read-only state and can be shared across requests.
pub struct ClockComposer {
    config: Arc<Config>,
    fonts: FontSet,
    templates: TemplateRenderer,
    icons: WeatherIconRenderer,
    weather: Option<Arc<dyn WeatherProvider>>,
}

impl ClockComposer {
    /// Build a composer for `config`, loading fonts once up front.
    ///
    /// When weather is enabled the OpenWeatherMap provider is used; swap it
    /// with [`ClockComposer::with_weather_provider`].
    pub fn new(config: Arc<Config>) -> Self {
        let clock = &config.clock;
        let fonts = FontSet::load(
            &clock.font_path,
            clock.font_size,
            clock.date_font_size,
            clock.weather_font_size,
        );
        let templates =
            TemplateRenderer::new(clock.template_dir.clone(), Some(clock.font_path.clone()));
        let icons = WeatherIconRenderer::new(&config.weather.icons_dir, config.weather.icon_size);
        let weather: Option<Arc<dyn WeatherProvider>> = if config.weather.enabled {
            Some(Arc::new(OpenWeatherMap::new(&config.weather)))
        } else {
            None
        };

        Self {
            config,
            fonts,
            templates,
            icons,
            weather,
        }
    }

    pub fn with_weather_provider(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Orientation a request resolves to.
    pub fn orientation(&self, request: &RenderRequest) -> Orientation {
        request
            .orientation
            .unwrap_or_else(|| self.config.default_orientation())
    }

    /// Timezone name a request renders in.
    pub fn timezone_name<'a>(&'a self, request: &'a RenderRequest) -> &'a str {
        request
            .timezone
            .as_deref()
            .unwrap_or(&self.config.clock.timezone)
    }

    /// Current weather, or `None` when disabled or unavailable.
    ///
    /// The provider is not consulted at all while weather is disabled.
    pub fn fetch_weather(&self) -> Option<WeatherSnapshot> {
        if !self.config.weather.enabled {
            return None;
        }
        let provider = self.weather.as_ref()?;
        match provider.current() {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "weather unavailable, rendering without it");
                None
            }
        }
    }

    /// Formatted strings for one render.
    pub fn clock_data(&self, local: &DateTime<Tz>, weather: Option<WeatherSnapshot>) -> ClockData {
        ClockData {
            time: local.format("%H:%M").to_string(),
            date: local.format("%A, %B %-d, %Y").to_string(),
            weather,
            temperature_unit: self.config.temperature_unit(),
        }
    }

    /// Compose the clock for `request` at instant `now`.
    pub fn compose(
        &self,
        request: &RenderRequest,
        now: DateTime<Utc>,
    ) -> Result<GrayImage, RenderError> {
        let tz_name = self.timezone_name(request);
        let tz = parse_timezone(tz_name).map_err(|_| RenderError::Timezone(tz_name.to_string()))?;
        let local = now.with_timezone(&tz);

        let clock = &self.config.clock;
        let dark = dark_mode_active(local.hour(), clock.dark_mode_start, clock.dark_mode_end);
        let data = self.clock_data(&local, self.fetch_weather());

        self.compose_data(&data, self.orientation(request), dark)
    }

    /// Compose already-formatted data: template first, procedural otherwise.
    pub fn compose_data(
        &self,
        data: &ClockData,
        orientation: Orientation,
        dark: bool,
    ) -> Result<GrayImage, RenderError> {
        let (width, height) = self.config.canvas_size(orientation);
        if width == 0 || height == 0 {
            return Err(RenderError::Canvas(width, height));
        }

        if let Some(image) = self.templates.render(data, width, height, orientation, dark) {
            debug!(%orientation, "rendered from template");
            return Ok(image);
        }

        let mut canvas = Canvas::new(width, height, ColorScheme::new(dark));
        let icon = data
            .weather
            .as_ref()
            .and_then(|w| self.icons.get_icon(&w.icon_code, dark));

        match orientation {
            Orientation::Landscape => draw_landscape(&mut canvas, &self.fonts, data, icon.as_ref()),
            Orientation::Portrait => draw_portrait(&mut canvas, &self.fonts, data, icon.as_ref()),
        }
        debug!(%orientation, dark, "rendered procedurally");
        Ok(canvas.into_image())
    }

    /// Compose and encode to PNG bytes.
    pub fn render_png(
        &self,
        request: &RenderRequest,
        now: DateTime<Utc>,
    ) -> Result<Vec<u8>, RenderError> {
        encode_png(&self.compose(request, now)?)
    }
}

/// Encode a grayscale image as PNG with maximum compression.
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>, RenderError> {
    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(&mut bytes, CompressionType::Best, FilterType::Adaptive)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::L8,
        )?;
    Ok(bytes)
}

/// Offset that centers `inner` within `outer`; negative when it overflows.
fn centered(outer: u32, inner: u32) -> i32 {
    (outer as i32 - inner as i32) / 2
}

fn draw_landscape(canvas: &mut Canvas, fonts: &FontSet, data: &ClockData, icon: Option<&GrayAlphaImage>) {
    let (width, height) = (canvas.width(), canvas.height());

    let (time_w, time_h) = fonts.time.measure(&data.time);
    let time_y = centered(height, time_h);
    canvas.draw_text(&fonts.time, centered(width, time_w), time_y, &data.time);

    let (date_w, date_h) = fonts.date.measure(&data.date);
    let date_y = time_y - (date_h as i32 + LANDSCAPE_DATE_GAP);
    canvas.draw_text(&fonts.date, centered(width, date_w), date_y, &data.date);

    let Some(weather) = &data.weather else {
        return;
    };
    let row_y = time_y + time_h as i32 + LANDSCAPE_WEATHER_OFFSET;
    let face = &fonts.weather;
    let temperature = data.temperature_text().unwrap_or_default();

    let Some(icon) = icon else {
        draw_combined_weather(canvas, face, &temperature, &weather.description, row_y);
        return;
    };

    let (temp_w, temp_h) = face.measure(&temperature);
    let (desc_w, desc_h) = face.measure(&weather.description);
    let icon_size = icon.width() as i32;
    let block_w = icon_size + LANDSCAPE_ICON_GAP + temp_w as i32 + LANDSCAPE_TEXT_GAP + desc_w as i32;

    let mut x = (width as i32 - block_w) / 2;
    canvas.paste_masked(icon, x, row_y + (temp_h as i32 - icon_size) / 2);
    x += icon_size + LANDSCAPE_ICON_GAP;
    canvas.draw_text(face, x, row_y, &temperature);
    x += temp_w as i32 + LANDSCAPE_TEXT_GAP;
    canvas.draw_text(face, x, row_y + (temp_h as i32 - desc_h as i32) / 2, &weather.description);
}

fn draw_portrait(canvas: &mut Canvas, fonts: &FontSet, data: &ClockData, icon: Option<&GrayAlphaImage>) {
    let (width, height) = (canvas.width(), canvas.height());

    let (time_w, time_h) = fonts.time.measure(&data.time);
    let time_y = (height / 2) as i32 - time_h as i32;
    canvas.draw_text(&fonts.time, centered(width, time_w), time_y, &data.time);

    let (date_w, date_h) = fonts.date.measure(&data.date);
    let date_y = time_y - date_h as i32 - PORTRAIT_DATE_GAP;
    canvas.draw_text(&fonts.date, centered(width, date_w), date_y, &data.date);

    let Some(weather) = &data.weather else {
        return;
    };
    let anchor_y = (height as f32 * PORTRAIT_WEATHER_ANCHOR) as i32;
    let face = &fonts.weather;
    let temperature = data.temperature_text().unwrap_or_default();

    let Some(icon) = icon else {
        draw_combined_weather(canvas, face, &temperature, &weather.description, anchor_y);
        return;
    };

    canvas.paste_masked(icon, centered(width, icon.width()), anchor_y);

    let (temp_w, temp_h) = face.measure(&temperature);
    let temp_y = anchor_y + icon.height() as i32 + PORTRAIT_ICON_GAP;
    canvas.draw_text(face, centered(width, temp_w), temp_y, &temperature);

    let (desc_w, _) = face.measure(&weather.description);
    let desc_y = temp_y + temp_h as i32 + PORTRAIT_TEXT_GAP;
    canvas.draw_text(face, centered(width, desc_w), desc_y, &weather.description);
}

/// Single centered `23°C (Clear Sky)` line used when no icon is available.
fn draw_combined_weather(canvas: &mut Canvas, face: &TextFace, temperature: &str, description: &str, y: i32) {
    let text = format!("{temperature} ({description})");
    let (text_w, _) = face.measure(&text);
    let x = centered(canvas.width(), text_w);
    canvas.draw_text(face, x, y, &text);
}
