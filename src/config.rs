//! # Configuration Management
//!
//! This module loads configuration from `sumiclock.toml` and applies
//! environment overrides on top. The resulting [`Config`] is built once at
//! process start and handed to every component by reference; nothing in the
//! rendering path looks configuration up on its own.
//!
//! ## Environment Overrides
//!
//! Every field can be overridden with `SUMICLOCK_<SECTION>_<FIELD>`, for
//! example `SUMICLOCK_CLOCK_TIMEZONE=Asia/Tokyo` or
//! `SUMICLOCK_WEATHER_ENABLED=true`. The short names `SUMICLOCK_TIMEZONE`,
//! `SUMICLOCK_REDIS_CACHE_EXPIRE_SECONDS`, `SUMICLOCK_WEATHER_API_KEY` and
//! friends used by older deployments are honoured as well.
//! Values that fail to parse are logged and ignored.

use crate::Orientation;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Default configuration file name, resolved against the working directory.
pub const CONFIG_FILE: &str = "sumiclock.toml";

/// Environment variable holding an alternative configuration file path.
pub const CONFIG_PATH_ENV: &str = "SUMICLOCK_CONFIG";

const ENV_PREFIX: &str = "SUMICLOCK_";

/// Application configuration loaded from sumiclock.toml
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// HTTP listener
    pub server: ServerConfig,
    /// Canvas, fonts, timezone and dark mode
    pub clock: ClockConfig,
    /// Weather provider and icons
    pub weather: WeatherConfig,
    /// Rendered image cache
    pub cache: CacheConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Canvas and clock face configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClockConfig {
    /// Canvas width in pixels (landscape)
    pub width: u32,
    /// Canvas height in pixels (landscape)
    pub height: u32,
    /// Font size of the time text
    pub font_size: u32,
    /// Font size of the date line
    pub date_font_size: u32,
    /// Font size of the weather text
    pub weather_font_size: u32,
    /// TrueType/OpenType font (collections use their first face)
    pub font_path: PathBuf,
    /// IANA timezone name, e.g. "Asia/Tokyo"
    pub timezone: String,
    /// Local hour dark mode starts (inclusive)
    pub dark_mode_start: u32,
    /// Local hour dark mode ends (exclusive)
    pub dark_mode_end: u32,
    /// Render portrait when a request does not specify an orientation
    pub portrait_mode: bool,
    /// Directory holding `landscape_template.svg` / `portrait_template.svg`
    pub template_dir: Option<PathBuf>,
}

/// Weather provider configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WeatherConfig {
    pub enabled: bool,
    /// OpenWeatherMap API key
    pub api_key: String,
    pub city: String,
    /// `metric`, `imperial` or `standard`
    pub units: String,
    /// Square icon edge in pixels
    pub icon_size: u32,
    /// Directory holding the nine condition icons
    pub icons_dir: PathBuf,
    /// Upper bound for a single provider call
    pub timeout_seconds: u64,
}

/// Which store backs the image cache.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    None,
    Memory,
    File,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(CacheBackend::None),
            "memory" => Ok(CacheBackend::Memory),
            "file" => Ok(CacheBackend::File),
            other => Err(format!("unknown cache backend '{other}'")),
        }
    }
}

/// Image cache configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Directory used by the file backend
    pub dir: PathBuf,
    /// Entry lifetime; a safety bound, keys roll over every minute anyway
    pub expire_seconds: u64,
}

/// Reasons a loaded configuration is unusable.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("canvas dimensions must be non-zero, got {0}x{1}")]
    Dimensions(u32, u32),

    #[error("font sizes must be non-zero")]
    FontSize,

    #[error("dark mode hours must be in 0..24, got {0}..{1}")]
    DarkModeHours(u32, u32),

    #[error("unknown timezone '{0}'")]
    Timezone(String),

    #[error("weather icon size must be non-zero")]
    IconSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            width: 1448,  // Kindle Paperwhite panel
            height: 1072, // Kindle Paperwhite panel
            font_size: 200,
            date_font_size: 60,
            weather_font_size: 50,
            font_path: PathBuf::from("/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc"),
            timezone: "UTC".to_string(),
            dark_mode_start: 18,
            dark_mode_end: 6,
            portrait_mode: false,
            template_dir: Some(PathBuf::from("templates")),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            enabled: false,
            api_key: String::new(),
            city: "Tokyo".to_string(),
            units: "metric".to_string(),
            icon_size: 180,
            icons_dir: PathBuf::from("weather_icons"),
            timeout_seconds: 5,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: CacheBackend::Memory,
            dir: PathBuf::from("/tmp/sumiclock-cache"),
            expire_seconds: 30,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            clock: ClockConfig::default(),
            weather: WeatherConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from `$SUMICLOCK_CONFIG` or sumiclock.toml, then
    /// apply environment overrides.
    pub fn load() -> Self {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| CONFIG_FILE.to_string());
        let mut config = Self::load_from_path(path);
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "configuration loaded");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "invalid config file, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Apply `SUMICLOCK_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |names: &[&'static str]| -> Option<(String, String)> {
            names.iter().find_map(|name| {
                let key = format!("{ENV_PREFIX}{name}");
                lookup(&key).map(|value| (key, value))
            })
        };

        override_parsed(&mut self.server.host, get(&["SERVER_HOST", "HOST"]));
        override_parsed(&mut self.server.port, get(&["SERVER_PORT", "PORT"]));

        let clock = &mut self.clock;
        override_parsed(&mut clock.width, get(&["CLOCK_WIDTH"]));
        override_parsed(&mut clock.height, get(&["CLOCK_HEIGHT"]));
        override_parsed(&mut clock.font_size, get(&["CLOCK_FONT_SIZE"]));
        override_parsed(&mut clock.date_font_size, get(&["CLOCK_DATE_FONT_SIZE"]));
        override_parsed(&mut clock.weather_font_size, get(&["CLOCK_WEATHER_FONT_SIZE"]));
        override_parsed(&mut clock.font_path, get(&["CLOCK_FONT_PATH", "FONT_PATH"]));
        override_parsed(&mut clock.timezone, get(&["CLOCK_TIMEZONE", "TIMEZONE"]));
        override_parsed(&mut clock.dark_mode_start, get(&["CLOCK_DARK_MODE_START"]));
        override_parsed(&mut clock.dark_mode_end, get(&["CLOCK_DARK_MODE_END"]));
        override_parsed(&mut clock.portrait_mode, get(&["CLOCK_PORTRAIT_MODE", "PORTRAIT_MODE"]));
        if let Some((_, dir)) = get(&["CLOCK_TEMPLATE_DIR", "TEMPLATE_DIR"]) {
            clock.template_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }

        let weather = &mut self.weather;
        override_parsed(&mut weather.enabled, get(&["WEATHER_ENABLED"]));
        override_parsed(&mut weather.api_key, get(&["WEATHER_API_KEY"]));
        override_parsed(&mut weather.city, get(&["WEATHER_CITY"]));
        override_parsed(&mut weather.units, get(&["WEATHER_UNITS"]));
        override_parsed(&mut weather.icon_size, get(&["WEATHER_ICON_SIZE"]));
        override_parsed(&mut weather.icons_dir, get(&["WEATHER_ICONS_DIR"]));
        override_parsed(&mut weather.timeout_seconds, get(&["WEATHER_TIMEOUT_SECONDS"]));

        let cache = &mut self.cache;
        override_parsed(&mut cache.backend, get(&["CACHE_BACKEND"]));
        override_parsed(&mut cache.dir, get(&["CACHE_DIR"]));
        override_parsed(
            &mut cache.expire_seconds,
            get(&["CACHE_EXPIRE_SECONDS", "REDIS_CACHE_EXPIRE_SECONDS"]),
        );
    }

    /// Reject configurations the renderer cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clock = &self.clock;
        if clock.width == 0 || clock.height == 0 {
            return Err(ConfigError::Dimensions(clock.width, clock.height));
        }
        if clock.font_size == 0 || clock.date_font_size == 0 || clock.weather_font_size == 0 {
            return Err(ConfigError::FontSize);
        }
        if clock.dark_mode_start > 23 || clock.dark_mode_end > 23 {
            return Err(ConfigError::DarkModeHours(
                clock.dark_mode_start,
                clock.dark_mode_end,
            ));
        }
        self.timezone()?;
        if self.weather.icon_size == 0 {
            return Err(ConfigError::IconSize);
        }
        Ok(())
    }

    /// The configured timezone.
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.clock.timezone)
    }

    /// Orientation used when a request does not name one.
    pub fn default_orientation(&self) -> Orientation {
        if self.clock.portrait_mode {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Pixel dimensions of a canvas in the given orientation.
    ///
    /// Portrait swaps width and height only when the configured canvas is
    /// wider than it is tall; a canvas configured tall already is portrait.
    pub fn canvas_size(&self, orientation: Orientation) -> (u32, u32) {
        let (width, height) = (self.clock.width, self.clock.height);
        match orientation {
            Orientation::Portrait if width > height => (height, width),
            _ => (width, height),
        }
    }

    /// Unit suffix printed after temperatures.
    pub fn temperature_unit(&self) -> &'static str {
        match self.weather.units.as_str() {
            "imperial" => "°F",
            "standard" => "K",
            _ => "°C",
        }
    }
}

/// Parse an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}

fn override_parsed<T: FromStr>(target: &mut T, value: Option<(String, String)>) {
    let Some((variable, raw)) = value else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(%variable, value = %raw, "ignoring unparseable override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.clock.width, 1448);
        assert_eq!(config.clock.height, 1072);
        assert_eq!(config.clock.timezone, "UTC");
        assert_eq!(config.clock.dark_mode_start, 18);
        assert_eq!(config.clock.dark_mode_end, 6);
        assert!(!config.weather.enabled);
        assert_eq!(config.cache.expire_seconds, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[clock]
timezone = "Asia/Tokyo"
portrait_mode = true

[weather]
city = "Osaka"
"#
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.clock.timezone, "Asia/Tokyo");
        assert!(config.clock.portrait_mode);
        assert_eq!(config.clock.width, 1448);
        assert_eq!(config.weather.city, "Osaka");
        assert_eq!(config.weather.units, "metric");
    }

    #[test]
    fn test_sample_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_FILE);
        assert_eq!(Config::load_from_path(path), Config::default());
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[clock\nwidth = ").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(env_of(&[
            ("SUMICLOCK_TIMEZONE", "Europe/Berlin"),
            ("SUMICLOCK_CLOCK_WIDTH", "800"),
            ("SUMICLOCK_WEATHER_ENABLED", "true"),
            ("SUMICLOCK_REDIS_CACHE_EXPIRE_SECONDS", "45"),
            ("SUMICLOCK_CACHE_BACKEND", "file"),
            ("SUMICLOCK_TEMPLATE_DIR", ""),
        ]));
        assert_eq!(config.clock.timezone, "Europe/Berlin");
        assert_eq!(config.clock.width, 800);
        assert!(config.weather.enabled);
        assert_eq!(config.cache.expire_seconds, 45);
        assert_eq!(config.cache.backend, CacheBackend::File);
        assert_eq!(config.clock.template_dir, None);
    }

    #[test]
    fn test_long_name_wins_over_short_name() {
        let mut config = Config::default();
        config.apply_overrides(env_of(&[
            ("SUMICLOCK_CLOCK_TIMEZONE", "Asia/Tokyo"),
            ("SUMICLOCK_TIMEZONE", "Europe/Paris"),
        ]));
        assert_eq!(config.clock.timezone, "Asia/Tokyo");
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(env_of(&[("SUMICLOCK_CLOCK_HEIGHT", "tall")]));
        assert_eq!(config.clock.height, 1072);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.clock.timezone = "Mars/Olympus_Mons".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::Timezone("Mars/Olympus_Mons".to_string()))
        );

        let mut config = Config::default();
        config.clock.dark_mode_end = 24;
        assert_eq!(config.validate(), Err(ConfigError::DarkModeHours(18, 24)));

        let mut config = Config::default();
        config.clock.width = 0;
        assert_eq!(config.validate(), Err(ConfigError::Dimensions(0, 1072)));
    }

    #[test]
    fn test_canvas_size_swaps_only_wide_canvas() {
        let config = Config::default();
        assert_eq!(config.canvas_size(Orientation::Landscape), (1448, 1072));
        assert_eq!(config.canvas_size(Orientation::Portrait), (1072, 1448));

        let mut tall = Config::default();
        tall.clock.width = 600;
        tall.clock.height = 800;
        assert_eq!(tall.canvas_size(Orientation::Portrait), (600, 800));
        assert_eq!(tall.canvas_size(Orientation::Landscape), (600, 800));
    }

    #[test]
    fn test_temperature_unit() {
        let mut config = Config::default();
        assert_eq!(config.temperature_unit(), "°C");
        config.weather.units = "imperial".to_string();
        assert_eq!(config.temperature_unit(), "°F");
        config.weather.units = "standard".to_string();
        assert_eq!(config.temperature_unit(), "K");
    }
}
