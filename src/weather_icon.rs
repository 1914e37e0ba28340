//! # Weather Condition Icons
//!
//! Turns an OpenWeatherMap condition code such as `"10n"` into a small
//! grayscale bitmap with an alpha mask, ready to be blended onto the clock
//! face.
//!
//! ## Asset Mapping
//!
//! The day/night suffix is dropped and the two-digit condition selects one of
//! nine SVG files in the icons directory:
//!
//! | code | file        | condition        |
//! |------|-------------|------------------|
//! | 01   | `skc.svg`   | clear sky        |
//! | 02   | `few.svg`   | few clouds       |
//! | 03   | `sct.svg`   | scattered clouds |
//! | 04   | `bkn.svg`   | broken clouds    |
//! | 09   | `shra.svg`  | shower rain      |
//! | 10   | `ra.svg`    | rain             |
//! | 11   | `tsra.svg`  | thunderstorm     |
//! | 13   | `sn.svg`    | snow             |
//! | 50   | `fg.svg`    | mist             |
//!
//! Unknown codes use the clear-sky icon. A missing file yields no icon and
//! the caller prints the weather as text only.

use image::{GrayAlphaImage, LumaA};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info};

use crate::dark_mode::ColorScheme;
use crate::svg::{self, Fit, SvgError};

const ICON_TABLE: [(&str, &str); 9] = [
    ("01", "skc"),
    ("02", "few"),
    ("03", "sct"),
    ("04", "bkn"),
    ("09", "shra"),
    ("10", "ra"),
    ("11", "tsra"),
    ("13", "sn"),
    ("50", "fg"),
];

const DEFAULT_ICON: &str = "skc";

#[derive(Error, Debug)]
enum IconError {
    #[error("icon file not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read icon: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Svg(#[from] SvgError),
}

/// Asset name for a condition code, e.g. `"10n"` -> `"ra"`.
pub fn icon_name(condition_code: &str) -> &'static str {
    let base = condition_code
        .strip_suffix(['d', 'n'])
        .unwrap_or(condition_code);
    ICON_TABLE
        .iter()
        .find(|(code, _)| *code == base)
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_ICON)
}

/// Rasterizes condition icons at a fixed square size.
#[derive(Clone, Debug)]
pub struct WeatherIconRenderer {
    icons_dir: PathBuf,
    size: u32,
}

impl WeatherIconRenderer {
    pub fn new(icons_dir: impl Into<PathBuf>, size: u32) -> Self {
        let icons_dir = icons_dir.into();
        info!(icons_dir = %icons_dir.display(), size, "weather icon renderer initialized");
        Self { icons_dir, size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Icon for `condition_code` tinted for the color mode, or `None` when
    /// the asset is missing or cannot be rendered.
    ///
    /// Every opaque pixel carries the flat mode color (white in dark mode,
    /// black in light mode); the rasterized alpha is kept as the mask.
    pub fn get_icon(&self, condition_code: &str, dark: bool) -> Option<GrayAlphaImage> {
        match self.render(condition_code, dark) {
            Ok(icon) => Some(icon),
            Err(e) => {
                error!(condition_code, error = %e, "failed to render weather icon");
                None
            }
        }
    }

    fn icon_path(&self, condition_code: &str) -> PathBuf {
        self.icons_dir.join(format!("{}.svg", icon_name(condition_code)))
    }

    fn render(&self, condition_code: &str, dark: bool) -> Result<GrayAlphaImage, IconError> {
        let path = self.icon_path(condition_code);
        if !path.is_file() {
            return Err(IconError::Missing(path));
        }

        let scheme = ColorScheme::new(dark);
        let fill = if dark { "white" } else { "black" };
        let svg_text = force_fill(&fs::read_to_string(&path)?, fill);

        let pixmap = svg::rasterize(
            &label(&path),
            svg_text.as_bytes(),
            None,
            self.size,
            self.size,
            Fit::Contain,
            None,
        )?;

        let flat = scheme.foreground().0[0];
        let icon = GrayAlphaImage::from_fn(self.size, self.size, |x, y| {
            let alpha = pixmap.pixel(x, y).map(|p| p.alpha()).unwrap_or(0);
            if alpha == 0 {
                LumaA([0, 0])
            } else {
                LumaA([flat, alpha])
            }
        });
        Ok(icon)
    }
}

/// Recolor the icon document to a single fill.
///
/// Explicit black/white fills are replaced; documents without any fill get
/// one on every `<path>`.
fn force_fill(svg_text: &str, fill: &str) -> String {
    let target = format!(r#"fill="{fill}""#);
    if svg_text.contains("fill=") {
        svg_text
            .replace(r#"fill="black""#, &target)
            .replace(r#"fill="white""#, &target)
    } else {
        svg_text.replace("<path ", &format!("<path {target} "))
    }
}

fn label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DROP: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20" viewBox="0 0 20 20"><path d="M4 4 H16 V16 H4 Z"/></svg>"#;

    fn icons_dir_with(name: &str, body: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(format!("{name}.svg")), body).unwrap();
        dir
    }

    #[test]
    fn test_icon_name_mapping() {
        assert_eq!(icon_name("01d"), "skc");
        assert_eq!(icon_name("02n"), "few");
        assert_eq!(icon_name("03d"), "sct");
        assert_eq!(icon_name("04n"), "bkn");
        assert_eq!(icon_name("09d"), "shra");
        assert_eq!(icon_name("10n"), "ra");
        assert_eq!(icon_name("11d"), "tsra");
        assert_eq!(icon_name("13d"), "sn");
        assert_eq!(icon_name("50n"), "fg");
        assert_eq!(icon_name("10"), "ra");
    }

    #[test]
    fn test_unknown_code_defaults_to_clear() {
        assert_eq!(icon_name("99d"), "skc");
        assert_eq!(icon_name(""), "skc");
    }

    #[test]
    fn test_missing_asset_returns_none() {
        let dir = TempDir::new().unwrap();
        let renderer = WeatherIconRenderer::new(dir.path(), 32);
        assert!(renderer.get_icon("01d", false).is_none());
    }

    #[test]
    fn test_light_icon_is_black_with_mask() {
        let dir = icons_dir_with("ra", DROP);
        let renderer = WeatherIconRenderer::new(dir.path(), 40);
        let icon = renderer.get_icon("10d", false).unwrap();

        assert_eq!(icon.dimensions(), (40, 40));
        assert_eq!(icon.get_pixel(20, 20), &LumaA([0, 255]));
        assert_eq!(icon.get_pixel(1, 1).0[1], 0);
    }

    #[test]
    fn test_dark_icon_is_white_regardless_of_asset_fill() {
        let body = DROP.replace("<path ", r#"<path fill="black" "#);
        let dir = icons_dir_with("sn", &body);
        let renderer = WeatherIconRenderer::new(dir.path(), 40);
        let icon = renderer.get_icon("13n", true).unwrap();

        assert_eq!(icon.get_pixel(20, 20), &LumaA([255, 255]));
        assert!(icon
            .pixels()
            .filter(|p| p.0[1] > 0)
            .all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_force_fill() {
        assert_eq!(
            force_fill(r#"<path d="M0 0"/>"#, "white"),
            r#"<path fill="white" d="M0 0"/>"#
        );
        assert_eq!(
            force_fill(r#"<path fill="black" d="M0 0"/>"#, "white"),
            r#"<path fill="white" d="M0 0"/>"#
        );
    }

    #[test]
    fn test_corrupt_asset_returns_none() {
        let dir = icons_dir_with("skc", "<svg");
        let renderer = WeatherIconRenderer::new(dir.path(), 32);
        assert!(renderer.get_icon("01d", true).is_none());
    }
}
