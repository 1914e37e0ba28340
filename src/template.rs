//! # SVG Template Rendering
//!
//! A template is a hand-drawn SVG of the whole clock face, one per
//! orientation (`landscape_template.svg`, `portrait_template.svg`). The
//! designer writes sample values into it; the renderer swaps them for live
//! data and rasterizes the result.
//!
//! ## Placeholder Contract
//!
//! Templates and renderer share a closed set of literal placeholders
//! ([`Placeholder`]) and fill attributes ([`ColorSlot`]). Anything else in
//! the document is left alone. Substitution is a single left-to-right pass,
//! so inserted values are never matched again.
//!
//! The editor's "NNN × NNN px" size annotation is removed as well. It is
//! recognized by its exact shape (centered, 20px Arial, `#888` fill) and
//! silently stops matching if a template draws it differently.
//!
//! ## Fallback
//!
//! No template directory, no template file, no usable font, or any
//! parse/raster failure (a rasterizer panic included) means `None`, and the
//! composer draws the clock procedurally instead.
//!
//! Template text asking for an unavailable family falls through to the
//! generic `sans-serif`/`serif` families, which are bound to the configured
//! font file (see [`svg::font_database`]).

use image::{DynamicImage, GrayImage, RgbaImage};
use resvg::usvg;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use crate::dark_mode::ColorScheme;
use crate::svg::{self, Fit};
use crate::{ClockData, Orientation};

/// Sample text a template carries where live data goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    Date,
    Time,
    Temperature,
    Description,
    LandscapeTitle,
    PortraitTitle,
    DateLabel,
    TimeLabel,
    WeatherLabel,
}

impl Placeholder {
    pub const ALL: [Placeholder; 9] = [
        Placeholder::Date,
        Placeholder::Time,
        Placeholder::Temperature,
        Placeholder::Description,
        Placeholder::LandscapeTitle,
        Placeholder::PortraitTitle,
        Placeholder::DateLabel,
        Placeholder::TimeLabel,
        Placeholder::WeatherLabel,
    ];

    /// Literal text as it appears in the template.
    pub fn literal(self) -> &'static str {
        match self {
            Placeholder::Date => "Friday, April 4, 2025",
            Placeholder::Time => "14:25",
            Placeholder::Temperature => "23°C",
            Placeholder::Description => "Clear Sky",
            Placeholder::LandscapeTitle => "SumiClock - Landscape Layout Template",
            Placeholder::PortraitTitle => "SumiClock - Portrait Layout Template",
            Placeholder::DateLabel => "Date Section",
            Placeholder::TimeLabel => "Time Section",
            Placeholder::WeatherLabel => "Weather Section",
        }
    }

    /// Replacement text; captions and titles are removed.
    fn value(self, data: &ClockData) -> String {
        match self {
            Placeholder::Date => escape_text(&data.date),
            Placeholder::Time => escape_text(&data.time),
            Placeholder::Temperature => data
                .temperature_text()
                .map(|t| escape_text(&t))
                .unwrap_or_default(),
            Placeholder::Description => data
                .weather
                .as_ref()
                .map(|w| escape_text(&w.description))
                .unwrap_or_default(),
            Placeholder::LandscapeTitle
            | Placeholder::PortraitTitle
            | Placeholder::DateLabel
            | Placeholder::TimeLabel
            | Placeholder::WeatherLabel => String::new(),
        }
    }
}

/// Fill attributes a template uses for each tier of color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSlot {
    Background,
    Text,
    Highlight,
}

impl ColorSlot {
    /// Attribute spellings mapped onto each slot.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            ColorSlot::Background => &[r#"fill="white""#],
            ColorSlot::Text => &[r##"fill="#444""##, r##"fill="#666""##],
            ColorSlot::Highlight => &[r##"fill="#222""##],
        }
    }

    fn color(self, scheme: ColorScheme) -> String {
        let level = match self {
            ColorSlot::Background => scheme.background(),
            ColorSlot::Text => scheme.foreground(),
            ColorSlot::Highlight => scheme.highlight(),
        };
        format!(r#"fill="{}""#, ColorScheme::hex(level))
    }
}

/// Fills and rasterizes orientation templates.
pub struct TemplateRenderer {
    template_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
    fontdb: OnceLock<Arc<usvg::fontdb::Database>>,
}

impl TemplateRenderer {
    /// `font_path` is made available to template text in addition to the
    /// system fonts.
    pub fn new(template_dir: Option<PathBuf>, font_path: Option<PathBuf>) -> Self {
        match &template_dir {
            Some(dir) => info!(template_dir = %dir.display(), "template renderer initialized"),
            None => info!("no template directory configured, using procedural rendering"),
        }
        Self {
            template_dir,
            font_path,
            fontdb: OnceLock::new(),
        }
    }

    /// Path of the template for `orientation`, if it exists.
    pub fn template_path(&self, orientation: Orientation) -> Option<PathBuf> {
        let dir = self.template_dir.as_ref()?;
        let path = dir.join(format!("{}_template.svg", orientation.as_str()));
        if path.is_file() {
            Some(path)
        } else {
            warn!(path = %path.display(), "template file not found");
            None
        }
    }

    /// Render `data` through the orientation's template into a
    /// `width` x `height` grayscale image, or `None` to request the
    /// procedural fallback.
    pub fn render(
        &self,
        data: &ClockData,
        width: u32,
        height: u32,
        orientation: Orientation,
        dark: bool,
    ) -> Option<GrayImage> {
        let path = self.template_path(orientation)?;
        let template = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read template");
                return None;
            }
        };

        let scheme = ColorScheme::new(dark);
        let document = populate(&template, data, scheme);
        let fontdb = Arc::clone(
            self.fontdb
                .get_or_init(|| svg::font_database(self.font_path.as_deref())),
        );
        if fontdb.is_empty() {
            warn!(path = %path.display(), "no fonts for template text, using procedural layout");
            return None;
        }

        let rasterized = catch_panic(&path, || {
            svg::rasterize(
                orientation.as_str(),
                document.as_bytes(),
                Some(fontdb),
                width,
                height,
                Fit::Stretch,
                Some(scheme.background().0[0]),
            )
        })?;
        let pixmap = match rasterized {
            Ok(pixmap) => pixmap,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to render template");
                return None;
            }
        };

        // The background fill makes every pixel opaque, so premultiplied and
        // straight RGBA coincide.
        let rgba = RgbaImage::from_raw(width, height, pixmap.take())?;
        Some(DynamicImage::ImageRgba8(rgba).to_luma8())
    }
}

/// Run `render`, turning a panic inside the rasterizer into `None`.
fn catch_panic<T>(path: &Path, render: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(render)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(path = %path.display(), "template rasterizer panicked");
            None
        }
    }
}

/// Apply the placeholder contract to a template document.
pub fn populate(template: &str, data: &ClockData, scheme: ColorScheme) -> String {
    let mut replacements: Vec<(&'static str, String)> = Placeholder::ALL
        .iter()
        .map(|p| (p.literal(), p.value(data)))
        .collect();
    for slot in [ColorSlot::Background, ColorSlot::Text, ColorSlot::Highlight] {
        for attribute in slot.attributes() {
            replacements.push((*attribute, slot.color(scheme)));
        }
    }
    // Longest literal first where several start at the same offset
    replacements.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    substitute(&strip_dimension_annotations(template), &replacements)
}

/// Single pass replacement: output is never rescanned.
fn substitute(text: &str, replacements: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while !rest.is_empty() {
        for (literal, value) in replacements {
            if rest.starts_with(literal) {
                out.push_str(value);
                rest = &rest[literal.len()..];
                continue 'scan;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Remove `<text>` elements holding the editor's "NNN × NNN px" annotation.
fn strip_dimension_annotations(svg_text: &str) -> String {
    let mut out = String::with_capacity(svg_text.len());
    let mut rest = svg_text;
    while let Some(start) = rest.find("<text ") {
        let Some(end) = rest[start..].find("</text>").map(|i| start + i + "</text>".len()) else {
            break;
        };
        let element = &rest[start..end];
        out.push_str(&rest[..start]);
        if !is_dimension_annotation(element) {
            out.push_str(element);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

fn is_dimension_annotation(element: &str) -> bool {
    let Some(open_end) = element.find('>') else {
        return false;
    };
    let open_tag = &element[..open_end];
    let attributes_match = [
        r#"x="50%""#,
        r#"text-anchor="middle""#,
        r#"font-family="Arial""#,
        r#"font-size="20""#,
        r##"fill="#888""##,
    ]
    .iter()
    .all(|attribute| open_tag.contains(attribute));
    if !attributes_match {
        return false;
    }

    let body = element[open_end + 1..]
        .trim_end_matches("</text>")
        .trim();
    let Some(dimensions) = body.strip_suffix("px") else {
        return false;
    };
    let mut parts = dimensions.trim().split(" × ");
    let is_number = |s: Option<&str>| {
        s.map(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    };
    is_number(parts.next()) && is_number(parts.next()) && parts.next().is_none()
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
