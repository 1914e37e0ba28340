//! # Grayscale Drawing Surface
//!
//! [`Canvas`] wraps an `image::GrayImage` with the handful of operations the
//! clock layout needs: measure a string, draw it at a position, and blend an
//! icon through its alpha channel.
//!
//! ## Fonts
//!
//! Text is drawn with the configured TrueType/OpenType font via `ab_glyph`
//! and `imageproc`. When that file cannot be loaded every face falls back to
//! the built-in `embedded-graphics` 10x20 bitmap font, scaled up by whole
//! pixels to approximate the requested size. The built-in font is compiled
//! into the binary, so text can always be drawn.

use ab_glyph::{FontVec, PxScale};
use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{renderer::TextRenderer, Baseline, Text},
};
use image::{GrayAlphaImage, GrayImage, Luma};
use imageproc::drawing::{draw_text_mut, text_size};
use std::convert::Infallible;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dark_mode::ColorScheme;

/// Line height of the built-in bitmap font in pixels.
const BUILTIN_LINE_HEIGHT: u32 = 20;

/// A font at a particular size.
#[derive(Clone)]
pub enum TextFace {
    /// Outline font loaded from disk
    Outline { font: Arc<FontVec>, scale: PxScale },
    /// Built-in bitmap font, each source pixel drawn as a `scale`-sized block
    Builtin { scale: u32 },
}

impl TextFace {
    /// Built-in face approximating `size` pixels of line height.
    pub fn builtin(size: u32) -> Self {
        TextFace::Builtin {
            scale: (size / BUILTIN_LINE_HEIGHT).max(1),
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, TextFace::Builtin { .. })
    }

    /// Width and height of `text` when drawn with this face.
    pub fn measure(&self, text: &str) -> (u32, u32) {
        match self {
            TextFace::Outline { font, scale } => text_size(*scale, &**font, text),
            TextFace::Builtin { scale } => {
                let style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
                let metrics = style.measure_string(text, Point::zero(), Baseline::Top);
                let size = metrics.bounding_box.size;
                (size.width * scale, size.height.max(BUILTIN_LINE_HEIGHT) * scale)
            }
        }
    }
}

impl std::fmt::Debug for TextFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextFace::Outline { scale, .. } => write!(f, "Outline({}px)", scale.y),
            TextFace::Builtin { scale } => write!(f, "Builtin(x{scale})"),
        }
    }
}

/// The three faces a clock face uses.
#[derive(Clone, Debug)]
pub struct FontSet {
    pub time: TextFace,
    pub date: TextFace,
    pub weather: TextFace,
}

impl FontSet {
    /// Load `path` at the three sizes, or fall back to the built-in font for
    /// all of them when the file is missing or unreadable.
    pub fn load(path: &Path, time_size: u32, date_size: u32, weather_size: u32) -> Self {
        match load_font(path) {
            Ok(font) => {
                info!(path = %path.display(), "font loaded");
                let face = |size: u32| TextFace::Outline {
                    font: Arc::clone(&font),
                    scale: PxScale::from(size as f32),
                };
                FontSet {
                    time: face(time_size),
                    date: face(date_size),
                    weather: face(weather_size),
                }
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "failed to load font, using built-in font");
                Self::builtin(time_size, date_size, weather_size)
            }
        }
    }

    pub fn builtin(time_size: u32, date_size: u32, weather_size: u32) -> Self {
        FontSet {
            time: TextFace::builtin(time_size),
            date: TextFace::builtin(date_size),
            weather: TextFace::builtin(weather_size),
        }
    }
}

fn load_font(path: &Path) -> Result<Arc<FontVec>, String> {
    let data = fs::read(path).map_err(|e| e.to_string())?;
    // Index 0 also selects the first face of a .ttc collection
    FontVec::try_from_vec_and_index(data, 0)
        .map(Arc::new)
        .map_err(|e| e.to_string())
}

/// A single-channel drawing surface filled with the scheme background.
pub struct Canvas {
    image: GrayImage,
    scheme: ColorScheme,
}

impl Canvas {
    pub fn new(width: u32, height: u32, scheme: ColorScheme) -> Self {
        Self {
            image: GrayImage::from_pixel(width, height, scheme.background()),
            scheme,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Draw `text` with its top-left corner at `(x, y)` in the foreground color.
    pub fn draw_text(&mut self, face: &TextFace, x: i32, y: i32, text: &str) {
        let color = self.scheme.foreground();
        match face {
            TextFace::Outline { font, scale } => {
                draw_text_mut(&mut self.image, color, x, y, *scale, &**font, text);
            }
            TextFace::Builtin { scale } => {
                let mut target = ScaledTarget {
                    image: &mut self.image,
                    origin: Point::new(x, y),
                    scale: *scale,
                    color,
                };
                let style = MonoTextStyle::new(&FONT_10X20, BinaryColor::On);
                Text::with_baseline(text, Point::zero(), style, Baseline::Top)
                    .draw(&mut target)
                    .ok();
            }
        }
    }

    /// Blend `icon` onto the canvas at `(x, y)` using its alpha channel.
    ///
    /// Transparent icon pixels leave the background untouched. Parts of the
    /// icon outside the canvas are clipped.
    pub fn paste_masked(&mut self, icon: &GrayAlphaImage, x: i32, y: i32) {
        for (ix, iy, pixel) in icon.enumerate_pixels() {
            let [luma, alpha] = pixel.0;
            if alpha == 0 {
                continue;
            }
            let (cx, cy) = (x + ix as i32, y + iy as i32);
            if cx < 0 || cy < 0 || cx as u32 >= self.width() || cy as u32 >= self.height() {
                continue;
            }
            let dst = self.image.get_pixel_mut(cx as u32, cy as u32);
            let a = alpha as u32;
            let blended = (luma as u32 * a + dst.0[0] as u32 * (255 - a) + 127) / 255;
            *dst = Luma([blended as u8]);
        }
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }
}

/// `DrawTarget` that magnifies every pixel of the bitmap font into a square
/// block on the grayscale image.
struct ScaledTarget<'a> {
    image: &'a mut GrayImage,
    origin: Point,
    scale: u32,
    color: Luma<u8>,
}

impl OriginDimensions for ScaledTarget<'_> {
    fn size(&self) -> Size {
        Size::new(
            self.image.width() / self.scale,
            self.image.height() / self.scale,
        )
    }
}

impl DrawTarget for ScaledTarget<'_> {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let scale = self.scale as i32;
        let (width, height) = (self.image.width() as i32, self.image.height() as i32);
        for Pixel(point, color) in pixels {
            if color.is_off() {
                continue;
            }
            let left = self.origin.x + point.x * scale;
            let top = self.origin.y + point.y * scale;
            for y in top.max(0)..(top + scale).min(height) {
                for x in left.max(0)..(left + scale).min(width) {
                    self.image.put_pixel(x as u32, y as u32, self.color);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::LumaA;

    fn ink(image: &GrayImage, ink: u8) -> usize {
        image.pixels().filter(|p| p.0[0] == ink).count()
    }

    #[test]
    fn test_missing_font_falls_back_to_builtin() {
        let fonts = FontSet::load(Path::new("/nonexistent/font.ttf"), 200, 60, 50);
        assert!(fonts.time.is_builtin());
        assert!(fonts.date.is_builtin());
        assert!(fonts.weather.is_builtin());
    }

    #[test]
    fn test_builtin_measure_scales_with_size() {
        let face = TextFace::builtin(200);
        assert_eq!(face.measure("12:34"), (5 * 10 * 10, 200));

        let tiny = TextFace::builtin(8);
        assert_eq!(tiny.measure("ab"), (20, 20));
    }

    #[test]
    fn test_builtin_text_draws_foreground() {
        let mut canvas = Canvas::new(200, 60, ColorScheme::new(false));
        canvas.draw_text(&TextFace::builtin(40), 10, 10, "8");
        let image = canvas.into_image();
        assert!(ink(&image, 0) > 0, "glyph should leave black pixels");
        assert_eq!(image.get_pixel(0, 0), &Luma([255]));
    }

    #[test]
    fn test_builtin_text_is_clipped_at_edges() {
        let mut canvas = Canvas::new(30, 30, ColorScheme::new(true));
        canvas.draw_text(&TextFace::builtin(100), -20, -20, "W");
        assert_eq!(canvas.width(), 30);
    }

    #[test]
    fn test_paste_masked_respects_alpha() {
        let mut canvas = Canvas::new(4, 1, ColorScheme::new(false));
        let mut icon = GrayAlphaImage::new(3, 1);
        icon.put_pixel(0, 0, LumaA([0, 0]));
        icon.put_pixel(1, 0, LumaA([0, 255]));
        icon.put_pixel(2, 0, LumaA([0, 128]));
        canvas.paste_masked(&icon, 1, 0);

        let image = canvas.into_image();
        assert_eq!(image.get_pixel(0, 0), &Luma([255]));
        assert_eq!(image.get_pixel(1, 0), &Luma([255]));
        assert_eq!(image.get_pixel(2, 0), &Luma([0]));
        assert_eq!(image.get_pixel(3, 0), &Luma([127]));
    }
}
