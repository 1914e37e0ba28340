//! SVG rasterization shared by the template and icon renderers.

use resvg::tiny_skia;
use resvg::usvg;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum SvgError {
    #[error("failed to parse SVG '{label}': {source}")]
    Parse {
        label: String,
        #[source]
        source: usvg::Error,
    },

    #[error("SVG '{0}' has invalid dimensions")]
    InvalidSize(String),

    #[error("failed to allocate {1}x{2} raster target for '{0}'")]
    Alloc(String, u32, u32),
}

/// How the document is mapped onto the target raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fit {
    /// Scale each axis independently to fill the target exactly
    Stretch,
    /// Keep the aspect ratio and center inside the target
    Contain,
}

/// Font database with system fonts plus an optional extra font file.
///
/// The generic `sans-serif` and `serif` families resolve to the extra font
/// when it loads, otherwise to the first available face. Scanning system
/// fonts is slow, so callers build this once and share it.
pub fn font_database(extra_font: Option<&Path>) -> Arc<usvg::fontdb::Database> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let preferred = extra_font.and_then(|path| load_extra_font(&mut db, path));
    let family = preferred.or_else(|| {
        db.faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
    });

    match family {
        Some(family) => {
            debug!(%family, faces = db.len(), "generic font families bound");
            db.set_sans_serif_family(family.clone());
            db.set_serif_family(family);
        }
        None => warn!("no fonts available, SVG text cannot be drawn"),
    }
    Arc::new(db)
}

/// Load `path` into `db` and return the family name of its first face.
fn load_extra_font(db: &mut usvg::fontdb::Database, path: &Path) -> Option<String> {
    let known: Vec<usvg::fontdb::ID> = db.faces().map(|face| face.id).collect();
    if let Err(e) = db.load_font_file(path) {
        warn!(path = %path.display(), error = %e, "failed to load font for SVG text");
        return None;
    }
    db.faces()
        .filter(|face| !known.contains(&face.id))
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
}

/// Parse `svg_data` and render it into a new `width` x `height` pixmap.
///
/// With `background` the pixmap is filled first, so the result is opaque;
/// without it uncovered pixels stay transparent.
pub fn rasterize(
    label: &str,
    svg_data: &[u8],
    fontdb: Option<Arc<usvg::fontdb::Database>>,
    width: u32,
    height: u32,
    fit: Fit,
    background: Option<u8>,
) -> Result<tiny_skia::Pixmap, SvgError> {
    let mut options = usvg::Options::default();
    if let Some(fontdb) = fontdb {
        options.fontdb = fontdb;
    }

    let tree = usvg::Tree::from_data(svg_data, &options).map_err(|source| SvgError::Parse {
        label: label.to_string(),
        source,
    })?;
    let size = tree.size();
    if size.width() <= 0.0 || size.height() <= 0.0 {
        return Err(SvgError::InvalidSize(label.to_string()));
    }

    let mut pixmap = tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| SvgError::Alloc(label.to_string(), width, height))?;
    if let Some(level) = background {
        pixmap.fill(tiny_skia::Color::from_rgba8(level, level, level, 255));
    }

    let sx = width as f32 / size.width();
    let sy = height as f32 / size.height();
    let transform = match fit {
        Fit::Stretch => tiny_skia::Transform::from_scale(sx, sy),
        Fit::Contain => {
            let scale = sx.min(sy);
            let x_offset = (width as f32 - size.width() * scale) / 2.0;
            let y_offset = (height as f32 - size.height() * scale) / 2.0;
            tiny_skia::Transform::from_scale(scale, scale).post_translate(x_offset, y_offset)
        }
    };

    resvg::render(&tree, transform, &mut pixmap.as_mut());
    Ok(pixmap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect x="0" y="0" width="10" height="5" fill="black"/></svg>"#;

    #[test]
    fn test_stretch_fills_exact_size() {
        let pixmap = rasterize("square", SQUARE.as_bytes(), None, 40, 20, Fit::Stretch, Some(255))
            .unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (40, 20));
        // top half black, bottom half white, fully opaque
        let top = pixmap.pixel(20, 2).unwrap();
        let bottom = pixmap.pixel(20, 18).unwrap();
        assert_eq!((top.red(), top.alpha()), (0, 255));
        assert_eq!((bottom.red(), bottom.alpha()), (255, 255));
    }

    #[test]
    fn test_contain_keeps_transparent_margins() {
        let pixmap = rasterize("square", SQUARE.as_bytes(), None, 40, 20, Fit::Contain, None)
            .unwrap();
        // 20x20 content centered horizontally, margins left transparent
        assert_eq!(pixmap.pixel(2, 2).unwrap().alpha(), 0);
        assert_eq!(pixmap.pixel(20, 2).unwrap().alpha(), 255);
    }

    #[test]
    fn test_generic_family_uses_extra_font() {
        let font = Path::new(env!("CARGO_MANIFEST_DIR")).join("fonts/DejaVuSans-Bold.ttf");
        let db = font_database(Some(&font));
        let query = usvg::fontdb::Query {
            families: &[usvg::fontdb::Family::SansSerif],
            weight: usvg::fontdb::Weight::BOLD,
            ..Default::default()
        };
        let id = db.query(&query).unwrap();
        let face = db.face(id).unwrap();
        assert!(face.families.iter().any(|(name, _)| name == "DejaVu Sans"));
    }

    #[test]
    fn test_text_is_drawn_with_extra_font() {
        let font = Path::new(env!("CARGO_MANIFEST_DIR")).join("fonts/DejaVuSans-Bold.ttf");
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="100" viewBox="0 0 200 100"><text x="10" y="80" font-family="No Such Font, sans-serif" font-size="80" font-weight="bold" fill="black">88</text></svg>"#;
        let pixmap = rasterize(
            "text",
            svg.as_bytes(),
            Some(font_database(Some(&font))),
            200,
            100,
            Fit::Stretch,
            Some(255),
        )
        .unwrap();
        let ink = pixmap.pixels().iter().filter(|p| p.red() < 128).count();
        assert!(ink > 500, "glyphs should be rasterized, got {ink} ink pixels");
    }

    #[test]
    fn test_invalid_svg_is_an_error() {
        let result = rasterize("broken", b"<svg", None, 10, 10, Fit::Stretch, None);
        assert!(matches!(result, Err(SvgError::Parse { .. })));
    }
}
