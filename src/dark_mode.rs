//! # Light and Dark Color Schemes
//!
//! An e-ink frame hanging in a bedroom should not glow white at night, so the
//! clock inverts its colors during a configured window of local hours. The
//! window may wrap past midnight (the default is 18:00 to 06:00).
//!
//! The window is half-open: the start hour is dark, the end hour is light.

use image::Luma;

/// Returns true when `hour` falls inside the dark window `[start, end)`.
///
/// A window with `start >= end` wraps midnight, so `(18, 6)` is dark from
/// 18:00 through 05:59. A window with `start == end` is treated as wrapping
/// and therefore dark all day.
///
/// # Example
/// ```
/// use sumiclock_lib::dark_mode::dark_mode_active;
///
/// assert!(dark_mode_active(18, 18, 6));
/// assert!(dark_mode_active(5, 18, 6));
/// assert!(!dark_mode_active(6, 18, 6));
/// ```
pub fn dark_mode_active(hour: u32, start: u32, end: u32) -> bool {
    if start < end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

/// The three gray levels a clock face is drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorScheme {
    pub dark: bool,
}

impl ColorScheme {
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }

    /// Canvas background
    pub fn background(self) -> Luma<u8> {
        if self.dark {
            Luma([0])
        } else {
            Luma([255])
        }
    }

    /// Primary text and icons
    pub fn foreground(self) -> Luma<u8> {
        if self.dark {
            Luma([255])
        } else {
            Luma([0])
        }
    }

    /// Secondary text in templates
    pub fn highlight(self) -> Luma<u8> {
        if self.dark {
            Luma([0xCC])
        } else {
            Luma([0x33])
        }
    }

    /// `#RRGGBB` form of a gray level, for SVG attributes.
    pub fn hex(level: Luma<u8>) -> String {
        let v = level.0[0];
        format!("#{v:02X}{v:02X}{v:02X}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapping_window() {
        for hour in (18..24).chain(0..6) {
            assert!(dark_mode_active(hour, 18, 6), "hour {hour} should be dark");
        }
        for hour in 6..18 {
            assert!(!dark_mode_active(hour, 18, 6), "hour {hour} should be light");
        }
    }

    #[test]
    fn test_daytime_window() {
        for hour in 6..18 {
            assert!(dark_mode_active(hour, 6, 18), "hour {hour} should be dark");
        }
        for hour in (18..24).chain(0..6) {
            assert!(!dark_mode_active(hour, 6, 18), "hour {hour} should be light");
        }
    }

    #[test]
    fn test_boundaries_start_inclusive_end_exclusive() {
        assert!(dark_mode_active(18, 18, 6));
        assert!(!dark_mode_active(6, 18, 6));
        assert!(dark_mode_active(6, 6, 18));
        assert!(!dark_mode_active(18, 6, 18));
    }

    #[test]
    fn test_scheme_colors() {
        let light = ColorScheme::new(false);
        assert_eq!(light.background(), Luma([255]));
        assert_eq!(light.foreground(), Luma([0]));
        assert_eq!(ColorScheme::hex(light.highlight()), "#333333");

        let dark = ColorScheme::new(true);
        assert_eq!(dark.background(), Luma([0]));
        assert_eq!(ColorScheme::hex(dark.foreground()), "#FFFFFF");
        assert_eq!(ColorScheme::hex(dark.highlight()), "#CCCCCC");
    }
}
