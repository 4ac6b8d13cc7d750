//! Menu-bar icon rendering
//!
//! [`render`] is a pure function from [`IconParams`] to an RGBA image.
//! [`IconPainter`] sits in front of it: it coalesces bursts of invalidations
//! and skips repaints whose [`IconKey`] matches the last delivered icon.

mod painter;
pub mod palette;
mod render;

pub use painter::{IconPainter, IconSink, PngFileSink, PAINT_DEBOUNCE};
pub use render::{render, IconImage, ICON_HEIGHT};

use crate::types::{clamp_percentage, Appearance, IconStyle};

/// Everything the renderer reads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IconParams {
    pub percentage: f64,
    pub style: IconStyle,
    pub appearance: Appearance,
    pub monochrome: bool,
}

impl IconParams {
    /// Cache key: [`render`] draws from the same rounded percentage, so two
    /// params with the same key render identical pixels.
    pub fn key(&self) -> IconKey {
        IconKey {
            percentage: clamp_percentage(self.percentage).round() as u8,
            style: self.style,
            appearance: self.appearance,
            monochrome: self.monochrome,
        }
    }
}

/// Composite cache key for a painted icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconKey {
    /// Percentage rounded to a whole number
    pub percentage: u8,
    pub style: IconStyle,
    pub appearance: Appearance,
    pub monochrome: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_rounds_and_clamps() {
        let params = |p| IconParams {
            percentage: p,
            style: IconStyle::Ring,
            appearance: Appearance::Dark,
            monochrome: false,
        };
        assert_eq!(params(41.6).key(), params(42.4).key());
        assert_ne!(params(41.4).key(), params(41.6).key());
        assert_eq!(params(130.0).key().percentage, 100);
        assert_eq!(params(f64::NAN).key().percentage, 0);
    }
}
