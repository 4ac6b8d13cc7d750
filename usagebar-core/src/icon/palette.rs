//! Fixed icon colors.
//!
//! Level colors are used for fills when the monochrome toggle is off. Text
//! colors follow the menu-bar appearance and are used for outlines, tracks
//! and monochrome fills.

use crate::types::{Appearance, StatusLevel};

/// RGBA color
pub type Rgba = [u8; 4];

// Level fills
pub const SAFE: Rgba = [52, 199, 89, 255]; // Green
pub const MODERATE: Rgba = [255, 149, 0, 255]; // Orange
pub const CRITICAL: Rgba = [255, 59, 48, 255]; // Red

// Text colors
pub const TEXT_ON_LIGHT: Rgba = [0, 0, 0, 255];
pub const TEXT_ON_DARK: Rgba = [255, 255, 255, 255];

/// Alpha applied to text color for empty tracks
pub const TRACK_ALPHA: u8 = 77;

pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

pub fn level_color(level: StatusLevel) -> Rgba {
    match level {
        StatusLevel::Safe => SAFE,
        StatusLevel::Moderate => MODERATE,
        StatusLevel::Critical => CRITICAL,
    }
}

pub fn text_color(appearance: Appearance) -> Rgba {
    if appearance.is_dark() {
        TEXT_ON_DARK
    } else {
        TEXT_ON_LIGHT
    }
}

pub fn track_color(appearance: Appearance) -> Rgba {
    let [r, g, b, _] = text_color(appearance);
    [r, g, b, TRACK_ALPHA]
}

/// Fill color for a percentage.
pub fn fill_color(percentage: f64, appearance: Appearance, monochrome: bool) -> Rgba {
    if monochrome {
        text_color(appearance)
    } else {
        level_color(StatusLevel::from_percentage(percentage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_color_by_level() {
        assert_eq!(fill_color(10.0, Appearance::Light, false), SAFE);
        assert_eq!(fill_color(50.0, Appearance::Light, false), MODERATE);
        assert_eq!(fill_color(92.0, Appearance::Light, false), CRITICAL);
    }

    #[test]
    fn test_monochrome_uses_text_color() {
        assert_eq!(fill_color(92.0, Appearance::Light, true), TEXT_ON_LIGHT);
        assert_eq!(fill_color(92.0, Appearance::Dark, true), TEXT_ON_DARK);
    }
}
