//! Pure RGBA rendering of the five icon styles

use std::f64::consts::TAU;
use std::io::Cursor;

use image::{ImageFormat, Rgba as Pixel, RgbaImage};

use super::palette::{self, Rgba};
use super::IconParams;
use crate::error::Result;
use crate::types::IconStyle;

/// Every icon is this tall; width depends on the style
pub const ICON_HEIGHT: u32 = 18;

const BATTERY_WIDTH: u32 = 28;
const PROGRESS_WIDTH: u32 = 36;
const RING_WIDTH: u32 = 18;
const DOT_WIDTH: u32 = 12;

/// Glyph scale for the percentage-as-text style
const TEXT_SCALE: u32 = 3;
const GLYPH_COLS: u32 = 3;
const GLYPH_ROWS: u32 = 5;
const GLYPH_GAP: u32 = 2;
const TEXT_PADDING: u32 = 1;

/// 3x5 glyphs, one row per entry, MSB is the leftmost column
const DIGIT_BITMAPS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111], // 0
    [0b010, 0b110, 0b010, 0b010, 0b111], // 1
    [0b111, 0b001, 0b111, 0b100, 0b111], // 2
    [0b111, 0b001, 0b111, 0b001, 0b111], // 3
    [0b101, 0b101, 0b111, 0b001, 0b001], // 4
    [0b111, 0b100, 0b111, 0b001, 0b111], // 5
    [0b111, 0b100, 0b111, 0b101, 0b111], // 6
    [0b111, 0b001, 0b001, 0b001, 0b001], // 7
    [0b111, 0b101, 0b111, 0b101, 0b111], // 8
    [0b111, 0b101, 0b111, 0b001, 0b111], // 9
];

const PERCENT_BITMAP: [u8; 5] = [0b101, 0b001, 0b010, 0b100, 0b101];

/// A rendered icon
#[derive(Debug, Clone, PartialEq)]
pub struct IconImage {
    image: RgbaImage,
}

impl IconImage {
    fn blank(width: u32) -> Self {
        Self {
            image: RgbaImage::new(width, ICON_HEIGHT),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Pixel at (x, y); transparent outside the image
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.image
            .get_pixel_checked(x, y)
            .map(|p| p.0)
            .unwrap_or(palette::TRANSPARENT)
    }

    /// Raw RGBA8 bytes, row-major
    pub fn as_rgba(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn put(&mut self, x: u32, y: u32, color: Rgba) {
        if x < self.image.width() && y < self.image.height() {
            self.image.put_pixel(x, y, Pixel(color));
        }
    }

    fn fill_rect(&mut self, x0: u32, y0: u32, w: u32, h: u32, color: Rgba) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                self.put(x, y, color);
            }
        }
    }

    /// 1px rectangle outline
    fn stroke_rect(&mut self, x0: u32, y0: u32, w: u32, h: u32, color: Rgba) {
        for x in x0..x0 + w {
            self.put(x, y0, color);
            self.put(x, y0 + h - 1, color);
        }
        for y in y0..y0 + h {
            self.put(x0, y, color);
            self.put(x0 + w - 1, y, color);
        }
    }

    /// Paint pixels whose centers satisfy `inside`
    fn fill_where(&mut self, color: Rgba, inside: impl Fn(f64, f64) -> bool) {
        for y in 0..self.image.height() {
            for x in 0..self.image.width() {
                if inside(x as f64 + 0.5, y as f64 + 0.5) {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn draw_glyph(&mut self, bitmap: &[u8; 5], x_offset: u32, y_offset: u32, color: Rgba) {
        for (row_idx, &row_bits) in bitmap.iter().enumerate() {
            for col in 0..GLYPH_COLS {
                if (row_bits >> (GLYPH_COLS - 1 - col)) & 1 == 1 {
                    self.fill_rect(
                        x_offset + col * TEXT_SCALE,
                        y_offset + row_idx as u32 * TEXT_SCALE,
                        TEXT_SCALE,
                        TEXT_SCALE,
                        color,
                    );
                }
            }
        }
    }
}

/// Render an icon. Draws from the rounded percentage, so params with
/// equal [`IconKey`](super::IconKey)s give equal pixels.
pub fn render(params: &IconParams) -> IconImage {
    let p = f64::from(params.key().percentage);
    let fill = palette::fill_color(p, params.appearance, params.monochrome);
    let text = palette::text_color(params.appearance);
    let track = palette::track_color(params.appearance);

    match params.style {
        IconStyle::Battery => render_battery(p, fill, text),
        IconStyle::ProgressBar => render_progress(p, fill, track),
        IconStyle::PercentageText => render_text(p, fill),
        IconStyle::Ring => render_ring(p, fill, track),
        IconStyle::Dot => render_dot(fill),
    }
}

/// Outline body with a nub on the right, filled left to right.
fn render_battery(p: f64, fill: Rgba, outline: Rgba) -> IconImage {
    let mut icon = IconImage::blank(BATTERY_WIDTH);

    let (body_x, body_y, body_w, body_h) = (0, 3, 26, 12);
    icon.stroke_rect(body_x, body_y, body_w, body_h, outline);
    icon.fill_rect(body_x + body_w, 7, 2, 4, outline);

    // 1px gap between outline and fill
    let inner_w = body_w - 4;
    let fill_w = proportional(inner_w, p);
    if fill_w > 0 {
        icon.fill_rect(body_x + 2, body_y + 2, fill_w, body_h - 4, fill);
    }

    icon
}

/// Rounded track with a rounded fill of the same height.
fn render_progress(p: f64, fill: Rgba, track: Rgba) -> IconImage {
    let mut icon = IconImage::blank(PROGRESS_WIDTH);

    let (x0, y0, h) = (1.0, 6.0, 6.0);
    let track_w = PROGRESS_WIDTH as f64 - 2.0;
    icon.fill_where(track, |x, y| in_pill(x, y, x0, y0, track_w, h));

    let fill_w = track_w * p / 100.0;
    if fill_w > 0.0 {
        let pill_w = fill_w.max(h);
        icon.fill_where(fill, |x, y| {
            in_pill(x, y, x0, y0, pill_w, h) && x < x0 + fill_w.max(1.0)
        });
    }

    icon
}

/// Whole percentage followed by a percent sign.
fn render_text(p: f64, color: Rgba) -> IconImage {
    let value = p.round() as u32;
    let digits: Vec<usize> = value
        .to_string()
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();

    let glyph_w = GLYPH_COLS * TEXT_SCALE;
    let glyphs = digits.len() as u32 + 1;
    let width = TEXT_PADDING * 2 + glyphs * glyph_w + (glyphs - 1) * GLYPH_GAP;
    let y_offset = (ICON_HEIGHT - GLYPH_ROWS * TEXT_SCALE) / 2;

    let mut icon = IconImage::blank(width);
    let mut x = TEXT_PADDING;
    for digit in digits {
        icon.draw_glyph(&DIGIT_BITMAPS[digit.min(9)], x, y_offset, color);
        x += glyph_w + GLYPH_GAP;
    }
    icon.draw_glyph(&PERCENT_BITMAP, x, y_offset, color);

    icon
}

/// Annulus track with an arc from 12 o'clock, clockwise.
fn render_ring(p: f64, fill: Rgba, track: Rgba) -> IconImage {
    let mut icon = IconImage::blank(RING_WIDTH);

    let (cx, cy) = (RING_WIDTH as f64 / 2.0, ICON_HEIGHT as f64 / 2.0);
    let outer = 8.0;
    let inner = 5.0;
    let in_ring = move |x: f64, y: f64| {
        let d = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
        d <= outer && d >= inner
    };

    icon.fill_where(track, in_ring);

    let sweep = TAU * p / 100.0;
    if sweep > 0.0 {
        icon.fill_where(fill, |x, y| in_ring(x, y) && clock_angle(x - cx, y - cy) < sweep);
    }

    icon
}

/// A filled circle in the fill color.
fn render_dot(fill: Rgba) -> IconImage {
    let mut icon = IconImage::blank(DOT_WIDTH);
    let (cx, cy) = (DOT_WIDTH as f64 / 2.0, ICON_HEIGHT as f64 / 2.0);
    let r = 4.5;
    icon.fill_where(fill, |x, y| (x - cx).powi(2) + (y - cy).powi(2) <= r * r);
    icon
}

fn proportional(total: u32, p: f64) -> u32 {
    ((total as f64) * p / 100.0).round() as u32
}

/// Angle from 12 o'clock, clockwise, in [0, TAU). y grows downward.
fn clock_angle(dx: f64, dy: f64) -> f64 {
    let a = dx.atan2(-dy);
    if a < 0.0 {
        a + TAU
    } else {
        a
    }
}

/// Horizontal pill: rectangle with semicircular ends of radius h/2.
fn in_pill(x: f64, y: f64, x0: f64, y0: f64, w: f64, h: f64) -> bool {
    let r = h / 2.0;
    if x < x0 || x > x0 + w || y < y0 || y > y0 + h {
        return false;
    }
    let cy = y0 + r;
    let cx = if x < x0 + r {
        x0 + r
    } else if x > x0 + w - r {
        x0 + w - r
    } else {
        return true;
    };
    (x - cx).powi(2) + (y - cy).powi(2) <= r * r
}
