//! Operator overlay: a centre reference line plus a line at the current
//! horizontal deviation, so the driver can see how far off the hub is.

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Colours and stroke width of the guide lines.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    pub reference_color: [u8; 3],
    pub offset_color: [u8; 3],
    /// Line width in pixels, grown to the right of the nominal column.
    pub thickness: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            reference_color: [0, 255, 0],
            offset_color: [255, 0, 255],
            thickness: 2,
        }
    }
}

/// Copy `frame` and draw the reference and deviation lines on it.
///
/// Columns outside the image are clipped, so any deviation is safe.
pub fn annotate(frame: &RgbImage, deviation: f64, style: &OverlayStyle) -> RgbImage {
    let mut out = frame.clone();
    let center = out.width() as f64 / 2.0;
    draw_vertical_line(&mut out, center, Rgb(style.reference_color), style.thickness);
    // The offset line goes on top so it stays visible when centred.
    draw_vertical_line(
        &mut out,
        center + deviation,
        Rgb(style.offset_color),
        style.thickness,
    );
    out
}

fn draw_vertical_line(img: &mut RgbImage, x: f64, color: Rgb<u8>, thickness: u32) {
    let height = img.height();
    if !x.is_finite() || height == 0 {
        return;
    }
    // Far off-image columns only need to stay off-image; the rect is clipped.
    let limit = f64::from(i32::MAX / 2);
    let left = x.floor().clamp(-limit, limit) as i32;
    let stroke = Rect::at(left, 0).of_size(thickness.max(1), height);
    draw_filled_rect_mut(img, stroke, color);
}
