//! Hue rotation in HSL space.

use crate::buffer::PixelBuffer;
use crate::color::{hsl_to_rgb8, rgb8_to_hsl};
use crate::stage::FilterKind;

/// Rotate every pixel's hue by `degrees` (clamped to `0..=360`).
///
/// Each pixel is converted to HSL, its hue shifted by
/// `(degrees mod 360) / 360` (wrapping at 1), and converted back.
/// Saturation, lightness, and alpha are preserved; grays stay gray.
#[must_use = "returns the hue-rotated image"]
pub fn rotate_hue(input: &PixelBuffer, degrees: f64) -> PixelBuffer {
    let shift = FilterKind::HueRotation.range().clamp(degrees) % 360.0 / 360.0;
    input.map_rgb(|rgb| {
        let (h, s, l) = rgb8_to_hsl(rgb);
        hsl_to_rgb8((h + shift) % 1.0, s, l)
    })
}
