//! Saturation scaling in HSL space.
//!
//! The strength maps linearly to a saturation multiplier:
//! `factor = strength / 50`. Strength 0 removes all color, 50 (the
//! default) leaves the image unchanged, and 100 doubles saturation
//! (capped at fully saturated). The curve is monotonic in strength.

use crate::buffer::PixelBuffer;
use crate::color::{hsl_to_rgb8, rgb8_to_hsl};
use crate::stage::FilterKind;

/// Strength at which the filter is the identity.
pub const NEUTRAL_STRENGTH: f64 = 50.0;

/// Saturation multiplier for a strength (clamped to `0..=100`).
#[must_use]
pub fn saturation_factor(strength: f64) -> f64 {
    FilterKind::Saturation.range().clamp(strength) / NEUTRAL_STRENGTH
}

/// Scale every pixel's saturation by [`saturation_factor`].
#[must_use = "returns the re-saturated image"]
pub fn saturate(input: &PixelBuffer, strength: f64) -> PixelBuffer {
    let factor = saturation_factor(strength);
    input.map_rgb(|rgb| {
        let (h, s, l) = rgb8_to_hsl(rgb);
        hsl_to_rgb8(h, (s * factor).clamp(0.0, 1.0), l)
    })
}
