//! Posterize: snap each color channel to a reduced set of levels.
//!
//! Strength is inverted: 0 keeps all 256 levels, 100 leaves only two
//! (black and full intensity per channel).

use crate::buffer::{PixelBuffer, clamp_channel};
use crate::stage::FilterKind;

/// Number of output levels per channel for a strength (clamped to
/// `0..=100`): `max(2, floor((100 - s) / 100 * 254) + 2)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn posterize_levels(strength: f64) -> u32 {
    let strength = FilterKind::Posterize.range().clamp(strength);
    let levels = ((100.0 - strength) / 100.0 * 254.0).floor() as u32 + 2;
    levels.max(2)
}

/// Distance between adjacent output levels.
#[must_use]
pub fn posterize_step(levels: u32) -> f64 {
    255.0 / f64::from(levels.max(2) - 1)
}

/// Posterize RGB channels; alpha is copied unchanged.
#[must_use = "returns the posterized image"]
pub fn posterize(input: &PixelBuffer, strength: f64) -> PixelBuffer {
    let step = posterize_step(posterize_levels(strength));
    let snap = |v: u8| clamp_channel((f64::from(v) / step).round() * step);
    input.map_rgb(|[r, g, b]| [snap(r), snap(g), snap(b)])
}
