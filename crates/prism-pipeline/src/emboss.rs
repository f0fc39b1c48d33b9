//! Emboss: a directional 3×3 convolution that makes edges look raised.
//!
//! The convolution response is re-centered around mid-gray (+128) and
//! blended with the original pixel by `strength / 100`. Only interior
//! pixels are convolved; the outermost rows and columns are copied
//! through untouched, as is every alpha value.

use crate::buffer::{CHANNELS, PixelBuffer, clamp_channel};
use crate::stage::FilterKind;

/// Emboss convolution weights, row-major, centered on the target pixel.
pub const EMBOSS_KERNEL: [[f64; 3]; 3] = [[-2.0, -1.0, 0.0], [-1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];

/// Offset added to the convolution response to re-center it on mid-gray.
const EMBOSS_BIAS: f64 = 128.0;

/// Apply the emboss filter.
///
/// `strength` is in `0.0..=100.0` (clamped) and sets the blend factor
/// `f = strength / 100`: `out = original * (1 - f) + convolved * f`.
/// Images narrower or shorter than 3 pixels have no interior and are
/// returned unchanged.
#[must_use = "returns the embossed image"]
pub fn emboss(input: &PixelBuffer, strength: f64) -> PixelBuffer {
    let factor = FilterKind::Emboss.range().clamp(strength) / 100.0;
    let (w, h) = (input.width() as usize, input.height() as usize);
    let src = input.as_raw();
    let mut out = src.to_vec();

    if w < 3 || h < 3 {
        return input.with_data(out);
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut sum = [0.0f64; 3];
            for (ky, row) in EMBOSS_KERNEL.iter().enumerate() {
                for (kx, &weight) in row.iter().enumerate() {
                    let i = input.index(x + kx - 1, y + ky - 1);
                    for (c, acc) in sum.iter_mut().enumerate() {
                        *acc += f64::from(src[i + c]) * weight;
                    }
                }
            }

            let i = y * w * CHANNELS + x * CHANNELS;
            for (c, acc) in sum.iter().enumerate() {
                let original = f64::from(src[i + c]);
                let embossed = acc + EMBOSS_BIAS;
                out[i + c] = clamp_channel(original.mul_add(1.0 - factor, embossed * factor));
            }
        }
    }

    input.with_data(out)
}
