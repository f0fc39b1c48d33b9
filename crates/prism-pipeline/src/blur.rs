//! Separable Gaussian blur.
//!
//! Strength `0..=100` maps to a kernel radius of `1..=20` pixels
//! (`r = max(1, floor(strength / 100 * 20))`) with `sigma = r / 3`. The
//! 1-D kernel is applied horizontally then vertically to all four
//! channels, alpha included.
//!
//! Samples outside the image are clamped to the nearest edge pixel, so
//! every output pixel is a full weighted average and borders do not
//! darken. The intermediate (horizontal) pass is kept in `f32` and only
//! the final pass is rounded to bytes.

use crate::buffer::{CHANNELS, PixelBuffer, clamp_channel};
use crate::stage::FilterKind;

/// Radius at full strength.
pub const MAX_RADIUS: usize = 20;

/// Kernel radius for a blur strength.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn blur_radius(strength: f64) -> usize {
    let strength = FilterKind::Blur.range().clamp(strength);
    ((strength / 100.0 * MAX_RADIUS as f64).floor() as usize).max(1)
}

/// Generate a normalized 1-D Gaussian kernel of `2 * radius + 1`
/// weights.
///
/// Weight `i` (for offset `x = i - radius`) is `exp(-x² / (2σ²))`,
/// divided by the sum of all weights so the kernel sums to 1. A
/// non-positive or non-finite `sigma` degenerates to a unit impulse.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn gaussian_kernel(radius: usize, sigma: f64) -> Vec<f64> {
    let len = 2 * radius + 1;
    if !(sigma.is_finite() && sigma > 0.0) {
        let mut impulse = vec![0.0; len];
        impulse[radius] = 1.0;
        return impulse;
    }

    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (0..len)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-(x * x) / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Apply the Gaussian blur.
///
/// A `strength` of zero or below returns a bit-identical copy of the
/// input. Otherwise the strength is clamped into `0..=100`.
#[must_use = "returns the blurred image"]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn gaussian_blur(input: &PixelBuffer, strength: f64) -> PixelBuffer {
    if strength.is_nan() || strength <= 0.0 {
        return input.clone();
    }

    let radius = blur_radius(strength);
    let kernel = gaussian_kernel(radius, radius as f64 / 3.0);
    let (w, h) = (input.width() as usize, input.height() as usize);
    if w == 0 || h == 0 {
        return input.clone();
    }
    let src = input.as_raw();

    // Horizontal pass into an unquantized intermediate.
    let mut temp = vec![0.0f32; src.len()];
    for y in 0..h {
        let row = y * w;
        for x in 0..w {
            let mut acc = [0.0f64; CHANNELS];
            for (k, &weight) in kernel.iter().enumerate() {
                let sx = clamp_offset(x, k, radius, w);
                let i = (row + sx) * CHANNELS;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += f64::from(src[i + c]) * weight;
                }
            }
            let o = (row + x) * CHANNELS;
            for (c, a) in acc.iter().enumerate() {
                temp[o + c] = *a as f32;
            }
        }
    }

    // Vertical pass back to bytes.
    let mut out = vec![0u8; src.len()];
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0.0f64; CHANNELS];
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = clamp_offset(y, k, radius, h);
                let i = (sy * w + x) * CHANNELS;
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += f64::from(temp[i + c]) * weight;
                }
            }
            let o = (y * w + x) * CHANNELS;
            for (c, a) in acc.iter().enumerate() {
                out[o + c] = clamp_channel(*a);
            }
        }
    }

    input.with_data(out)
}

/// Sample coordinate for kernel tap `k` around `pos`, clamped to
/// `0..len`.
const fn clamp_offset(pos: usize, k: usize, radius: usize, len: usize) -> usize {
    let shifted = (pos + k).saturating_sub(radius);
    if shifted >= len { len - 1 } else { shifted }
}
