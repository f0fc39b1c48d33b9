//! RGB ↔ HSL conversion shared by the hue and saturation kernels.
//!
//! All components are normalized to `0.0..=1.0`. Hue is circular: `0.0`
//! and `1.0` are the same red.

/// Convert normalized RGB to `(hue, saturation, lightness)`.
///
/// Achromatic colors (`max == min`) yield hue 0 and saturation 0.
#[must_use]
#[allow(clippy::float_cmp, clippy::many_single_char_names)]
pub fn rgb_to_hsl(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if max == r {
        ((g - b) / d + if g < b { 6.0 } else { 0.0 }) / 6.0
    } else if max == g {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// Convert `(hue, saturation, lightness)` back to normalized RGB.
#[must_use]
#[allow(clippy::float_cmp, clippy::many_single_char_names)]
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0f64.mul_add(l, -q);

    (
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    )
}

/// One channel of the HSL → RGB piecewise function.
fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return (q - p).mul_add(6.0 * t, p);
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return (q - p).mul_add((2.0 / 3.0 - t) * 6.0, p);
    }
    p
}

/// Convert an 8-bit RGB triple to HSL.
#[must_use]
pub fn rgb8_to_hsl([r, g, b]: [u8; 3]) -> (f64, f64, f64) {
    rgb_to_hsl(
        f64::from(r) / 255.0,
        f64::from(g) / 255.0,
        f64::from(b) / 255.0,
    )
}

/// Convert HSL to an 8-bit RGB triple, rounding each channel.
#[must_use]
pub fn hsl_to_rgb8(h: f64, s: f64, l: f64) -> [u8; 3] {
    let (r, g, b) = hsl_to_rgb(h, s, l);
    [
        crate::buffer::clamp_channel(r * 255.0),
        crate::buffer::clamp_channel(g * 255.0),
        crate::buffer::clamp_channel(b * 255.0),
    ]
}
