//! Sepia tone: a fixed color matrix blended with the original.

use crate::buffer::{PixelBuffer, clamp_channel};
use crate::stage::FilterKind;

/// Sepia transform, one row per output channel (R, G, B).
pub const SEPIA_MATRIX: [[f64; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// Apply the sepia tone at `strength` (`0..=100`, clamped).
///
/// `f = strength / 100`; each channel becomes
/// `original * (1 - f) + sepia * f`, saturated to `0..=255`. Alpha is
/// unchanged.
#[must_use = "returns the sepia-toned image"]
pub fn sepia_tone(input: &PixelBuffer, strength: f64) -> PixelBuffer {
    let factor = FilterKind::SepiaTone.range().clamp(strength) / 100.0;
    input.map_rgb(|rgb| {
        let [r, g, b] = rgb.map(f64::from);
        let mut out = [0u8; 3];
        for ((dst, row), original) in out.iter_mut().zip(SEPIA_MATRIX.iter()).zip([r, g, b]) {
            let toned = row[2].mul_add(b, row[0].mul_add(r, row[1] * g));
            *dst = clamp_channel(original.mul_add(1.0 - factor, toned * factor));
        }
        out
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mid_gray_golden_value() {
        // 128 * 1.351 = 172.928, 128 * 1.203 = 153.984, 128 * 0.937 = 119.936.
        let img = PixelBuffer::filled(1, 1, [128, 128, 128, 255]).unwrap();
        assert_eq!(
            sepia_tone(&img, 100.0).pixel(0, 0),
            Some([173, 154, 120, 255])
        );
    }

    #[test]
    fn zero_strength_is_identity() {
        let img = PixelBuffer::from_fn(5, 5, |x, y| {
            [
                u8::try_from(x * 50).unwrap(),
                u8::try_from(y * 50).unwrap(),
                7,
                99,
            ]
        })
        .unwrap();
        assert_eq!(sepia_tone(&img, 0.0), img);
    }

    #[test]
    fn white_saturates() {
        let img = PixelBuffer::filled(1, 1, [255, 255, 255, 10]).unwrap();
        // R and G overflow 255 and clamp; B = 255 * 0.937 = 238.935.
        assert_eq!(sepia_tone(&img, 100.0).pixel(0, 0), Some([255, 255, 239, 10]));
    }

    #[test]
    fn half_strength_blends() {
        let img = PixelBuffer::filled(1, 1, [128, 128, 128, 255]).unwrap();
        // (128 + 172.928) / 2 = 150.464, (128 + 153.984) / 2 = 140.992,
        // (128 + 119.936) / 2 = 123.968.
        assert_eq!(sepia_tone(&img, 50.0).pixel(0, 0), Some([150, 141, 124, 255]));
    }

    #[test]
    fn black_stays_black() {
        let img = PixelBuffer::filled(2, 2, [0, 0, 0, 255]).unwrap();
        assert_eq!(sepia_tone(&img, 100.0), img);
    }
}
