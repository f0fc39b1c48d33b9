//! RGBA pixel buffers and source-image identity.
//!
//! [`PixelBuffer`] is the only raster type the filter kernels see. Its
//! fields are private so the length invariant
//! (`data.len() == width * height * 4`) holds for every value that
//! exists. Cloning copies the backing storage; no two buffers ever
//! alias the same bytes.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::types::{Dimensions, PipelineError, RgbaImage};

/// Bytes per pixel (R, G, B, A).
pub const CHANNELS: usize = 4;

/// An owned, row-major RGBA8 image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBuffer", into = "RawBuffer")]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Unvalidated wire form of a [`PixelBuffer`].
#[derive(Serialize, Deserialize)]
struct RawBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl TryFrom<RawBuffer> for PixelBuffer {
    type Error = PipelineError;

    fn try_from(raw: RawBuffer) -> Result<Self, Self::Error> {
        Self::new(raw.width, raw.height, raw.data)
    }
}

impl From<PixelBuffer> for RawBuffer {
    fn from(buffer: PixelBuffer) -> Self {
        Self {
            width: buffer.width,
            height: buffer.height,
            data: buffer.data,
        }
    }
}

/// Required data length for the given dimensions, or `None` if it does
/// not fit in `usize`.
fn expected_len(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(CHANNELS)
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBuffer`] if `data.len()` is not
    /// exactly `width * height * 4`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        match expected_len(width, height) {
            Some(expected) if expected == data.len() => Ok(Self {
                width,
                height,
                data,
            }),
            expected => Err(PipelineError::InvalidBuffer {
                width,
                height,
                expected: expected.unwrap_or(usize::MAX),
                actual: data.len(),
            }),
        }
    }

    /// A buffer where every pixel is `rgba`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBuffer`] if the dimensions are too
    /// large to address.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, PipelineError> {
        let pixels = expected_len(width, height).ok_or(PipelineError::InvalidBuffer {
            width,
            height,
            expected: usize::MAX,
            actual: 0,
        })? / CHANNELS;
        Self::new(width, height, rgba.repeat(pixels))
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBuffer`] if the dimensions are too
    /// large to address.
    pub fn from_fn(
        width: u32,
        height: u32,
        mut f: impl FnMut(u32, u32) -> [u8; 4],
    ) -> Result<Self, PipelineError> {
        let capacity = expected_len(width, height).ok_or(PipelineError::InvalidBuffer {
            width,
            height,
            expected: usize::MAX,
            actual: 0,
        })?;
        let mut data = Vec::with_capacity(capacity);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self::new(width, height, data)
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Width and height together.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// The raw channel bytes, row-major RGBA.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer and return its channel bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The pixel at `(x, y)`, or `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.index(x as usize, y as usize);
        let px = self.data.get(i..i + CHANNELS)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Iterate over pixels as 4-byte slices in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(CHANNELS)
    }

    /// Byte offset of pixel `(x, y)`.
    pub(crate) const fn index(&self, x: usize, y: usize) -> usize {
        (y * self.width as usize + x) * CHANNELS
    }

    /// Replace every pixel's RGB through `f`, keeping alpha, producing a
    /// new buffer. Used by the per-pixel kernels.
    pub(crate) fn map_rgb(&self, mut f: impl FnMut([u8; 3]) -> [u8; 3]) -> Self {
        let mut data = self.data.clone();
        for px in data.chunks_exact_mut(CHANNELS) {
            let [r, g, b] = f([px[0], px[1], px[2]]);
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Build a sibling buffer of identical dimensions from already
    /// validated data. Callers guarantee `data.len() == self.data.len()`.
    pub(crate) const fn with_data(&self, data: Vec<u8>) -> Self {
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buffer: PixelBuffer) -> Self {
        let (width, height) = (buffer.width, buffer.height);
        // Same length invariant as `ImageBuffer::from_raw`.
        Self::from_raw(width, height, buffer.data).unwrap_or_else(|| Self::new(width, height))
    }
}

/// Round and saturate a channel value to `u8`.
///
/// Rounds half away from zero. NaN maps to 0.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn clamp_channel(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 255.0) as u8
}

// ───────────────────────── Source identity ───────────────────────────

/// Identity of a source image: a SipHash of its dimensions and pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceKey(u64);

impl SourceKey {
    /// Fingerprint a pixel buffer.
    #[must_use]
    pub fn of(buffer: &PixelBuffer) -> Self {
        let mut hasher = SipHasher13::new();
        hasher.write_u32(buffer.width);
        hasher.write_u32(buffer.height);
        hasher.write(&buffer.data);
        Self(hasher.finish())
    }
}

/// An input image handed to the pipeline, together with its identity.
///
/// The fingerprint is computed once on construction so the executor can
/// detect a new upload without rehashing on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    buffer: PixelBuffer,
    key: SourceKey,
}

impl SourceImage {
    /// Wrap a decoded image.
    #[must_use]
    pub fn new(buffer: PixelBuffer) -> Self {
        let key = SourceKey::of(&buffer);
        Self { buffer, key }
    }

    /// The source pixels.
    #[must_use]
    pub const fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    /// The source identity.
    #[must_use]
    pub const fn key(&self) -> SourceKey {
        self.key
    }
}

impl From<PixelBuffer> for SourceImage {
    fn from(buffer: PixelBuffer) -> Self {
        Self::new(buffer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_accepts_exact_length() {
        let buf = PixelBuffer::new(2, 3, vec![0; 24]).unwrap();
        assert_eq!(buf.width(), 2);
        assert_eq!(buf.height(), 3);
        assert_eq!(buf.as_raw().len(), 24);
    }

    #[test]
    fn new_rejects_short_data() {
        let result = PixelBuffer::new(2, 2, vec![0; 15]);
        assert!(matches!(
            result,
            Err(PipelineError::InvalidBuffer {
                expected: 16,
                actual: 15,
                ..
            })
        ));
    }

    #[test]
    fn new_rejects_long_data() {
        let result = PixelBuffer::new(1, 1, vec![0; 5]);
        assert!(matches!(result, Err(PipelineError::InvalidBuffer { .. })));
    }

    #[test]
    fn zero_sized_buffer_is_valid() {
        let buf = PixelBuffer::new(0, 7, vec![]).unwrap();
        assert_eq!(buf.pixels().count(), 0);
    }

    #[test]
    fn filled_repeats_pixel() {
        let buf = PixelBuffer::filled(3, 2, [1, 2, 3, 4]).unwrap();
        assert_eq!(buf.pixels().count(), 6);
        assert!(buf.pixels().all(|p| p == [1, 2, 3, 4]));
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn from_fn_is_row_major() {
        let buf = PixelBuffer::from_fn(3, 2, |x, y| [x as u8, y as u8, 0, 255]).unwrap();
        assert_eq!(buf.pixel(2, 0), Some([2, 0, 0, 255]));
        assert_eq!(buf.pixel(0, 1), Some([0, 1, 0, 255]));
        assert_eq!(&buf.as_raw()[12..16], &[0, 1, 0, 255]);
    }

    #[test]
    fn pixel_out_of_bounds_is_none() {
        let buf = PixelBuffer::filled(2, 2, [0, 0, 0, 0]).unwrap();
        assert_eq!(buf.pixel(2, 0), None);
        assert_eq!(buf.pixel(0, 2), None);
    }

    #[test]
    fn clone_does_not_alias() {
        let original = PixelBuffer::filled(2, 2, [10, 20, 30, 40]).unwrap();
        let copy = original.clone();
        let changed = copy.map_rgb(|_| [0, 0, 0]);
        assert_eq!(original.pixel(0, 0), Some([10, 20, 30, 40]));
        assert_eq!(changed.pixel(0, 0), Some([0, 0, 0, 40]));
        assert_ne!(original.as_raw().as_ptr(), copy.as_raw().as_ptr());
    }

    #[test]
    fn rgba_image_conversion_preserves_pixels() {
        let img = RgbaImage::from_pixel(4, 3, image::Rgba([9, 8, 7, 6]));
        let buf = PixelBuffer::from(img.clone());
        assert_eq!(buf.dimensions(), Dimensions { width: 4, height: 3 });
        let back = RgbaImage::from(buf);
        assert_eq!(img, back);
    }

    #[test]
    fn clamp_channel_rounds_and_saturates() {
        assert_eq!(clamp_channel(173.95), 174);
        assert_eq!(clamp_channel(-4.0), 0);
        assert_eq!(clamp_channel(300.0), 255);
        assert_eq!(clamp_channel(127.5), 128);
        assert_eq!(clamp_channel(f64::NAN), 0);
    }

    #[test]
    fn source_key_tracks_content() {
        let a = PixelBuffer::filled(2, 2, [1, 2, 3, 4]).unwrap();
        let b = PixelBuffer::filled(2, 2, [1, 2, 3, 5]).unwrap();
        assert_eq!(SourceKey::of(&a), SourceKey::of(&a.clone()));
        assert_ne!(SourceKey::of(&a), SourceKey::of(&b));
    }

    #[test]
    fn source_key_distinguishes_shape() {
        let wide = PixelBuffer::filled(4, 1, [0, 0, 0, 0]).unwrap();
        let tall = PixelBuffer::filled(1, 4, [0, 0, 0, 0]).unwrap();
        assert_ne!(SourceKey::of(&wide), SourceKey::of(&tall));
    }

    #[test]
    fn deserialize_rejects_invalid_length() {
        let json = r#"{"width":2,"height":2,"data":[0,0,0]}"#;
        let result: Result<PixelBuffer, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn serde_round_trip() {
        let buf = PixelBuffer::filled(2, 1, [1, 2, 3, 4]).unwrap();
        let json = serde_json::to_string(&buf).unwrap();
        let back: PixelBuffer = serde_json::from_str(&json).unwrap();
        assert_eq!(buf, back);
    }
}
