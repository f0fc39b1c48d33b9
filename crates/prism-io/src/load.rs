//! Image decoding and validation.
//!
//! Accepts raw image bytes (PNG, JPEG, WebP, GIF) and produces an
//! RGBA [`PixelBuffer`]. Inputs that are empty, oversized, undecodable,
//! or of an unreasonable shape are rejected here so the pipeline only
//! ever sees images within bounds. Dimensions are read from the image
//! header and checked before any pixel data is decoded.

use std::io::Cursor;
use std::path::Path;

use image::{ImageReader, Limits};
use prism_pipeline::PixelBuffer;

/// Largest accepted input, in bytes (50 MiB).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Smallest accepted width or height, in pixels.
pub const MIN_DIMENSION: u32 = 10;

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: u32 = 10_000;

/// Smallest accepted `width / height`.
pub const MIN_ASPECT_RATIO: f64 = 0.1;

/// Largest accepted `width / height`.
pub const MAX_ASPECT_RATIO: f64 = 10.0;

/// Errors that can occur while loading or encoding an image.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The input contained no bytes.
    #[error("file is empty or corrupted")]
    Empty,

    /// The input exceeds [`MAX_FILE_SIZE`].
    #[error("file too large: {size} bytes (maximum {MAX_FILE_SIZE})")]
    TooLarge {
        /// Input size in bytes.
        size: usize,
    },

    /// The image is narrower or shorter than [`MIN_DIMENSION`].
    #[error("image too small: {width}x{height} (minimum {MIN_DIMENSION}x{MIN_DIMENSION})")]
    TooSmall {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// The image is wider or taller than [`MAX_DIMENSION`].
    #[error("image too large: {width}x{height} (maximum {MAX_DIMENSION}x{MAX_DIMENSION})")]
    TooLargeDimensions {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
    },

    /// `width / height` falls outside
    /// [`MIN_ASPECT_RATIO`]`..=`[`MAX_ASPECT_RATIO`].
    #[error("invalid aspect ratio {ratio:.3} for {width}x{height}")]
    AspectRatio {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
        /// `width / height`.
        ratio: f64,
    },

    /// The data is not a supported image or could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Encoding the output PNG failed.
    #[error("PNG encoding failed: {0}")]
    Encode(#[source] image::ImageError),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check decoded dimensions against the size and aspect limits.
///
/// # Errors
///
/// Returns [`LoadError::TooSmall`], [`LoadError::TooLargeDimensions`],
/// or [`LoadError::AspectRatio`] for out-of-bounds shapes.
pub fn validate_dimensions(width: u32, height: u32) -> Result<(), LoadError> {
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(LoadError::TooSmall { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(LoadError::TooLargeDimensions { width, height });
    }
    let ratio = f64::from(width) / f64::from(height);
    if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio) {
        return Err(LoadError::AspectRatio {
            width,
            height,
            ratio,
        });
    }
    Ok(())
}

/// Decode and validate raw image bytes.
///
/// # Errors
///
/// Returns [`LoadError::Empty`] or [`LoadError::TooLarge`] before
/// reading anything, a shape error from [`validate_dimensions`] once the
/// header is read, and [`LoadError::Image`] if the format is unsupported
/// or the data cannot be decoded.
pub fn load_image(bytes: &[u8]) -> Result<PixelBuffer, LoadError> {
    if bytes.is_empty() {
        return Err(LoadError::Empty);
    }
    if bytes.len() > MAX_FILE_SIZE {
        return Err(LoadError::TooLarge { size: bytes.len() });
    }

    let (width, height) = reader(bytes)?.into_dimensions()?;
    validate_dimensions(width, height)?;

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DIMENSION);
    limits.max_image_height = Some(MAX_DIMENSION);
    let mut reader = reader(bytes)?;
    reader.limits(limits);
    let img = reader.decode()?;
    tracing::debug!(
        width = img.width(),
        height = img.height(),
        bytes = bytes.len(),
        "decoded image"
    );
    Ok(PixelBuffer::from(img.to_rgba8()))
}

fn reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, LoadError> {
    Ok(ImageReader::new(Cursor::new(bytes)).with_guessed_format()?)
}

/// Read a file and [`load_image`] its contents.
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be read, otherwise as
/// [`load_image`].
pub fn load_path(path: impl AsRef<Path>) -> Result<PixelBuffer, LoadError> {
    let path = path.as_ref();
    let metadata = std::fs::metadata(path)?;
    if let Ok(size) = usize::try_from(metadata.len())
        && size > MAX_FILE_SIZE
    {
        return Err(LoadError::TooLarge { size });
    }
    let bytes = std::fs::read(path)?;
    load_image(&bytes)
}
