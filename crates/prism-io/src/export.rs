//! PNG encoding and export naming.

use image::ImageEncoder;
use prism_pipeline::PixelBuffer;

use crate::load::LoadError;

/// Stem used when the original file name is unknown.
const FALLBACK_STEM: &str = "image";

/// Encode a buffer as an RGBA PNG.
///
/// # Errors
///
/// Returns [`LoadError::Encode`] if PNG encoding fails.
pub fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, LoadError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            buffer.as_raw(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(LoadError::Encode)?;
    Ok(png_bytes)
}

/// Download name for an edited image: `"<stem>-edited.png"`.
///
/// The stem is `original` up to its last `.`; a name with no extension
/// (or only a leading dot) is used whole. With no usable name the stem
/// is `"image"`.
#[must_use]
pub fn export_filename(original: Option<&str>) -> String {
    let stem = match original {
        Some(name) if !name.is_empty() => match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        },
        _ => FALLBACK_STEM,
    };
    format!("{stem}-edited.png")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strips_last_extension() {
        assert_eq!(export_filename(Some("photo.jpg")), "photo-edited.png");
        assert_eq!(
            export_filename(Some("archive.tar.gz")),
            "archive.tar-edited.png"
        );
    }

    #[test]
    fn keeps_names_without_extension() {
        assert_eq!(export_filename(Some("scan")), "scan-edited.png");
        assert_eq!(export_filename(Some(".hidden")), ".hidden-edited.png");
    }

    #[test]
    fn falls_back_to_image() {
        assert_eq!(export_filename(None), "image-edited.png");
        assert_eq!(export_filename(Some("")), "image-edited.png");
    }

    #[test]
    fn empty_buffer_fails_to_encode() {
        let empty = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        let err = encode_png(&empty).unwrap_err();
        assert!(matches!(err, LoadError::Encode(_)));
        assert!(err.to_string().starts_with("PNG encoding failed"));
    }

    #[test]
    fn encoded_png_decodes_to_same_pixels() {
        let buffer = PixelBuffer::from_fn(16, 12, |x, y| {
            [
                u8::try_from(x * 10).unwrap(),
                u8::try_from(y * 10).unwrap(),
                33,
                u8::try_from(100 + x).unwrap(),
            ]
        })
        .unwrap();
        let bytes = encode_png(&buffer).unwrap();
        assert_eq!(crate::load_image(&bytes).unwrap(), buffer);
    }
}
