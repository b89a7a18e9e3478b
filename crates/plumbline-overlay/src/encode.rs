//! Overlay encoders.
//!
//! These return the encoded bytes; the caller decides where they go.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

/// JPEG quality used by [`encode_jpeg`].
pub const JPEG_QUALITY: u8 = 95;

/// Errors from overlay encoding.
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// The encoder rejected the image.
    #[error("failed to encode overlay: {0}")]
    Encode(#[from] image::ImageError),
}

/// Encode an overlay as JPEG at [`JPEG_QUALITY`].
///
/// # Errors
///
/// Returns [`OverlayError::Encode`] if the encoder fails, e.g. for an
/// image larger than JPEG allows.
pub fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}

/// Encode an overlay as PNG.
///
/// # Errors
///
/// Returns [`OverlayError::Encode`] if the encoder fails.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OverlayError> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}
