//! Image payload encoding

use crate::error::{InferenceError, Result};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, RgbImage};

pub const JPEG_QUALITY: u8 = 90;

/// Encode an RGB image as a JPEG request body
pub fn encode_jpeg(image: &RgbImage) -> Result<Bytes> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(InferenceError::EmptyImage { width, height });
    }

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY).encode(
        image.as_raw(),
        width,
        height,
        ColorType::Rgb8,
    )?;
    Ok(Bytes::from(buffer))
}
