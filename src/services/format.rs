//! Image codec service
//!
//! Decoding of fetched sources and lossless PNG encoding of composites,
//! kept apart from the pixel math so both can be tested independently.

use crate::error::{ComposeError, ImageSide, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Service for decoding sources and encoding composites
pub struct ImageCodec;

impl ImageCodec {
    /// Decode fetched bytes into an image with an alpha channel
    ///
    /// # Errors
    /// - `ComposeError::Decode` naming the side when the bytes are not a
    ///   supported raster format
    pub fn decode_rgba(bytes: &[u8], side: ImageSide) -> Result<RgbaImage> {
        if bytes.is_empty() {
            return Err(ComposeError::decode(format!("{} image is empty", side)));
        }

        let image = image::load_from_memory(bytes).map_err(|e| {
            ComposeError::decode_stage_error(
                "decode",
                &format!("{} image is not a supported raster format: {}", side, e),
                Some(&format!("{} bytes", bytes.len())),
            )
        })?;

        log::debug!(
            "Decoded {} image: {}x{} {:?}",
            side,
            image.width(),
            image.height(),
            image.color()
        );

        // Forces an alpha channel regardless of the source color type
        Ok(image.to_rgba8())
    }

    /// Encode an RGBA image as PNG without lossy steps
    ///
    /// Uses fast deflate and no row filtering so encoding stays cheap; PNG
    /// itself never subsamples or quantizes.
    ///
    /// # Errors
    /// - Encoder failure
    pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, FilterType::NoFilter);
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(|e| ComposeError::decode(format!("Failed to encode PNG: {}", e)))?;

        Ok(buffer)
    }

    /// Decode a PNG produced by [`ImageCodec::encode_png`]; used by tests and the CLI
    ///
    /// # Errors
    /// - Bytes are not a decodable image
    pub fn decode_any(bytes: &[u8]) -> Result<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }
}
