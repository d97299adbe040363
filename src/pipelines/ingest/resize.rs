// SPDX-License-Identifier: GPL-3.0-only

//! Client-side image downscaling
//!
//! Large raster images are shrunk before admission: each linear dimension is
//! divided by the configured factor and the result re-encoded in the same
//! format (JPEG at reduced quality, PNG lossless).

use crate::config::{ResizeSettings, mime_essence};
use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

/// Resize failures; callers fall back to the original payload
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResizeError {
    #[error("Unsupported image type: {0}")]
    Unsupported(String),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode image: {0}")]
    Encode(String),
    #[error("Resize task failed: {0}")]
    Task(String),
}

/// Result of a successful resize
#[derive(Debug, Clone)]
pub struct ResizedImage {
    pub data: Bytes,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
}

/// Image resizer used by the ingest pipeline
#[async_trait]
pub trait ImageResizer: Send + Sync {
    /// Downscale an encoded image
    ///
    /// # Arguments
    /// * `data` - Encoded image bytes
    /// * `content_type` - Declared type of `data`
    /// * `settings` - Scale divisor and output quality
    async fn resize(
        &self,
        data: Bytes,
        content_type: &str,
        settings: &ResizeSettings,
    ) -> Result<ResizedImage, ResizeError>;
}

/// Resizer backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct HalvingResizer;

impl HalvingResizer {
    pub fn new() -> Self {
        Self
    }

    fn resize_blocking(
        data: &[u8],
        format: ImageFormat,
        divisor: u32,
        quality: u8,
    ) -> Result<ResizedImage, ResizeError> {
        let image = image::load_from_memory_with_format(data, format)
            .map_err(|e| ResizeError::Decode(e.to_string()))?;

        let width = (image.width() / divisor).max(1);
        let height = (image.height() / divisor).max(1);
        let resized = image.resize_exact(width, height, FilterType::Triangle);

        let (data, content_type) = match format {
            ImageFormat::Png => (Self::encode_png(&resized)?, "image/png"),
            _ => (Self::encode_jpeg(&resized, quality)?, "image/jpeg"),
        };

        debug!(width, height, size = data.len(), "Image resized");

        Ok(ResizedImage {
            data: Bytes::from(data),
            content_type: content_type.to_string(),
            width,
            height,
        })
    }

    fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ResizeError> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
        encoder
            .encode(
                rgb.as_raw(),
                rgb.width(),
                rgb.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| ResizeError::Encode(format!("JPEG encoding failed: {}", e)))?;
        Ok(buffer)
    }

    fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ResizeError> {
        let mut buffer = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| ResizeError::Encode(format!("PNG encoding failed: {}", e)))?;
        Ok(buffer)
    }
}

#[async_trait]
impl ImageResizer for HalvingResizer {
    async fn resize(
        &self,
        data: Bytes,
        content_type: &str,
        settings: &ResizeSettings,
    ) -> Result<ResizedImage, ResizeError> {
        let format = match mime_essence(content_type).as_str() {
            "image/jpeg" | "image/jpg" => ImageFormat::Jpeg,
            "image/png" => ImageFormat::Png,
            other => return Err(ResizeError::Unsupported(other.to_string())),
        };
        let divisor = settings.scale_divisor.max(1);
        let quality = settings.jpeg_quality;

        tokio::task::spawn_blocking(move || Self::resize_blocking(&data, format, divisor, quality))
            .await
            .map_err(|e| ResizeError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn noisy_png(width: u32, height: u32) -> Bytes {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)) as u8;
            Rgb([v, v.wrapping_mul(3), v.wrapping_add(x as u8)])
        });
        let mut buffer = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer)
    }

    #[tokio::test]
    async fn test_png_is_halved() {
        let original = noisy_png(64, 48);
        let resized = HalvingResizer
            .resize(original.clone(), "image/png", &ResizeSettings::default())
            .await
            .unwrap();
        assert_eq!((resized.width, resized.height), (32, 24));
        assert_eq!(resized.content_type, "image/png");
        assert!(resized.data.len() < original.len());
    }

    #[tokio::test]
    async fn test_garbage_fails_to_decode() {
        let result = HalvingResizer
            .resize(Bytes::from_static(b"not a jpeg"), "image/jpeg", &ResizeSettings::default())
            .await;
        assert!(matches!(result, Err(ResizeError::Decode(_))));
    }

    #[tokio::test]
    async fn test_video_is_unsupported() {
        let result = HalvingResizer
            .resize(Bytes::from_static(b"mp4"), "video/mp4", &ResizeSettings::default())
            .await;
        assert!(matches!(result, Err(ResizeError::Unsupported(_))));
    }
}
