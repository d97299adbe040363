// SPDX-License-Identifier: GPL-3.0-only

//! Still photo encoding
//!
//! Converts a grabbed RGBA frame to JPEG. Encoding is CPU-bound and runs on
//! the blocking pool so the live stream keeps flowing.

use crate::backends::camera::CameraFrame;
use crate::constants::capture::STILL_CONTENT_TYPE;
use crate::errors::CaptureError;
use bytes::Bytes;
use image::{DynamicImage, RgbImage, RgbaImage};
use tracing::{debug, info};

/// Encoded still ready to join the capture roll
#[derive(Debug, Clone)]
pub struct EncodedStill {
    pub data: Bytes,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// Still encoder
#[derive(Debug, Clone, Copy)]
pub struct StillEncoder {
    quality: u8,
}

impl StillEncoder {
    /// Create an encoder with the given JPEG quality (1-100)
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a frame asynchronously
    ///
    /// # Arguments
    /// * `frame` - RGBA frame grabbed from the live stream
    ///
    /// # Returns
    /// * `Ok(EncodedStill)` - JPEG data
    /// * `Err(CaptureError::EncodingFailed)` - Malformed frame or encoder error
    pub async fn encode(&self, frame: CameraFrame) -> Result<EncodedStill, CaptureError> {
        info!(
            width = frame.width,
            height = frame.height,
            quality = self.quality,
            "Starting still encoding"
        );

        let quality = self.quality;
        tokio::task::spawn_blocking(move || {
            let rgb = Self::to_rgb(&frame)?;
            let data = Self::encode_jpeg(&rgb, quality)?;
            debug!(size = data.len(), "Still encoding complete");
            Ok(EncodedStill {
                data: Bytes::from(data),
                content_type: STILL_CONTENT_TYPE,
                width: frame.width,
                height: frame.height,
            })
        })
        .await
        .map_err(|e| CaptureError::EncodingFailed(format!("Encoding task error: {}", e)))?
    }

    fn to_rgb(frame: &CameraFrame) -> Result<RgbImage, CaptureError> {
        if frame.data.len() != frame.expected_len() {
            return Err(CaptureError::EncodingFailed(format!(
                "frame is {} bytes, expected {} for {}x{}",
                frame.data.len(),
                frame.expected_len(),
                frame.width,
                frame.height
            )));
        }
        let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
            .ok_or_else(|| CaptureError::EncodingFailed("invalid frame buffer".to_string()))?;
        Ok(DynamicImage::ImageRgba8(rgba).to_rgb8())
    }

    fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, CaptureError> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);

        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);

        encoder
            .encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CaptureError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

        Ok(buffer)
    }
}
