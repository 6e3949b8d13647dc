//! Still-frame extraction, marking and encoding.
//!
//! The removal pipeline works on one frame: it is pulled out of the video
//! near the start, the watermark area is outlined in bright red, and that
//! marked frame is what the inpainting model receives.
//!
//! # Coordinate Mapping
//!
//! Areas are stored as percentages of the frame. They are scaled by the
//! decoded surface's own width and height here, so the marker lands in the
//! same place whatever the video's native resolution.

use crate::error::{AppError, Result};
use crate::geometry::Area;
use crate::media::FrameSource;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::time::Duration;

/// Timestamp the still frame is taken from.
pub const FRAME_TIMESTAMP: Duration = Duration::from_millis(100);

/// JPEG quality for extracted frames.
pub const FRAME_QUALITY: u8 = 80;

/// JPEG quality for marked frames.
pub const MARKED_QUALITY: u8 = 90;

/// Outline colour burned into marked frames.
pub const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Image processing utilities for the removal pipeline.
pub struct ImageProcessor;

impl ImageProcessor {
    /// Decodes the frame at [`FRAME_TIMESTAMP`] and encodes it as JPEG.
    ///
    /// # Errors
    ///
    /// Any decoding failure is reported as [`AppError::FrameExtraction`].
    pub async fn extract_frame(source: &dyn FrameSource, video: &Path) -> Result<Vec<u8>> {
        let frame = source
            .frame_at(video, FRAME_TIMESTAMP)
            .await
            .map_err(|e| match e {
                AppError::FrameExtraction(_) => e,
                other => AppError::frame(other.to_string()),
            })?;
        Self::encode_jpeg(&frame, FRAME_QUALITY)
    }

    /// Burns an outline of `area` into a JPEG still and re-encodes it.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::EmptySelection`] if the area has no extent, and
    /// [`AppError::ImageProcessing`] if the still cannot be decoded.
    pub fn mark_area(frame_jpeg: &[u8], area: &Area) -> Result<Vec<u8>> {
        if area.width <= 0.0 || area.height <= 0.0 {
            return Err(AppError::EmptySelection);
        }

        let mut surface = image::load_from_memory(frame_jpeg)
            .map_err(|e| AppError::image(format!("Failed to load image for drawing: {}", e)))?
            .to_rgb8();

        let stroke = Self::stroke_width(surface.width(), surface.height());
        let (x, y, w, h) = area.to_pixels(surface.width(), surface.height());
        stroke_rect(&mut surface, x, y, w, h, stroke, MARKER_COLOR);

        Self::encode_jpeg(&DynamicImage::ImageRgb8(surface), MARKED_QUALITY)
    }

    /// Marker stroke width in pixels: half a percent of the smaller side,
    /// never thinner than 2px.
    pub fn stroke_width(width: u32, height: u32) -> f64 {
        (f64::from(width.min(height)) * 0.005).max(2.0)
    }

    /// Encodes an image as JPEG at the given quality (1-100).
    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let mut buffer: Vec<u8> = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        image
            .to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|e| AppError::image(format!("Failed to encode image: {}", e)))?;
        Ok(buffer)
    }

    /// Encodes raw bytes as standard Base64 for inline API payloads.
    pub fn to_base64(bytes: &[u8]) -> String {
        BASE64.encode(bytes)
    }

    /// Decodes a Base64 payload returned by the API.
    pub fn from_base64(data: &str) -> Result<Vec<u8>> {
        BASE64
            .decode(data.trim())
            .map_err(|e| AppError::image(format!("Invalid base64 image data: {}", e)))
    }
}

/// Strokes a rectangle outline centred on its edges, clipped to the image.
fn stroke_rect(img: &mut RgbImage, x: f64, y: f64, w: f64, h: f64, stroke: f64, color: Rgb<u8>) {
    let half = stroke / 2.0;
    let (iw, ih) = (f64::from(img.width()), f64::from(img.height()));

    let mut fill = |x0: f64, y0: f64, x1: f64, y1: f64| {
        let px0 = x0.max(0.0).round() as u32;
        let py0 = y0.max(0.0).round() as u32;
        let px1 = x1.min(iw).round() as u32;
        let py1 = y1.min(ih).round() as u32;
        for py in py0..py1 {
            for px in px0..px1 {
                img.put_pixel(px, py, color);
            }
        }
    };

    // top, bottom, left, right bands
    fill(x - half, y - half, x + w + half, y + half);
    fill(x - half, y + h - half, x + w + half, y + h + half);
    fill(x - half, y - half, x + half, y + h + half);
    fill(x + w - half, y - half, x + w + half, y + h + half);
}
