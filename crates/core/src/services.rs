//! Capabilities the workflow depends on but does not implement itself.
//!
//! [`WatermarkAi`] is the generative-AI service (see [`crate::gemini`] for
//! the real client), and [`AudioAnalyzer`] stands in for an audio watermark
//! detector that does not exist yet.

use crate::error::Result;
use crate::geometry::Area;
use crate::media::VideoInput;
use async_trait::async_trait;
use std::time::Duration;

/// Returned by `tips` when no credential is configured.
pub const TIPS_UNAVAILABLE: &str = "Gemini AI service is not available.";

/// Shown in place of tips when fetching them failed.
pub const TIPS_FAILED: &str = "Could not fetch AI tips at the moment. Please try again later.";

/// The generative-AI operations used by the workflow.
#[async_trait]
pub trait WatermarkAi: Send + Sync {
    /// Free-text tips, entries separated by a blank line.
    async fn tips(&self) -> Result<String>;

    /// Locates a watermark on a JPEG still. `None` means nothing was found.
    async fn detect_area(&self, frame_jpeg: &[u8]) -> Result<Option<Area>>;

    /// Inpaints the region outlined on a marked JPEG still.
    ///
    /// `None` means the call succeeded but no image came back.
    async fn inpaint(&self, marked_jpeg: &[u8]) -> Result<Option<Vec<u8>>>;
}

/// Reports whether a video carries an audio watermark.
#[async_trait]
pub trait AudioAnalyzer: Send + Sync {
    async fn analyze(&self, input: &VideoInput) -> Result<bool>;
}

/// Placeholder analyzer: after a fixed delay, reports odd-sized files as
/// watermarked. Link and demo inputs are never watermarked.
#[derive(Debug, Clone)]
pub struct SimulatedAudioAnalyzer {
    delay: Duration,
}

impl Default for SimulatedAudioAnalyzer {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(1800),
        }
    }
}

impl SimulatedAudioAnalyzer {
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl AudioAnalyzer for SimulatedAudioAnalyzer {
    async fn analyze(&self, input: &VideoInput) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        Ok(input.file_size().is_some_and(|size| size % 2 != 0))
    }
}

/// Splits tip text on blank lines, dropping empty entries.
pub fn split_tips(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .split("\n\n")
        .map(str::trim)
        .filter(|tip| !tip.is_empty())
        .map(str::to_string)
        .collect()
}
