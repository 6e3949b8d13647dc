//! Error types for the watermark-bear-core library.
//!
//! This module provides granular error variants for different failure modes.
//! The `Display` text of each variant is the raw message that the
//! [`classifier`](crate::classifier) inspects, so the wording matters: it is
//! what maps a failure onto a user-facing category.

use thiserror::Error;

/// Errors that can occur within the watermark-bear-core library.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors (invalid values, bad URLs).
    #[error("Configuration error: {0}")]
    Config(String),

    /// The AI credential is missing, so the feature is disabled.
    #[error("Gemini AI service is not available.")]
    ServiceUnavailable,

    /// A still frame could not be decoded from the video.
    #[error("Failed to load video for frame extraction: {0}")]
    FrameExtraction(String),

    /// Image decoding, drawing or encoding failed.
    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    /// The selection area is empty or has zero dimensions.
    #[error("Selection area is empty or invalid")]
    EmptySelection,

    /// The Gemini API rejected or failed a request.
    ///
    /// `code` and `status` are filled when the failure carried structured
    /// fields; `message` is the raw text in every case.
    #[error("Gemini API error: {message}")]
    GeminiApi {
        code: Option<u16>,
        status: Option<String>,
        message: String,
    },

    /// Every attempt hit the rate limiter.
    #[error("AI service failed after {0} retries due to rate limiting.")]
    RateLimited(u32),

    /// A workflow action was issued on a screen that does not accept it.
    #[error("Action `{action}` is not available on screen {screen}")]
    InvalidTransition {
        action: &'static str,
        screen: &'static str,
    },

    /// The chosen video was rejected before entering the workflow.
    #[error(transparent)]
    Upload(#[from] UploadError),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An unclassified error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a frame extraction error with the given message.
    pub fn frame(msg: impl Into<String>) -> Self {
        Self::FrameExtraction(msg.into())
    }

    /// Creates an image processing error with the given message.
    pub fn image(msg: impl Into<String>) -> Self {
        Self::ImageProcessing(msg.into())
    }

    /// Creates a Gemini API error without structured status fields.
    pub fn gemini(msg: impl Into<String>) -> Self {
        Self::GeminiApi {
            code: None,
            status: None,
            message: msg.into(),
        }
    }

    /// Creates a Gemini API error carrying an HTTP-style status code.
    pub fn gemini_status(code: u16, status: Option<&str>, msg: impl Into<String>) -> Self {
        Self::GeminiApi {
            code: Some(code),
            status: status.map(str::to_string),
            message: msg.into(),
        }
    }
}

/// Reasons a video is refused at the upload step.
///
/// The `Display` strings are shown to the user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("File is too large. Please select a video under 2GB.")]
    TooLarge,

    #[error("Video is too long. Please select a video under 30 minutes.")]
    TooLong,

    #[error("Unsupported file format or corrupted video. Please try a different file.")]
    Unreadable,

    #[error("Please enter a valid video link.")]
    InvalidLink,
}

/// A convenient alias for Result with [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
