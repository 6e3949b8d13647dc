//! Maps raw processing failures onto user-facing categories.
//!
//! The Gemini service does not hand back stable error codes through every
//! path, so classification falls back to case-insensitive substring checks
//! on the raw message. Checks run in a fixed order and the first match wins.

use tracing::error;

/// User-facing failure categories for the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited or otherwise overloaded.
    ServiceBusy,
    /// The video could not be read or decoded.
    VideoRead,
    /// The model gave up on the selected area.
    AnalysisFailed,
    /// Transport or credential problems talking to the AI.
    Connection,
    /// Anything else.
    Unexpected,
}

/// Ordered match table. Earlier rows take priority.
const RULES: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::ServiceBusy,
        &["rate limiting", "429", "resource_exhausted"],
    ),
    (ErrorCategory::VideoRead, &["frame extraction", "corrupted"]),
    (ErrorCategory::AnalysisFailed, &["non-recoverable"]),
    (ErrorCategory::Connection, &["ai service", "gemini"]),
];

impl ErrorCategory {
    /// Picks the category for a raw error message.
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(category, _)| *category)
            .unwrap_or(ErrorCategory::Unexpected)
    }

    /// The message shown to the user for this category.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorCategory::ServiceBusy => {
                "AI Service Busy: The AI is currently experiencing high demand. Please try again in a few moments."
            }
            ErrorCategory::VideoRead => {
                "Video Processing Error: We were unable to read from your video file. It may be in an unsupported format or corrupted. Please try a different file."
            }
            ErrorCategory::AnalysisFailed => {
                "AI Analysis Failed: The AI model could not process the selected area. This can happen with complex backgrounds. Please try selecting a slightly different area or use another video."
            }
            ErrorCategory::Connection => {
                "AI Connection Error: A problem occurred while communicating with the AI. Please check your network connection and try again."
            }
            ErrorCategory::Unexpected => {
                "An unexpected error occurred during processing. Please try again."
            }
        }
    }
}

/// Classifies a raw failure, logs it, and returns the user-facing message.
///
/// The raw text only goes to the log.
pub fn user_facing(raw: &str) -> &'static str {
    let category = ErrorCategory::classify(raw);
    error!(?category, raw, "processing failed");
    category.user_message()
}
