//! Watermark Bear Core Library
//!
//! This library provides the core functionality for Watermark Bear, a demo
//! that walks a user through removing a watermark from a video, or placing
//! one on it, with Google's Gemini doing the image work on a single frame.
//!
//! # Overview
//!
//! The library handles:
//!
//! - **Workflow**: the staged remove/add flow as a state machine via [`workflow`]
//! - **Area selection**: percentage-based draw/move/resize gestures via [`selection`]
//! - **Frame work**: frame extraction and marking via [`image_processing`]
//! - **AI Integration**: Gemini detection, inpainting and tips via [`gemini`]
//! - **Failure handling**: retries in [`retry`] and user-facing messages in [`classifier`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`WatermarkBear`] facade:
//!
//! ```ignore
//! use watermark_bear_core::{WatermarkBear, workflow::{LaunchMode, Mode}};
//!
//! let app = WatermarkBear::new()?;
//! let mut session = app.session(LaunchMode::Standard);
//! session.select_action(Mode::Remove)?;
//! session.upload_file("clip.mp4").await?;
//! session.settle().await;
//! session.confirm_area()?;
//! session.settle().await;
//! ```
//!
//! # Module Structure
//!
//! - [`classifier`]: Raw error text to user-facing messages
//! - [`config`]: Configuration loading and management
//! - [`error`]: Error types and result aliases
//! - [`gemini`]: Gemini AI client and the retrying assistant
//! - [`geometry`]: Percentage rectangles and gesture math
//! - [`image_processing`]: Frame extraction, marking and encoding
//! - [`media`]: Video inputs, references and frame decoding
//! - [`preview`]: Result preview rendering
//! - [`retry`]: Backoff for rate-limited calls
//! - [`selection`]: The area editor
//! - [`services`]: AI and audio capability traits
//! - [`upload`]: File and link validation
//! - [`watermark`]: Watermark placement settings
//! - [`workflow`]: The state machine and its async driver

pub mod classifier;
pub mod config;
pub mod error;
pub mod gemini;
pub mod geometry;
pub mod image_processing;
pub mod media;
pub mod preview;
pub mod retry;
pub mod selection;
pub mod services;
pub mod upload;
pub mod watermark;
pub mod workflow;

// Re-export primary types for convenience
pub use config::Config;
pub use error::{AppError, Result, UploadError};
pub use gemini::{GeminiAssistant, GeminiClient};
pub use geometry::Area;
pub use workflow::{Session, Workflow};

use media::FfmpegFrameSource;
use services::SimulatedAudioAnalyzer;
use std::path::PathBuf;
use std::sync::Arc;
use workflow::{LaunchMode, Services};

/// Demo asset used when `WATERMARK_BEAR_DEMO_VIDEO` is not set.
pub const DEFAULT_DEMO_VIDEO: &str = "assets/sample.mp4";

/// Main entry point for the Watermark Bear application.
///
/// This struct wires the configuration to the shipped service
/// implementations and hands out workflow sessions.
///
/// # Example
///
/// ```ignore
/// use watermark_bear_core::WatermarkBear;
///
/// let app = WatermarkBear::new()?;
/// let session = app.session(LaunchMode::Demo);
/// ```
pub struct WatermarkBear {
    config: Config,
    services: Services,
}

impl WatermarkBear {
    /// Creates an instance from the environment (including `.env` files).
    ///
    /// A missing API key is not an error; AI features degrade instead.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the Gemini client
    /// cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    /// Creates an instance with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let assistant = GeminiAssistant::new(&config)?;
        let services = Services {
            ai: Arc::new(assistant),
            frames: Arc::new(FfmpegFrameSource::new()),
            audio: Arc::new(SimulatedAudioAnalyzer::default()),
        };
        Ok(Self { config, services })
    }

    /// Replaces the services, e.g. with fakes in tests.
    pub fn with_services(config: Config, services: Services) -> Self {
        Self { config, services }
    }

    /// Starts a fresh workflow session.
    pub fn session(&self, launch: LaunchMode) -> Session {
        Session::new(Workflow::new(launch, self.demo_video()), self.services.clone())
    }

    pub fn demo_video(&self) -> PathBuf {
        self.config
            .demo_video
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DEMO_VIDEO))
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
