//! Video inputs, temporary video references and frame decoding.
//!
//! Local files are handed out as opaque [`VideoUrl`] references, much like a
//! browser's object URLs. The [`VideoRegistry`] owns the mapping back to the
//! file and must be told when a reference is no longer needed. The shared
//! demo asset is registered once and survives every release.
//!
//! Frame decoding sits behind the [`FrameSource`] trait. The shipped
//! [`FfmpegFrameSource`] shells out to `ffprobe`/`ffmpeg`.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use image::DynamicImage;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

/// Opaque reference to a locally registered video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoUrl(String);

impl VideoUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Registration {
    path: PathBuf,
    shared: bool,
}

/// Issues and releases [`VideoUrl`]s.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoRegistry {
    next_id: u64,
    live: HashMap<VideoUrl, Registration>,
}

impl VideoRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file owned by the workflow.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> VideoUrl {
        self.insert(path.into(), false)
    }

    /// Registers a long-lived asset that [`release`](Self::release) never drops.
    pub fn register_shared(&mut self, path: impl Into<PathBuf>) -> VideoUrl {
        self.insert(path.into(), true)
    }

    fn insert(&mut self, path: PathBuf, shared: bool) -> VideoUrl {
        self.next_id += 1;
        let url = VideoUrl(format!("blob:watermark-bear/{}", self.next_id));
        self.live.insert(url.clone(), Registration { path, shared });
        url
    }

    pub fn resolve(&self, url: &VideoUrl) -> Option<&Path> {
        self.live.get(url).map(|r| r.path.as_path())
    }

    pub fn is_live(&self, url: &VideoUrl) -> bool {
        self.live.contains_key(url)
    }

    /// Number of live references, shared ones included.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Drops a reference. Returns `false` for shared or unknown ones.
    pub fn release(&mut self, url: &VideoUrl) -> bool {
        match self.live.get(url) {
            Some(registration) if !registration.shared => {
                debug!(%url, "releasing video reference");
                self.live.remove(url);
                true
            }
            _ => false,
        }
    }
}

/// Where the video in the workflow came from.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoInput {
    /// A validated local file.
    File { url: VideoUrl, size: u64 },
    /// A pasted link. Nothing is ever fetched from it.
    Link(Url),
    /// The canned demo asset.
    Demo(VideoUrl),
}

impl VideoInput {
    pub fn is_url_based(&self) -> bool {
        matches!(self, VideoInput::Link(_))
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, VideoInput::Demo(_))
    }

    /// The registered reference, if the input has local media.
    pub fn video_url(&self) -> Option<&VideoUrl> {
        match self {
            VideoInput::File { url, .. } | VideoInput::Demo(url) => Some(url),
            VideoInput::Link(_) => None,
        }
    }

    /// Size in bytes of a local file input.
    pub fn file_size(&self) -> Option<u64> {
        match self {
            VideoInput::File { size, .. } => Some(*size),
            _ => None,
        }
    }
}

/// Metadata read from a video container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    pub duration: Duration,
}

/// Reads metadata and still frames from video files.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Reads container metadata without decoding frames.
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Decodes the frame shown at `at`, at the video's native resolution.
    async fn frame_at(&self, path: &Path, at: Duration) -> Result<DynamicImage>;
}

/// [`FrameSource`] backed by the `ffprobe` and `ffmpeg` executables.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl FfmpegFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit executable paths instead of looking them up on `PATH`.
    pub fn with_binaries(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(path = %path.display(), %stderr, "ffprobe failed");
            return Err(AppError::frame(format!("ffprobe failed: {}", stderr.trim())));
        }

        parse_probe_output(&output.stdout)
    }

    async fn frame_at(&self, path: &Path, at: Duration) -> Result<DynamicImage> {
        let output = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-ss", &format!("{:.3}", at.as_secs_f64()), "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .output()
            .await
            .map_err(|e| AppError::frame(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() || output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::frame(format!("ffmpeg failed: {}", stderr.trim())));
        }

        image::load_from_memory(&output.stdout)
            .map_err(|e| AppError::frame(format!("undecodable frame: {}", e)))
    }
}

/// Extracts [`MediaInfo`] from `ffprobe -print_format json` output.
fn parse_probe_output(stdout: &[u8]) -> Result<MediaInfo> {
    let json: serde_json::Value = serde_json::from_slice(stdout)?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| AppError::frame("no video stream found"))?;

    let width = stream["width"]
        .as_u64()
        .ok_or_else(|| AppError::frame("missing width"))? as u32;
    let height = stream["height"]
        .as_u64()
        .ok_or_else(|| AppError::frame("missing height"))? as u32;

    // Format duration is more reliable than the stream's
    let seconds = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| AppError::frame("missing duration"))?;

    Ok(MediaInfo {
        width,
        height,
        duration: Duration::from_secs_f64(seconds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_drops_owned_but_keeps_shared() {
        let mut registry = VideoRegistry::new();
        let demo = registry.register_shared("sample.mp4");
        let upload = registry.register("/tmp/upload.mp4");
        assert_ne!(demo, upload);
        assert_eq!(registry.live_count(), 2);

        assert!(registry.release(&upload));
        assert!(!registry.release(&upload));
        assert!(!registry.release(&demo));
        assert!(registry.is_live(&demo));
        assert_eq!(registry.resolve(&demo), Some(Path::new("sample.mp4")));
        assert_eq!(registry.resolve(&upload), None);
    }

    #[test]
    fn probe_output_prefers_format_duration() {
        let raw = br#"{
            "streams": [{"width": 1920, "height": 1080, "duration": "12.0"}],
            "format": {"duration": "600.5"}
        }"#;
        let info = parse_probe_output(raw).unwrap();
        assert_eq!(info.width, 1920);
        assert_eq!(info.height, 1080);
        assert_eq!(info.duration, Duration::from_secs_f64(600.5));
    }

    #[test]
    fn probe_output_without_stream_is_an_extraction_error() {
        let err = parse_probe_output(br#"{"streams": [], "format": {}}"#).unwrap_err();
        assert!(err.to_string().contains("frame extraction"));
    }

    #[test]
    fn link_input_has_no_local_media() {
        let link = VideoInput::Link(Url::parse("https://example.com/v.mp4").unwrap());
        assert!(link.is_url_based());
        assert!(link.video_url().is_none());
        assert!(link.file_size().is_none());
    }
}
