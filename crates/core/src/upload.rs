//! Checks a video must pass before it enters the workflow.

use crate::error::UploadError;
use crate::media::{FrameSource, MediaInfo};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Largest accepted file: 2 GiB.
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Longest accepted video: 30 minutes.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 60);

/// A file the user picked, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub size: u64,
}

impl FileCandidate {
    pub fn new(path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }

    /// Reads the size from disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "cannot stat upload");
            UploadError::Unreadable
        })?;
        if !metadata.is_file() {
            return Err(UploadError::Unreadable);
        }
        Ok(Self::new(path, metadata.len()))
    }
}

/// Rejects files above [`MAX_FILE_SIZE`].
pub fn check_size(size: u64) -> Result<(), UploadError> {
    if size > MAX_FILE_SIZE {
        return Err(UploadError::TooLarge);
    }
    Ok(())
}

/// Rejects videos longer than [`MAX_DURATION`].
pub fn check_duration(duration: Duration) -> Result<(), UploadError> {
    if duration > MAX_DURATION {
        return Err(UploadError::TooLong);
    }
    Ok(())
}

/// Runs the size check, then reads metadata for the duration check.
///
/// Size is checked first so oversized files are never opened.
pub async fn validate(candidate: &FileCandidate, source: &dyn FrameSource) -> Result<MediaInfo, UploadError> {
    check_size(candidate.size)?;

    let info = source.probe(&candidate.path).await.map_err(|e| {
        warn!(path = %candidate.path.display(), error = %e, "cannot read video metadata");
        UploadError::Unreadable
    })?;

    check_duration(info.duration)?;
    Ok(info)
}

/// Parses a pasted link. Only http(s) links are accepted; nothing is fetched.
pub fn parse_link(raw: &str) -> Result<Url, UploadError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UploadError::InvalidLink);
    }
    let url = Url::parse(trimmed).map_err(|_| UploadError::InvalidLink)?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(UploadError::InvalidLink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, Result};
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        duration: Option<Duration>,
        calls: AtomicUsize,
    }

    impl Probe {
        fn new(duration: Option<Duration>) -> Self {
            Self {
                duration,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl FrameSource for Probe {
        async fn probe(&self, _path: &Path) -> Result<MediaInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.duration
                .map(|duration| MediaInfo {
                    width: 640,
                    height: 360,
                    duration,
                })
                .ok_or_else(|| AppError::frame("moov atom not found"))
        }

        async fn frame_at(&self, _path: &Path, _at: Duration) -> Result<DynamicImage> {
            unreachable!("validation never decodes frames")
        }
    }

    #[tokio::test]
    async fn oversized_file_is_rejected_without_probing() {
        let probe = Probe::new(Some(Duration::from_secs(60)));
        let candidate = FileCandidate::new("big.mp4", 3 * 1024 * 1024 * 1024);
        assert_eq!(validate(&candidate, &probe).await, Err(UploadError::TooLarge));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            UploadError::TooLarge.to_string(),
            "File is too large. Please select a video under 2GB."
        );
    }

    #[tokio::test]
    async fn long_and_unreadable_videos_are_rejected() {
        let candidate = FileCandidate::new("clip.mp4", 50 * 1024 * 1024);
        let long = Probe::new(Some(Duration::from_secs(31 * 60)));
        assert_eq!(validate(&candidate, &long).await, Err(UploadError::TooLong));

        let broken = Probe::new(None);
        assert_eq!(validate(&candidate, &broken).await, Err(UploadError::Unreadable));
    }

    #[tokio::test]
    async fn ten_minute_clip_passes() {
        let candidate = FileCandidate::new("clip.mp4", 50 * 1024 * 1024);
        let probe = Probe::new(Some(Duration::from_secs(600)));
        let info = validate(&candidate, &probe).await.unwrap();
        assert_eq!(info.duration, Duration::from_secs(600));
    }

    #[test]
    fn limits_are_inclusive() {
        assert!(check_size(MAX_FILE_SIZE).is_ok());
        assert!(check_size(MAX_FILE_SIZE + 1).is_err());
        assert!(check_duration(MAX_DURATION).is_ok());
    }

    #[test]
    fn links_must_be_web_urls() {
        assert!(parse_link(" https://tiktok.com/@bear/video/1 ").is_ok());
        assert_eq!(parse_link(""), Err(UploadError::InvalidLink));
        assert_eq!(parse_link("not a link"), Err(UploadError::InvalidLink));
        assert_eq!(parse_link("file:///etc/passwd"), Err(UploadError::InvalidLink));
    }

    #[tokio::test]
    async fn missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        assert_eq!(FileCandidate::from_path(&missing).await, Err(UploadError::Unreadable));

        let real = dir.path().join("clip.mp4");
        std::fs::write(&real, b"12345").unwrap();
        let candidate = FileCandidate::from_path(&real).await.unwrap();
        assert_eq!(candidate.size, 5);
    }
}
