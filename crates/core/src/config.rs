use crate::error::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// `None` disables every AI feature instead of failing startup.
    pub gemini_api_key: Option<String>,
    pub model_name: String,
    pub image_model_name: String,
    pub demo_video: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let api_key = env::var("GEMINI_API_KEY")
            .or_else(|_| env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let mut builder = Config::builder()
            .with_model(env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()))
            .with_image_model(
                env::var("GEMINI_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string()),
            );
        if let Some(key) = api_key {
            builder = builder.with_api_key(key);
        }
        if let Ok(path) = env::var("WATERMARK_BEAR_DEMO_VIDEO") {
            builder = builder.with_demo_video(path);
        }
        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn has_api_key(&self) -> bool {
        self.gemini_api_key.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    api_key: Option<String>,
    model_name: Option<String>,
    image_model_name: Option<String>,
    demo_video: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = Some(model.into());
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model_name = Some(model.into());
        self
    }

    pub fn with_demo_video(mut self, path: impl Into<PathBuf>) -> Self {
        self.demo_video = Some(path.into());
        self
    }

    pub fn build(self) -> Result<Config> {
        let model_name = self.model_name.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let image_model_name = self
            .image_model_name
            .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string());

        if model_name.trim().is_empty() || image_model_name.trim().is_empty() {
            return Err(AppError::config("model names must not be empty"));
        }

        Ok(Config {
            gemini_api_key: self.api_key.filter(|key| !key.trim().is_empty()),
            model_name,
            image_model_name,
            demo_video: self.demo_video,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_models() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.model_name, DEFAULT_MODEL);
        assert_eq!(config.image_model_name, DEFAULT_IMAGE_MODEL);
        assert!(!config.has_api_key());
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = Config::builder().with_api_key("   ").build().unwrap();
        assert!(!config.has_api_key());
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = Config::builder().with_model("").build().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
