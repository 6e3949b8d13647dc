use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::Area;
use crate::image_processing::ImageProcessor;
use crate::retry::{RetryPolicy, with_retry};
use crate::services::{TIPS_UNAVAILABLE, WatermarkAi};
use async_trait::async_trait;
use gemini_rust::{Blob, ClientError, Content, Gemini, GenerationConfig, Message, Part, Role};
use serde_json::json;
use tracing::{debug, warn};

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";

const TIPS_PROMPT: &str = "Give 3 short, practical and distinct tips for video creators on using watermarks well, or on avoiding the need to remove them. Answer with plain text only, separating the tips with a blank line.";

const DETECT_PROMPT: &str = "This image is a single frame taken from a video. Find the region most likely to contain a watermark, logo or persistent on-screen text and return its bounding box as percentages of the frame size. If there is no watermark, return null.";

const INPAINT_PROMPT: &str = "Remove everything inside the bright red rectangle in this image and fill that region so it blends seamlessly with its surroundings. Remove the red rectangle itself as well. Do not add any text or other elements.";

pub struct GeminiClient {
    text: Gemini,
    image: Gemini,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .as_deref()
            .ok_or(AppError::ServiceUnavailable)?;

        Ok(Self {
            text: Self::model_client(api_key, &config.model_name)?,
            image: Self::model_client(api_key, &config.image_model_name)?,
        })
    }

    fn model_client(api_key: &str, model: &str) -> Result<Gemini> {
        // Explicit base URL avoids the BadScheme error from the default one
        let base_url = url::Url::parse(BASE_URL)
            .map_err(|e| AppError::config(format!("Invalid base URL: {}", e)))?;

        let model_name = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        let model_url = format!("{}{}", BASE_URL, model_name);

        Gemini::with_model_and_base_url(api_key, model_url, base_url)
            .map_err(|e| AppError::config(format!("Failed to create Gemini client: {}", e)))
    }

    /// Sends a text-only prompt and returns the first text part.
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let message = user_message(vec![text_part(prompt)]);

        let response = self
            .text
            .generate_content()
            .with_messages(vec![message])
            .execute()
            .await
            .map_err(map_gemini_error)?;

        first_text(response.candidates.first().and_then(|c| c.content.parts.as_ref()))
            .ok_or_else(|| AppError::gemini("No text response received from Gemini"))
    }

    /// Asks for the watermark bounding box on a base64 JPEG still.
    pub async fn detect_area(&self, base64_image: &str) -> Result<Option<Area>> {
        let message = user_message(vec![text_part(DETECT_PROMPT), jpeg_part(base64_image)]);

        let schema = json!({
            "type": "OBJECT",
            "nullable": true,
            "properties": {
                "x": { "type": "NUMBER", "description": "Top-left x as a percentage (0-100)." },
                "y": { "type": "NUMBER", "description": "Top-left y as a percentage (0-100)." },
                "width": { "type": "NUMBER", "description": "Box width as a percentage (0-100)." },
                "height": { "type": "NUMBER", "description": "Box height as a percentage (0-100)." }
            }
        });

        let response = self
            .text
            .generate_content()
            .with_messages(vec![message])
            .with_response_mime_type("application/json")
            .with_response_schema(schema)
            .execute()
            .await
            .map_err(map_gemini_error)?;

        let text = first_text(response.candidates.first().and_then(|c| c.content.parts.as_ref()));
        Ok(text.and_then(|t| parse_area(&t)))
    }

    /// Sends a marked base64 JPEG to the image model and returns the first
    /// inline image it answers with, still base64 encoded.
    pub async fn inpaint(&self, base64_image: &str) -> Result<Option<String>> {
        let message = user_message(vec![jpeg_part(base64_image), text_part(INPAINT_PROMPT)]);

        let response = self
            .image
            .generate_content()
            .with_messages(vec![message])
            .with_generation_config(inpaint_config())
            .execute()
            .await
            .map_err(map_gemini_error)?;

        let parts = response
            .candidates
            .first()
            .and_then(|c| c.content.parts.as_ref());

        Ok(parts.and_then(|parts| {
            parts.iter().find_map(|part| match part {
                Part::InlineData { inline_data, .. } => Some(inline_data.data.clone()),
                _ => None,
            })
        }))
    }
}

/// Asks the image model for an image, allowing text next to it.
fn inpaint_config() -> GenerationConfig {
    GenerationConfig {
        response_modalities: Some(vec!["IMAGE".to_string(), "TEXT".to_string()]),
        ..Default::default()
    }
}

/// Converts a client failure, keeping the HTTP status for the retry check.
///
/// Error bodies look like `{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED", ...}}`.
fn map_gemini_error(error: ClientError) -> AppError {
    match &error {
        ClientError::BadResponse { code, description } => {
            let status = description.as_deref().and_then(error_status);
            AppError::gemini_status(*code, status.as_deref(), format!("API request failed: {}", error))
        }
        _ => AppError::gemini(format!("API request failed: {:?}", error)),
    }
}

fn error_status(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("status")?
        .as_str()
        .map(str::to_string)
}

fn text_part(text: &str) -> Part {
    Part::Text {
        text: text.to_string(),
        thought: None,
        thought_signature: None,
    }
}

fn jpeg_part(base64_image: &str) -> Part {
    Part::InlineData {
        inline_data: Blob {
            mime_type: "image/jpeg".to_string(),
            data: base64_image.to_string(),
        },
        media_resolution: None,
    }
}

fn user_message(parts: Vec<Part>) -> Message {
    Message {
        role: Role::User,
        content: Content {
            role: Some(Role::User),
            parts: Some(parts),
        },
    }
}

fn first_text(parts: Option<&Vec<Part>>) -> Option<String> {
    parts?.iter().find_map(|part| match part {
        Part::Text { text, .. } => Some(text.clone()),
        _ => None,
    })
}

/// Reads a bounding box out of a JSON reply.
///
/// Anything other than an object with four numeric fields counts as "no
/// watermark".
pub fn parse_area(reply: &str) -> Option<Area> {
    let body = reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if body.is_empty() || body.eq_ignore_ascii_case("null") {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "detection reply is not JSON");
            return None;
        }
    };

    let field = |name: &str| value.get(name).and_then(serde_json::Value::as_f64);
    match (field("x"), field("y"), field("width"), field("height")) {
        (Some(x), Some(y), Some(width), Some(height)) => Some(Area::new(x, y, width, height)),
        _ => {
            debug!(%body, "detection reply is missing fields");
            None
        }
    }
}

/// [`WatermarkAi`] backed by Gemini, with retries and credential checks.
///
/// Without an API key, tips degrade to a fixed message and the image
/// operations fail fast with [`AppError::ServiceUnavailable`].
pub struct GeminiAssistant {
    client: Option<GeminiClient>,
    retry: RetryPolicy,
}

impl GeminiAssistant {
    pub fn new(config: &Config) -> Result<Self> {
        let client = match GeminiClient::new(config) {
            Ok(client) => Some(client),
            Err(AppError::ServiceUnavailable) => {
                warn!("GEMINI_API_KEY is not set, AI features are disabled");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            client,
            retry: RetryPolicy::default(),
        })
    }

    /// An assistant with every AI feature disabled.
    pub fn unavailable() -> Self {
        Self {
            client: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&GeminiClient> {
        self.client.as_ref().ok_or(AppError::ServiceUnavailable)
    }
}

#[async_trait]
impl WatermarkAi for GeminiAssistant {
    async fn tips(&self) -> Result<String> {
        let Some(client) = self.client.as_ref() else {
            return Ok(TIPS_UNAVAILABLE.to_string());
        };
        with_retry(&self.retry, || client.generate_text(TIPS_PROMPT)).await
    }

    async fn detect_area(&self, frame_jpeg: &[u8]) -> Result<Option<Area>> {
        let client = self.client()?;
        let encoded = ImageProcessor::to_base64(frame_jpeg);
        with_retry(&self.retry, || client.detect_area(&encoded)).await
    }

    async fn inpaint(&self, marked_jpeg: &[u8]) -> Result<Option<Vec<u8>>> {
        let client = self.client()?;
        let encoded = ImageProcessor::to_base64(marked_jpeg);
        let image = with_retry(&self.retry, || client.inpaint(&encoded)).await?;
        image.map(|data| ImageProcessor::from_base64(&data)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::is_rate_limited;

    #[test]
    fn parses_plain_and_fenced_json() {
        let area = Area::new(75.0, 80.0, 20.0, 15.0);
        assert_eq!(parse_area(r#"{"x":75,"y":80,"width":20,"height":15}"#), Some(area));
        assert_eq!(
            parse_area("```json\n{\"x\":75,\"y\":80,\"width\":20,\"height\":15}\n```"),
            Some(area)
        );
    }

    #[test]
    fn null_partial_and_garbage_mean_no_watermark() {
        assert_eq!(parse_area("null"), None);
        assert_eq!(parse_area("  NULL "), None);
        assert_eq!(parse_area(""), None);
        assert_eq!(parse_area(r#"{"x":1,"y":2,"width":3}"#), None);
        assert_eq!(parse_area(r#"{"x":"1","y":2,"width":3,"height":4}"#), None);
        assert_eq!(parse_area("the watermark is at the bottom"), None);
    }

    #[test]
    fn bad_response_keeps_code_and_status() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        let error = map_gemini_error(ClientError::BadResponse {
            code: 429,
            description: Some(body.to_string()),
        });
        match &error {
            AppError::GeminiApi { code, status, message } => {
                assert_eq!(*code, Some(429));
                assert_eq!(status.as_deref(), Some("RESOURCE_EXHAUSTED"));
                assert!(message.contains("Quota exceeded"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(is_rate_limited(&error));
    }

    #[test]
    fn plain_server_error_is_not_retried() {
        let error = map_gemini_error(ClientError::BadResponse {
            code: 500,
            description: Some("internal".to_string()),
        });
        assert!(matches!(
            error,
            AppError::GeminiApi {
                code: Some(500),
                status: None,
                ..
            }
        ));
        assert!(!is_rate_limited(&error));

        let error = map_gemini_error(ClientError::MissingResponseHeader {
            header: "x-goog-upload-url".to_string(),
        });
        assert!(matches!(error, AppError::GeminiApi { code: None, .. }));
    }

    #[test]
    fn inpainting_requests_image_output() {
        assert_eq!(
            inpaint_config().response_modalities,
            Some(vec!["IMAGE".to_string(), "TEXT".to_string()])
        );
    }

    #[tokio::test]
    async fn missing_key_degrades_instead_of_calling() {
        let config = Config::builder().build().unwrap();
        let assistant = GeminiAssistant::new(&config).unwrap();
        assert!(!assistant.is_available());

        assert_eq!(assistant.tips().await.unwrap(), TIPS_UNAVAILABLE);
        assert!(matches!(
            assistant.detect_area(b"jpeg").await,
            Err(AppError::ServiceUnavailable)
        ));
        assert!(matches!(
            assistant.inpaint(b"jpeg").await,
            Err(AppError::ServiceUnavailable)
        ));
    }
}
