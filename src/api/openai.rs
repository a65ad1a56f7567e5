use super::{ApiError, ImageGenerator, TextGenerator};
use crate::config::Config;
use crate::logw;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

const BODY_SNIPPET_CHARS: usize = 800;

/// OpenAI chat-completions and images client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_base: String,
    text_model: String,
    temperature: f32,
    image_model: String,
    image_size: String,
}

impl OpenAiClient {
    /// Fails up front when no key is configured instead of on the first call.
    pub fn new(cfg: &Config) -> Result<Self, ApiError> {
        if cfg.openai_key.trim().is_empty() {
            return Err(ApiError::NotConfigured("OPENAI_API_KEY not set".to_string()));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = cfg.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: cfg.openai_key.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            text_model: cfg.text_model.clone(),
            temperature: cfg.temperature,
            image_model: cfg.image_model.clone(),
            image_size: cfg.image_size.clone(),
        })
    }

    async fn read_body(resp: reqwest::Response) -> Result<String, ApiError> {
        let status = resp.status();
        let raw = resp
            .text()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            logw(format!("OpenAI HTTP {}", status.as_u16()));
            let message = extract_error_message(&raw)
                .unwrap_or_else(|| raw.chars().take(BODY_SNIPPET_CHARS).collect());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }
        Ok(raw)
    }

    async fn image_bytes(&self, raw: &str) -> Result<Vec<u8>, ApiError> {
        match first_image(raw)? {
            ImagePayload::Base64(b64) => BASE64
                .decode(b64.trim())
                .map_err(|e| ApiError::ParseError(format!("invalid base64 image: {e}"))),
            ImagePayload::Url(url) => {
                let resp = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
                if !resp.status().is_success() {
                    return Err(ApiError::Status {
                        status: resp.status().as_u16(),
                        message: format!("image download failed: {url}"),
                    });
                }
                let bytes = resp
                    .bytes()
                    .await
                    .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
                Ok(bytes.to_vec())
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

#[derive(Debug, PartialEq)]
enum ImagePayload {
    Base64(String),
    Url(String),
}

fn extract_error_message(raw: &str) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_str(raw).ok()?;
    let err = envelope.error;
    if let Some(typ) = err.error_type.as_deref() {
        logw(format!("OpenAI error type: {}", typ));
    }
    if let Some(code) = err.code.as_ref().filter(|c| !c.is_null()) {
        logw(format!("OpenAI error code: {}", code));
    }
    Some(err.message)
}

fn extract_chat_text(raw: &str) -> Result<String, ApiError> {
    let resp: ChatResponse =
        serde_json::from_str(raw).map_err(|e| ApiError::ParseError(e.to_string()))?;
    resp.choices
        .into_iter()
        .find_map(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| ApiError::ParseError("No text content in response".to_string()))
}

fn first_image(raw: &str) -> Result<ImagePayload, ApiError> {
    let resp: ImageResponse =
        serde_json::from_str(raw).map_err(|e| ApiError::ParseError(e.to_string()))?;
    let datum = resp
        .data
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::ParseError("response returned no images".to_string()))?;

    match (datum.b64_json, datum.url) {
        (Some(b64), _) => Ok(ImagePayload::Base64(b64)),
        (None, Some(url)) => Ok(ImagePayload::Url(url)),
        (None, None) => Err(ApiError::ParseError(
            "image entry has neither b64_json nor url".to_string(),
        )),
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ApiError> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let body = ChatRequest {
            model: &self.text_model,
            temperature: self.temperature,
            messages,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let raw = Self::read_body(resp).await?;
        extract_chat_text(&raw)
    }

    fn model_name(&self) -> &str {
        &self.text_model
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ApiError> {
        let body = ImageRequest {
            model: &self.image_model,
            prompt,
            size: &self.image_size,
            n: 1,
        };

        let resp = self
            .client
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let raw = Self::read_body(resp).await?;
        self.image_bytes(&raw).await
    }

    async fn edit_image(&self, base_png: &Path, prompt: &str) -> Result<Vec<u8>, ApiError> {
        let bytes = fs::read(base_png).await.map_err(|e| ApiError::Input {
            path: base_png.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = base_png
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "base.png".to_string());
        let image = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let form = Form::new()
            .text("model", self.image_model.clone())
            .text("prompt", prompt.to_string())
            .text("size", self.image_size.clone())
            .text("n", "1")
            .part("image", image);

        let resp = self
            .client
            .post(format!("{}/images/edits", self.api_base))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let raw = Self::read_body(resp).await?;
        self.image_bytes(&raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_without_key_is_not_configured() {
        let err = OpenAiClient::new(&Config::default()).unwrap_err();
        assert!(matches!(err, ApiError::NotConfigured(_)));
    }

    #[test]
    fn new_trims_trailing_slash_from_base() {
        let cfg = Config {
            openai_key: "sk-test".into(),
            api_base: "http://localhost:9999/v1/".into(),
            ..Config::default()
        };
        let client = OpenAiClient::new(&cfg).unwrap();
        assert_eq!(client.api_base, "http://localhost:9999/v1");
        assert_eq!(client.model_name(), "gpt-4o-mini");
    }

    #[test]
    fn chat_text_is_trimmed() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"  Oi!\n"}}]}"#;
        assert_eq!(extract_chat_text(raw).unwrap(), "Oi!");
    }

    #[test]
    fn chat_without_content_is_parse_error() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(
            extract_chat_text(raw),
            Err(ApiError::ParseError(_))
        ));
    }

    #[test]
    fn error_envelope_message_is_extracted() {
        let raw = r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(
            extract_error_message(raw).as_deref(),
            Some("Incorrect API key")
        );
        assert!(extract_error_message("not json").is_none());
    }

    #[test]
    fn image_payload_prefers_base64() {
        let raw = r#"{"data":[{"b64_json":"aGk=","url":"https://x/y.png"}]}"#;
        assert_eq!(
            first_image(raw).unwrap(),
            ImagePayload::Base64("aGk=".into())
        );

        let raw = r#"{"data":[{"url":"https://x/y.png"}]}"#;
        assert_eq!(
            first_image(raw).unwrap(),
            ImagePayload::Url("https://x/y.png".into())
        );

        assert!(first_image(r#"{"data":[]}"#).is_err());
    }
}
