//! Image-generation LLM client, grounded on `script::llm::OpenRouterClient`
//! (same bearer-auth `reqwest::Client` shape, different endpoint/response).

use crate::error::{Result, VideoGenError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Shared style instructions sent once per project, not per slide (spec §4.6:
/// "shared style instructions, sent once as a system-level context").
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, system_style: &str, prompt: &str) -> Result<Vec<u8>>;
}

pub struct OpenRouterImageModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    messages: Vec<ImageMessage<'a>>,
}

#[derive(Serialize)]
struct ImageMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    choices: Vec<ImageChoice>,
}

#[derive(Deserialize)]
struct ImageChoice {
    message: ImageResponseMessage,
}

#[derive(Deserialize)]
struct ImageResponseMessage {
    images: Option<Vec<ImagePayload>>,
}

#[derive(Deserialize)]
struct ImagePayload {
    image_url: ImageUrl,
}

#[derive(Deserialize)]
struct ImageUrl {
    url: String,
}

impl OpenRouterImageModel {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
        }
    }
}

#[async_trait]
impl ImageModel for OpenRouterImageModel {
    async fn generate(&self, system_style: &str, prompt: &str) -> Result<Vec<u8>> {
        let combined = format!("{system_style}\n\n{prompt}");
        let request = ImageRequest {
            model: &self.model,
            messages: vec![ImageMessage {
                role: "user",
                content: &combined,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(VideoGenError::SlideGeneration(format!(
                "image LLM returned {status}: {body}"
            )));
        }

        let parsed: ImageResponse = response.json().await?;
        let data_url = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.images)
            .and_then(|mut imgs| if imgs.is_empty() { None } else { Some(imgs.remove(0)) })
            .map(|img| img.image_url.url)
            .ok_or_else(|| VideoGenError::SlideGeneration("image LLM returned no image".to_string()))?;

        decode_data_url(&data_url)
    }
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>> {
    let b64 = data_url
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(data_url);
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, b64)
        .map_err(|e| VideoGenError::SlideGeneration(format!("invalid base64 image payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_data_url_prefixed_payload() {
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"png-bytes");
        let data_url = format!("data:image/png;base64,{encoded}");
        let decoded = decode_data_url(&data_url).unwrap();
        assert_eq!(decoded, b"png-bytes");
    }

    #[test]
    fn decodes_raw_base64_without_prefix() {
        let encoded = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, b"raw");
        let decoded = decode_data_url(&encoded).unwrap();
        assert_eq!(decoded, b"raw");
    }
}
