//! Script-generation LLM client (C2), grounded on the teacher's
//! `translate/gemini.rs` request/response shape and retry-free single-call style
//! (retries for this collaborator are handled by the orchestrator's stage
//! failure policy, not locally, since a malformed script is not transient).

use crate::error::{Result, VideoGenError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` and return the raw text completion (expected to be JSON
    /// per the script schema; parsing is a separate, pure step).
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// OpenRouter-compatible chat completion client.
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterClient {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.unwrap_or_else(|| "https://openrouter.ai/api/v1".to_string()),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[async_trait]
impl LanguageModel for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.7,
        };

        debug!("calling script LLM model={}", self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(VideoGenError::ScriptGeneration(format!(
                "LLM API error ({status}): {body}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                VideoGenError::ScriptGeneration("LLM response had no choices".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_default_base_url() {
        let client = OpenRouterClient::new("key".to_string(), "gpt-4".to_string(), None);
        assert_eq!(client.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn builds_with_custom_base_url() {
        let client = OpenRouterClient::new(
            "key".to_string(),
            "gpt-4".to_string(),
            Some("https://custom.example.com/v1".to_string()),
        );
        assert_eq!(client.base_url, "https://custom.example.com/v1");
    }
}
