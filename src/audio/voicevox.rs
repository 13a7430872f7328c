//! VOICEVOX HTTP engine client, grounded on the teacher's `GeminiClient`
//! single-`reqwest::Client` collaborator shape (`transcribe/gemini.rs`).

use crate::audio::{wav_duration_seconds, SynthesisRequest, Synthesizer};
use crate::error::{Result, VideoGenError};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tracing::debug;

pub struct VoicevoxSynthesizer {
    client: reqwest::Client,
    base_url: String,
    initialized: bool,
}

impl VoicevoxSynthesizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            initialized: false,
        }
    }
}

#[async_trait]
impl Synthesizer for VoicevoxSynthesizer {
    async fn initialize(&mut self) -> Result<()> {
        let url = format!("{}/version", self.base_url);
        self.client.get(&url).send().await.map_err(|e| {
            VideoGenError::AudioGeneration(format!(
                "VOICEVOX engine not reachable at {}: {e}. Start the engine or pass --allow-placeholder.",
                self.base_url
            ))
        })?;
        self.initialized = true;
        Ok(())
    }

    async fn synthesize_phrase(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<f64> {
        if !self.initialized {
            return Err(VideoGenError::AudioGeneration(
                "VOICEVOX synthesizer used before initialize()".to_string(),
            ));
        }

        debug!(
            "synthesizing phrase {} with speaker {}",
            request.original_index, request.speaker_id
        );

        let query_url = format!(
            "{}/audio_query?speaker={}&text={}",
            self.base_url,
            request.speaker_id,
            urlencoding_encode(request.reading_or_text)
        );
        let query = self
            .client
            .post(&query_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| VideoGenError::AudioGeneration(format!("audio_query failed: {e}")))?
            .text()
            .await?;

        let mut query_json: serde_json::Value = serde_json::from_str(&query)?;
        query_json["speedScale"] = serde_json::json!(request.speed_scale);

        let synth_url = format!("{}/synthesis?speaker={}", self.base_url, request.speaker_id);
        let audio = self
            .client
            .post(&synth_url)
            .json(&query_json)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| VideoGenError::AudioGeneration(format!("synthesis failed: {e}")))?
            .bytes()
            .await?;

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(output_path, &audio).await?;

        wav_duration_seconds(output_path)
    }

    fn engine_name(&self) -> &'static str {
        "voicevox"
    }
}

fn urlencoding_encode(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
                c.to_string()
            } else {
                c.to_string()
                    .bytes()
                    .map(|b| format!("%{b:02X}"))
                    .collect::<String>()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoding_passes_through_ascii_and_escapes_unicode() {
        assert_eq!(urlencoding_encode("hello"), "hello");
        assert!(urlencoding_encode("ヤッタ").starts_with('%'));
    }
}
