//! Placeholder synthesizer: emits a fixed-length silent WAV when the native
//! engine is unavailable (spec §4.5, "Placeholder mode"). Mandatory opt-in
//! via `--allow-placeholder`; never a silent fallback.

use crate::audio::{write_silent_wav, SynthesisRequest, Synthesizer};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Open question in spec §9: exact silence duration is unspecified upstream.
/// 1.0s keeps downstream composition math valid (non-zero `durationFrames`)
/// while being obviously a placeholder in review.
pub const PLACEHOLDER_DURATION_SECONDS: f64 = 1.0;

pub struct PlaceholderSynthesizer;

#[async_trait]
impl Synthesizer for PlaceholderSynthesizer {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn synthesize_phrase(
        &self,
        _request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<f64> {
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        write_silent_wav(output_path, PLACEHOLDER_DURATION_SECONDS)?;
        Ok(PLACEHOLDER_DURATION_SECONDS)
    }

    fn engine_name(&self) -> &'static str {
        "placeholder"
    }
}
