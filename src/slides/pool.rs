//! Bounded-concurrency slide production with the download -> image-LLM ->
//! placeholder fallback chain and inter-batch rate-limit damping (spec §4.6).

use crate::error::{Result, VideoGenError};
use crate::paths::{is_reusable, ProjectPaths};
use crate::phrase::Phrase;
use crate::retry::{retry_with_backoff, RetryConfig};
use crate::script::ScriptSection;
use crate::slides::{fit_and_letterbox, write_placeholder_slide, ImageModel, MIN_HEIGHT, MIN_WIDTH};
use image::GenericImageView;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

pub struct SlideOutcome {
    pub section_index: usize,
    pub error: Option<String>,
}

const STYLE_INSTRUCTIONS: &str =
    "Wide 1920x1080 slide illustration, clean modern presentation style, no embedded text.";
const INTER_BATCH_DELAY: Duration = Duration::from_secs(1);
const DOWNLOAD_TIMEOUT_SECONDS: u64 = 30;

pub struct SlideProducer {
    http_client: reqwest::Client,
    image_model: Option<Arc<dyn ImageModel>>,
    max_concurrent: usize,
    retry_config: RetryConfig,
    background: Option<String>,
    show_progress: bool,
}

impl SlideProducer {
    pub fn new(
        image_model: Option<Arc<dyn ImageModel>>,
        max_concurrent: usize,
        retry_config: RetryConfig,
        background: Option<String>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECONDS))
                .build()
                .expect("reqwest client"),
            image_model,
            max_concurrent,
            retry_config,
            background,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Produce one canonical slide per section, then copy it to every phrase
    /// file that section covers (slide files are indexed by `original_index`,
    /// spec §3 `ProjectPaths.SLIDE_FILENAME_FORMAT`).
    pub async fn produce_all(
        &self,
        sections: &[ScriptSection],
        phrases: &[Phrase],
        paths: &ProjectPaths,
        lang: Option<&str>,
        multilingual: bool,
        force: bool,
    ) -> Result<Vec<SlideOutcome>> {
        let mut phrases_by_section: HashMap<usize, Vec<usize>> = HashMap::new();
        for phrase in phrases {
            phrases_by_section
                .entry(phrase.section_index)
                .or_default()
                .push(phrase.original_index);
        }

        let progress = if self.show_progress {
            let pb = ProgressBar::new(sections.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} slides")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent.max(1)));
        let mut outcomes = Vec::with_capacity(sections.len());
        let batch_size = self.max_concurrent.max(1);

        for (batch_index, batch) in sections.iter().enumerate().collect::<Vec<_>>().chunks(batch_size).enumerate() {
            if batch_index > 0 {
                tokio::time::sleep(INTER_BATCH_DELAY).await;
            }

            let mut batch_futures = Vec::new();
            for &(section_index, section) in batch {
                let phrase_indices = phrases_by_section.get(&section_index).cloned().unwrap_or_default();
                let sem = semaphore.clone();
                let section = section.clone();
                batch_futures.push(async move {
                    let _permit = sem.acquire().await.expect("semaphore closed");
                    self.produce_section(section_index, &section, &phrase_indices, paths, lang, multilingual, force)
                        .await
                });
            }

            let batch_results = futures::future::join_all(batch_futures).await;
            for (idx, result) in batch_results.into_iter().enumerate() {
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                let section_index = batch[idx].0;
                match result {
                    Ok(()) => outcomes.push(SlideOutcome {
                        section_index,
                        error: None,
                    }),
                    Err(e) => {
                        warn!("section {section_index}: slide production failed: {e}");
                        outcomes.push(SlideOutcome {
                            section_index,
                            error: Some(e.to_string()),
                        });
                    }
                }
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed > 0 {
            info!("slide production: {failed}/{} sections failed", outcomes.len());
        }

        Ok(outcomes)
    }

    #[allow(clippy::too_many_arguments)]
    async fn produce_section(
        &self,
        section_index: usize,
        section: &ScriptSection,
        phrase_indices: &[usize],
        paths: &ProjectPaths,
        lang: Option<&str>,
        multilingual: bool,
        force: bool,
    ) -> Result<()> {
        if !force
            && phrase_indices
                .iter()
                .all(|&idx| is_reusable(&paths.slide_png(idx, lang, multilingual)))
            && !phrase_indices.is_empty()
        {
            return Ok(());
        }

        let png_bytes = match self.acquire_image(section).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if section.slide_prompt.is_some() {
                    // The image-LLM path was available (and, per acquire_image,
                    // either attempted directly or as a fallback from a failed
                    // source_image_url) and its retries were exhausted. This is
                    // a stage-level failure for this slide, not a placeholder
                    // case — surface it so the caller can report it per section.
                    return Err(e);
                }
                warn!("section {section_index}: all slide sources failed ({e}), using placeholder");
                for &idx in phrase_indices {
                    let target = paths.slide_png(idx, lang, multilingual);
                    write_placeholder_slide(&target, 1920, 1080)?;
                }
                return Ok(());
            }
        };

        for &idx in phrase_indices {
            let target = paths.slide_png(idx, lang, multilingual);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &png_bytes)?;
        }
        Ok(())
    }

    async fn acquire_image(&self, section: &ScriptSection) -> Result<Vec<u8>> {
        if let Some(url) = &section.source_image_url {
            match self.download_and_fit(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    if section.slide_prompt.is_none() {
                        return Err(e);
                    }
                    warn!("source_image_url download failed ({e}), falling through to image-LLM path");
                }
            }
        }

        if let Some(prompt) = &section.slide_prompt {
            return self.generate_via_llm(prompt).await;
        }

        Err(VideoGenError::SlideGeneration(
            "section has neither source_image_url nor slide_prompt".to_string(),
        ))
    }

    async fn download_and_fit(&self, url: &str) -> Result<Vec<u8>> {
        let client = &self.http_client;
        let bytes = retry_with_backoff(self.retry_config, "slide download", || async {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| VideoGenError::SlideGeneration(format!("download failed: {e}")))?;
            if !response.status().is_success() {
                return Err(VideoGenError::SlideGeneration(format!(
                    "download returned status {}",
                    response.status()
                )));
            }
            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| VideoGenError::SlideGeneration(format!("download body read failed: {e}")))
        })
        .await?;

        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| VideoGenError::SlideGeneration(format!("not a valid image: {e}")))?;
        let (w, h) = decoded.dimensions();
        if w < MIN_WIDTH || h < MIN_HEIGHT {
            return Err(VideoGenError::SlideGeneration(format!(
                "image resolution {w}x{h} below minimum {MIN_WIDTH}x{MIN_HEIGHT}"
            )));
        }

        let fitted = fit_and_letterbox(&decoded, 1920, 1080, self.background.as_deref());
        let mut out = Vec::new();
        fitted
            .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| VideoGenError::SlideGeneration(format!("png encode failed: {e}")))?;
        Ok(out)
    }

    async fn generate_via_llm(&self, prompt: &str) -> Result<Vec<u8>> {
        let Some(model) = &self.image_model else {
            return Err(VideoGenError::SlideGeneration(
                "no image-generation model configured".to_string(),
            ));
        };
        retry_with_backoff(self.retry_config, "image LLM generation", || async {
            model.generate(STYLE_INSTRUCTIONS, prompt).await
        })
        .await
    }
}
