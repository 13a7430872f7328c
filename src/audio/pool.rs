//! Per-persona dispatch and bounded-concurrency batch synthesis, grounded on
//! the teacher's `TranscriptionOrchestrator::process_chunks`
//! (Semaphore + FuturesUnordered, joined at the caller).

use crate::audio::{wav_duration_seconds, SynthesisRequest, Synthesizer};
use crate::error::{Result, VideoGenError};
use crate::paths::{is_reusable, ProjectPaths};
use crate::persona::Persona;
use crate::phrase::Phrase;
use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub struct SynthesisOutcome {
    pub original_index: usize,
    pub duration: Option<f64>,
    pub error: Option<String>,
}

/// One engine instance per distinct persona. Native handles are serialized
/// per instance; the pool only parallelizes across *different* personas.
pub struct SynthesizerPool {
    engines: HashMap<String, Arc<dyn Synthesizer>>,
    first_persona_id: Option<String>,
    concurrency: usize,
    show_progress: bool,
}

impl SynthesizerPool {
    pub fn new(engines: HashMap<String, Arc<dyn Synthesizer>>, concurrency: usize) -> Self {
        let first_persona_id = engines.keys().next().cloned();
        Self {
            engines,
            first_persona_id,
            concurrency,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Validate that every phrase's `persona_id` routes to a known engine
    /// before any synthesis begins (spec §4.5 "Dispatch").
    pub fn validate_dispatch(&self, phrases: &[Phrase]) -> Result<()> {
        if self.engines.is_empty() {
            return Err(VideoGenError::AudioGeneration(
                "no synthesizer engines configured".to_string(),
            ));
        }
        for phrase in phrases {
            if !self.engines.contains_key(&phrase.persona_id) {
                warn!(
                    "phrase {}: unknown persona_id '{}', falling back to first registered synthesizer",
                    phrase.original_index, phrase.persona_id
                );
            }
        }
        Ok(())
    }

    fn engine_for(&self, persona_id: &str) -> Option<Arc<dyn Synthesizer>> {
        self.engines
            .get(persona_id)
            .or_else(|| {
                self.first_persona_id
                    .as_ref()
                    .and_then(|id| self.engines.get(id))
            })
            .cloned()
    }

    /// Synthesize all phrases, skipping any whose target WAV already exists
    /// and is non-empty (idempotent skip, P2) unless `force` is set.
    pub async fn synthesize_all(
        &self,
        phrases: &[Phrase],
        persona_speaker: &HashMap<String, (u32, f32)>,
        paths: &ProjectPaths,
        force: bool,
    ) -> Result<Vec<SynthesisOutcome>> {
        self.validate_dispatch(phrases)?;

        let progress = if self.show_progress {
            let pb = ProgressBar::new(phrases.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} phrases")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            Some(pb)
        } else {
            None
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let mut futures = FuturesUnordered::new();

        for phrase in phrases {
            let target = paths.phrase_wav(phrase.original_index);

            if !force && is_reusable(&target) {
                match wav_duration_seconds(&target) {
                    Ok(duration) => {
                        if let Some(pb) = &progress {
                            pb.inc(1);
                        }
                        futures.push(Box::pin(async move {
                            SynthesisOutcome {
                                original_index: phrase.original_index,
                                duration: Some(duration),
                                error: None,
                            }
                        })
                            as std::pin::Pin<Box<dyn std::future::Future<Output = SynthesisOutcome> + Send>>);
                        continue;
                    }
                    Err(e) => {
                        warn!("phrase {}: cached WAV unreadable, regenerating: {e}", phrase.original_index);
                    }
                }
            }

            let Some(engine) = self.engine_for(&phrase.persona_id) else {
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                let original_index = phrase.original_index;
                futures.push(Box::pin(async move {
                    SynthesisOutcome {
                        original_index,
                        duration: None,
                        error: Some("no synthesizer engine available".to_string()),
                    }
                }) as std::pin::Pin<Box<dyn std::future::Future<Output = SynthesisOutcome> + Send>>);
                continue;
            };

            let (speaker_id, speed_scale) = persona_speaker
                .get(&phrase.persona_id)
                .copied()
                .unwrap_or((0, 1.0));
            let reading_or_text = if phrase.reading.trim().is_empty() {
                phrase.text.clone()
            } else {
                phrase.reading.clone()
            };
            let original_index = phrase.original_index;
            let sem = semaphore.clone();
            let pb = progress.clone();

            futures.push(Box::pin(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                debug!("synthesizing phrase {original_index}");
                let request = SynthesisRequest {
                    original_index,
                    reading_or_text: &reading_or_text,
                    speaker_id,
                    speed_scale,
                };
                let result = engine.synthesize_phrase(&request, &target).await;
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                match result {
                    Ok(duration) => SynthesisOutcome {
                        original_index,
                        duration: Some(duration),
                        error: None,
                    },
                    Err(e) => SynthesisOutcome {
                        original_index,
                        duration: None,
                        error: Some(e.to_string()),
                    },
                }
            }) as std::pin::Pin<Box<dyn std::future::Future<Output = SynthesisOutcome> + Send>>);
        }

        let mut outcomes = Vec::with_capacity(phrases.len());
        while let Some(outcome) = futures.next().await {
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|o| o.original_index);

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed > 0 {
            info!("audio synthesis: {failed}/{} phrases failed", outcomes.len());
        }

        Ok(outcomes)
    }
}

/// Build a lookup from persona id to (speaker_id, speed_scale), used by the
/// pool dispatcher to avoid threading full `Persona` structs through futures.
pub fn persona_speaker_map(personas: &[Persona]) -> HashMap<String, (u32, f32)> {
    personas
        .iter()
        .map(|p| {
            let crate::persona::SynthesizerConfig::Voicevox {
                speaker_id,
                speed_scale,
            } = &p.synthesizer;
            (p.id.clone(), (*speaker_id, *speed_scale))
        })
        .collect()
}
