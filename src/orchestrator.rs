//! Pipeline Orchestrator (C9): stage sequencing, skip/force policy, scene-range
//! filtering, dry-run suppression, cooperative cancellation (spec §4.1).
//!
//! Grounded on the teacher's `pipeline::generate_subtitles_with_cancel` shape:
//! a linear stage driver threading a shared `Arc<AtomicBool>` cancellation flag,
//! `indicatif` progress per bounded sub-stage, and per-item failure isolation.

use crate::audio::{PlaceholderSynthesizer, Synthesizer, VoicevoxSynthesizer};
use crate::composition::build_composition;
use crate::config::Config;
use crate::error::{Result, VideoGenError};
use crate::paths::ProjectPaths;
use crate::persona::{self, Persona};
use crate::phrase::Phrase;
use crate::pronunciation::{
    apply_dictionary, resolve_fallback, KanjiRunAnalyzer, LlmReadingVerifier, PronunciationDictionary,
};
use crate::render;
use crate::scene_range::SceneRange;
use crate::script::{
    fetch::ContentFetcher,
    llm::LanguageModel,
    parse::parse_script_response,
    prompt::{build_prompt, PromptInput},
    HttpContentFetcher, OpenRouterClient, ScriptSection, VideoScript,
};
use crate::segment::{segment, SegmentConfig};
use crate::slides::{ImageModel, OpenRouterImageModel, SlideProducer};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct GenerateFlags {
    pub force: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub dry_run: bool,
    pub allow_placeholder: bool,
}

pub enum Input {
    Url(String),
    ScriptPath(PathBuf),
}

pub struct Orchestrator {
    config: Config,
    content_fetcher: Arc<dyn ContentFetcher>,
    language_model: Arc<dyn LanguageModel>,
    image_model: Option<Arc<dyn ImageModel>>,
    cancelled: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let api_key = config.api_key.clone().unwrap_or_default();
        let language_model: Arc<dyn LanguageModel> = Arc::new(OpenRouterClient::new(
            api_key.clone(),
            config.content.llm.model.clone(),
            config.content.llm.base_url.clone(),
        ));
        let image_model: Option<Arc<dyn ImageModel>> = Some(Arc::new(OpenRouterImageModel::new(
            api_key,
            config.slides.llm.model.clone(),
            config.slides.llm.base_url.clone(),
        )));

        Self {
            config,
            content_fetcher: Arc::new(HttpContentFetcher::new()),
            language_model,
            image_model,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    fn check_cancelled(&self, stage: &str) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(VideoGenError::Configuration(format!(
                "cancelled before stage {stage}"
            )));
        }
        Ok(())
    }

    /// `generate(input, scene_range, flags)`. Returns the final output MP4 path
    /// (possibly more than one, under multilingual generation).
    pub async fn generate(
        &self,
        input: Input,
        scene_range: Option<&str>,
        flags: &GenerateFlags,
    ) -> Result<Vec<PathBuf>> {
        let paths = ProjectPaths::new(self.config.project.output_dir.clone());
        let personas = self.active_personas()?;
        let multilingual = self.config.content.languages.len() > 1;

        let mut outputs = Vec::new();

        for lang in &self.config.content.languages {
            self.check_cancelled("S1 content fetch")?;
            let lang_opt = if multilingual { Some(lang.as_str()) } else { None };

            let result = self
                .generate_for_language(&input, &paths, &personas, lang, lang_opt, multilingual, scene_range, flags)
                .await;

            match result {
                Ok(output) => outputs.push(output),
                Err(e) if multilingual => {
                    warn!("language '{lang}' failed, isolating failure and continuing: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        if outputs.is_empty() {
            return Err(VideoGenError::Configuration(
                "all languages failed; nothing was generated".to_string(),
            ));
        }
        Ok(outputs)
    }

    /// `script create <URL>` — S1+S2 only, for every configured language.
    pub async fn create_script(&self, input: &Input, flags: &GenerateFlags) -> Result<Vec<PathBuf>> {
        let paths = ProjectPaths::new(self.config.project.output_dir.clone());
        let personas = self.active_personas()?;
        let multilingual = self.config.content.languages.len() > 1;

        let mut written = Vec::new();
        for lang in &self.config.content.languages {
            let lang_opt = if multilingual { Some(lang.as_str()) } else { None };
            let script_path = paths.script_yaml(lang_opt);
            let result = self
                .load_or_generate_script(input, &script_path, &personas, lang, flags)
                .await;
            match result {
                Ok(_) => written.push(script_path),
                Err(e) if multilingual => {
                    warn!("language '{lang}' script generation failed, continuing: {e}");
                }
                Err(e) => return Err(e),
            }
        }

        if written.is_empty() {
            return Err(VideoGenError::ScriptGeneration(
                "all languages failed to produce a script".to_string(),
            ));
        }
        Ok(written)
    }

    /// `audio generate <script.yaml>` — S3 only, against an already-resolved
    /// script file. `speaker_id_override` applies to every active persona.
    pub async fn generate_audio_only(
        &self,
        script_path: &std::path::Path,
        scene_range: Option<&str>,
        speaker_id_override: Option<u32>,
        flags: &GenerateFlags,
    ) -> Result<()> {
        let script = load_script_file(script_path)?;
        let paths = ProjectPaths::new(self.config.project.output_dir.clone());
        let mut personas = self.active_personas()?;
        if let Some(speaker_id) = speaker_id_override {
            for persona in &mut personas {
                persona.synthesizer = crate::persona::SynthesizerConfig::Voicevox {
                    speaker_id,
                    speed_scale: 1.0,
                };
            }
        }

        let range = parse_scene_range(scene_range, script.sections.len())?;
        let phrases = build_phrases(&script, &range, &personas);
        if phrases.is_empty() {
            return Err(VideoGenError::Configuration(
                "scene range selection produced zero phrases".to_string(),
            ));
        }

        if flags.dry_run {
            info!("[dry-run] would synthesize {} phrases", phrases.len());
            return Ok(());
        }
        self.synthesize_audio(&phrases, &personas, &paths, flags).await
    }

    /// `slides generate <script.yaml>` — S4 only, against an already-resolved
    /// script file.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate_slides_only(
        &self,
        script_path: &std::path::Path,
        scene_range: Option<&str>,
        lang: Option<&str>,
        model_override: Option<String>,
        max_concurrent_override: Option<usize>,
        flags: &GenerateFlags,
    ) -> Result<()> {
        let script = load_script_file(script_path)?;
        let paths = ProjectPaths::new(self.config.project.output_dir.clone());
        let personas = self.active_personas()?;
        let multilingual = self.config.content.languages.len() > 1;

        let range = parse_scene_range(scene_range, script.sections.len())?;
        let phrases = build_phrases(&script, &range, &personas);
        if phrases.is_empty() {
            return Err(VideoGenError::Configuration(
                "scene range selection produced zero phrases".to_string(),
            ));
        }

        if flags.dry_run {
            info!("[dry-run] would produce {} slides", script.sections.len());
            return Ok(());
        }

        let image_model: Option<Arc<dyn ImageModel>> = match model_override {
            Some(model) => Some(Arc::new(crate::slides::OpenRouterImageModel::new(
                self.config.api_key.clone().unwrap_or_default(),
                model,
                self.config.slides.llm.base_url.clone(),
            ))),
            None => self.image_model.clone(),
        };
        let max_concurrent = max_concurrent_override.unwrap_or(self.config.slides.max_concurrent);

        let producer = SlideProducer::new(
            image_model,
            max_concurrent,
            crate::retry::RetryConfig {
                max_retries: self.config.slides.max_retries,
                base_delay_ms: self.config.slides.retry_delay,
                backoff_factor: 2.0,
            },
            self.config.video.background.clone(),
        )
        .with_progress(!flags.quiet);

        let outcomes = producer
            .produce_all(&script.sections, &phrases, &paths, lang, multilingual, flags.force)
            .await?;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed == outcomes.len() && !outcomes.is_empty() {
            return Err(VideoGenError::SlideGeneration(
                "every section failed to produce a slide".to_string(),
            ));
        }
        Ok(())
    }

    /// `video render <script.yaml>` — S5+S6 only, against an already-resolved
    /// script file with already-synthesized audio/slides on disk.
    #[allow(clippy::too_many_arguments)]
    pub async fn render_video_only(
        &self,
        script_path: &std::path::Path,
        scene_range: Option<&str>,
        transition_override: Option<crate::config::TransitionType>,
        fps_override: Option<u32>,
        output_override: Option<PathBuf>,
        flags: &GenerateFlags,
    ) -> Result<PathBuf> {
        let script = load_script_file(script_path)?;
        let paths = ProjectPaths::new(self.config.project.output_dir.clone());
        let personas = self.active_personas()?;
        let multilingual = self.config.content.languages.len() > 1;

        let range = parse_scene_range(scene_range, script.sections.len())?;
        let phrases = build_phrases(&script, &range, &personas);
        if phrases.is_empty() {
            return Err(VideoGenError::Configuration(
                "scene range selection produced zero phrases".to_string(),
            ));
        }
        let phrases = attach_durations(phrases, &paths);

        let mut config = self.config.clone();
        if let Some(transition_type) = transition_override {
            config.video.transition.transition_type = transition_type;
        }
        if let Some(fps) = fps_override {
            config.style.fps = fps;
        }

        let composition = build_composition(&phrases, &config, &personas, &paths, |p| {
            slide_relative_path(&paths, p.original_index, None, multilingual)
        });

        let suffix = range.map(|r| r.output_suffix());
        let output_path =
            output_override.unwrap_or_else(|| paths.output_mp4(suffix.as_deref()));

        if flags.dry_run {
            info!("[dry-run] would render to {}", output_path.display());
            return Ok(output_path);
        }

        std::fs::create_dir_all(paths.remotion_dir())?;
        let json = serde_json::to_string_pretty(&composition)?;
        std::fs::write(paths.composition_json(), json)?;

        render::check_toolchain()?;
        render::initialize_remotion_project(&paths)?;
        render::generate_typescript_sources(&paths, &composition, &personas)?;
        if let Some(workspace_root) = paths.root.parent().and_then(|p| p.parent()) {
            render::update_workspace(workspace_root, &config.project.name)?;
        }
        render::link_assets(&paths, &personas, multilingual, None)?;
        render::render(
            &paths,
            &output_path,
            config.video.render_concurrency,
            config.video.render_timeout_seconds,
        )
        .await?;

        Ok(output_path)
    }

    fn active_personas(&self) -> Result<Vec<Persona>> {
        match &self.config.persona_pool {
            Some(pool) if pool.enabled => {
                persona::sample(&self.config.personas, pool.count, pool.seed)
            }
            _ => Ok(self.config.personas.clone()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn generate_for_language(
        &self,
        input: &Input,
        paths: &ProjectPaths,
        personas: &[Persona],
        lang: &str,
        lang_opt: Option<&str>,
        multilingual: bool,
        scene_range: Option<&str>,
        flags: &GenerateFlags,
    ) -> Result<PathBuf> {
        let script_path = paths.script_yaml(lang_opt);

        // S1 + S2: content fetch and script generation.
        let script = self
            .load_or_generate_script(input, &script_path, personas, lang, flags)
            .await?;

        let range = match scene_range {
            Some(raw) => Some(SceneRange::parse(raw, script.sections.len())?),
            None => None,
        };

        let mut phrases = build_phrases(&script, &range, personas);
        if phrases.is_empty() {
            return Err(VideoGenError::Configuration(
                "scene range selection produced zero phrases".to_string(),
            ));
        }

        // S3 pre-pass: build the pronunciation dictionary from manual entries,
        // then run the morphological + LLM fallback for every phrase whose
        // `reading` is missing or empty (spec §4.4/§4.5), and bake the result
        // back into phrase.reading before synthesis dispatch.
        let mut dictionary = PronunciationDictionary::new();
        for entry in &self.config.pronunciation.custom {
            dictionary.insert(entry.clone());
        }
        if dictionary.is_empty() {
            info!("no custom pronunciation entries configured");
        }

        if flags.dry_run {
            info!("[dry-run] would run the pronunciation fallback for phrases missing a reading");
        } else {
            resolve_phrase_readings(&mut phrases, &mut dictionary, &self.language_model).await?;
        }

        self.check_cancelled("S3 audio synthesis")?;
        if flags.dry_run {
            info!("[dry-run] would synthesize {} phrases", phrases.len());
        } else {
            self.synthesize_audio(&phrases, personas, paths, flags).await?;
        }

        self.check_cancelled("S4 slide generation")?;
        if flags.dry_run {
            info!("[dry-run] would produce {} slides", script.sections.len());
        } else {
            self.produce_slides(&script.sections, &phrases, paths, lang_opt, multilingual, flags)
                .await?;
        }

        // Re-read durations (synthesis may have been a no-op in dry-run).
        let phrases = if flags.dry_run {
            phrases
        } else {
            attach_durations(phrases, paths)
        };

        self.check_cancelled("S5 composition build")?;
        let composition = build_composition(&phrases, &self.config, personas, paths, |p| {
            slide_relative_path(paths, p.original_index, lang_opt, multilingual)
        });

        if flags.dry_run {
            info!("[dry-run] would write composition.json ({} total frames)", composition.total_frames);
        } else {
            std::fs::create_dir_all(paths.remotion_dir())?;
            let json = serde_json::to_string_pretty(&composition)?;
            std::fs::write(paths.composition_json(), json)?;
        }

        self.check_cancelled("S6 video render")?;
        let suffix = range.map(|r| r.output_suffix());
        let output_path = paths.output_mp4(suffix.as_deref());

        if flags.dry_run {
            info!("[dry-run] would render to {}", output_path.display());
            return Ok(output_path);
        }

        render::check_toolchain()?;
        render::initialize_remotion_project(paths)?;
        render::generate_typescript_sources(paths, &composition, personas)?;
        // paths.root is "<workspace_root>/projects/<name>"; update_workspace
        // wants the workspace root two levels up.
        if let Some(workspace_root) = paths.root.parent().and_then(|p| p.parent()) {
            render::update_workspace(workspace_root, &self.config.project.name)?;
        }
        render::link_assets(paths, personas, multilingual, lang_opt)?;
        render::render(
            paths,
            &output_path,
            self.config.video.render_concurrency,
            self.config.video.render_timeout_seconds,
        )
        .await?;

        Ok(output_path)
    }

    async fn load_or_generate_script(
        &self,
        input: &Input,
        script_path: &std::path::Path,
        personas: &[Persona],
        lang: &str,
        flags: &GenerateFlags,
    ) -> Result<VideoScript> {
        if let Input::ScriptPath(path) = input {
            let contents = std::fs::read_to_string(path)?;
            return Ok(serde_yaml::from_str(&contents)?);
        }

        if crate::paths::is_reusable(script_path) && !flags.force {
            info!("reusing existing script at {}", script_path.display());
            let contents = std::fs::read_to_string(script_path)?;
            return Ok(serde_yaml::from_str(&contents)?);
        }

        let Input::Url(url) = input else {
            unreachable!("ScriptPath handled above");
        };

        if flags.dry_run {
            info!("[dry-run] would fetch {url} and call the script LLM for language '{lang}'");
            return Err(VideoGenError::Configuration(
                "dry-run cannot synthesize a script without one already on disk".to_string(),
            ));
        }

        let content = self.content_fetcher.fetch(url).await?;
        let prompt = build_prompt(&PromptInput {
            content: &content,
            language: lang,
            mode: self.config.narration.mode,
            personas,
        });
        let raw = self.language_model.complete(&prompt).await?;
        let script = parse_script_response(&raw, personas)?;

        let yaml = serde_yaml::to_string(&script)?;
        if let Some(parent) = script_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(script_path, yaml)?;
        Ok(script)
    }

    async fn synthesize_audio(
        &self,
        phrases: &[Phrase],
        personas: &[Persona],
        paths: &ProjectPaths,
        flags: &GenerateFlags,
    ) -> Result<()> {
        let mut engines: HashMap<String, Arc<dyn Synthesizer>> = HashMap::new();
        for persona in personas {
            let engine: Arc<dyn Synthesizer> = if flags.allow_placeholder {
                Arc::new(PlaceholderSynthesizer)
            } else {
                let mut voicevox = VoicevoxSynthesizer::new("http://localhost:50021");
                voicevox.initialize().await?;
                Arc::new(voicevox)
            };
            engines.insert(persona.id.clone(), engine);
        }
        if engines.is_empty() && flags.allow_placeholder {
            engines.insert("__default".to_string(), Arc::new(PlaceholderSynthesizer));
        }

        let pool = crate::audio::pool::SynthesizerPool::new(engines, 4).with_progress(!flags.quiet);
        let speaker_map = crate::audio::pool::persona_speaker_map(personas);
        let outcomes = pool
            .synthesize_all(phrases, &speaker_map, paths, flags.force)
            .await?;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed == outcomes.len() && !outcomes.is_empty() {
            return Err(VideoGenError::AudioGeneration(
                "every phrase failed to synthesize".to_string(),
            ));
        }
        Ok(())
    }

    async fn produce_slides(
        &self,
        sections: &[ScriptSection],
        phrases: &[Phrase],
        paths: &ProjectPaths,
        lang_opt: Option<&str>,
        multilingual: bool,
        flags: &GenerateFlags,
    ) -> Result<()> {
        let producer = SlideProducer::new(
            self.image_model.clone(),
            self.config.slides.max_concurrent,
            crate::retry::RetryConfig {
                max_retries: self.config.slides.max_retries,
                base_delay_ms: self.config.slides.retry_delay,
                backoff_factor: 2.0,
            },
            self.config.video.background.clone(),
        )
        .with_progress(!flags.quiet);

        let outcomes = producer
            .produce_all(sections, phrases, paths, lang_opt, multilingual, flags.force)
            .await?;

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        if failed == outcomes.len() && !outcomes.is_empty() {
            return Err(VideoGenError::SlideGeneration(
                "every section failed to produce a slide".to_string(),
            ));
        }
        Ok(())
    }
}

/// Flatten a script's sections/narrations into phrases, applying C3's
/// segmentation per narration and the scene range filter by `section_index`.
/// `original_index` is assigned before filtering so it is never renumbered.
fn build_phrases(script: &VideoScript, range: &Option<SceneRange>, personas: &[Persona]) -> Vec<Phrase> {
    let config = SegmentConfig::default();
    let mut phrases = Vec::new();
    let mut next_index = 0usize;

    for (section_index, section) in script.sections.iter().enumerate() {
        for narration in &section.narrations {
            let segments = segment(&narration.text, &config);
            let segment_count = segments.len().max(1);
            let reading_parts = split_reading(&narration.reading, segment_count);
            let persona_id = narration.persona_id.clone().unwrap_or_default();
            let persona_name = personas
                .iter()
                .find(|p| p.id == persona_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| persona_id.clone());

            for (i, seg) in segments.into_iter().enumerate() {
                let original_index = next_index;
                next_index += 1;

                if let Some(range) = range {
                    if !range.contains(section_index) {
                        continue;
                    }
                }

                phrases.push(Phrase {
                    original_index,
                    section_index,
                    persona_id: persona_id.clone(),
                    persona_name: persona_name.clone(),
                    text: seg.text,
                    reading: reading_parts.get(i).cloned().unwrap_or_default(),
                    duration: None,
                    start_frame: None,
                    background_override: section.background.clone(),
                });
            }
        }
    }

    phrases
}

/// Distribute a narration's single `reading` string across `n` sub-phrases by
/// splitting on whitespace (the prompt instructs a space at each word/particle
/// boundary). When there are fewer words than phrases, trailing phrases get an
/// empty reading and the synthesizer falls back to `phrase.text` (P8).
fn split_reading(reading: &str, n: usize) -> Vec<String> {
    if n <= 1 {
        return vec![reading.to_string()];
    }
    let words: Vec<&str> = reading.split_whitespace().collect();
    if words.is_empty() {
        return vec![String::new(); n];
    }
    let chunk = words.len().div_ceil(n);
    words
        .chunks(chunk.max(1))
        .map(|c| c.join(" "))
        .chain(std::iter::repeat(String::new()))
        .take(n)
        .collect()
}

/// C4's pre-pass (spec §4.4/§4.5 `prepare_texts`): run the morphological + LLM
/// fallback for every phrase whose `reading` is missing or empty, then bake
/// the resolved dictionary back into those phrases' `reading` fields.
async fn resolve_phrase_readings(
    phrases: &mut [Phrase],
    dictionary: &mut PronunciationDictionary,
    language_model: &Arc<dyn LanguageModel>,
) -> Result<()> {
    let missing: Vec<String> = phrases
        .iter()
        .filter(|p| p.reading.trim().is_empty())
        .map(|p| p.text.clone())
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let analyzer = KanjiRunAnalyzer::default();
    let verifier = LlmReadingVerifier::new(language_model.clone());
    resolve_fallback(dictionary, &analyzer, Some(&verifier), &missing).await?;

    for phrase in phrases.iter_mut().filter(|p| p.reading.trim().is_empty()) {
        phrase.reading = apply_dictionary(dictionary, &phrase.text);
    }
    Ok(())
}

fn load_script_file(path: &std::path::Path) -> Result<VideoScript> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&contents)?)
}

fn parse_scene_range(raw: Option<&str>, section_count: usize) -> Result<Option<SceneRange>> {
    match raw {
        Some(raw) => Ok(Some(SceneRange::parse(raw, section_count)?)),
        None => Ok(None),
    }
}

fn attach_durations(mut phrases: Vec<Phrase>, paths: &ProjectPaths) -> Vec<Phrase> {
    for phrase in &mut phrases {
        let target = paths.phrase_wav(phrase.original_index);
        phrase.duration = crate::audio::wav_duration_seconds(&target).ok();
    }
    phrases
}

fn slide_relative_path(
    paths: &ProjectPaths,
    original_index: usize,
    lang_opt: Option<&str>,
    multilingual: bool,
) -> String {
    let path = paths.slide_png(original_index, lang_opt, multilingual);
    let mut parts: Vec<String> = Vec::new();
    let mut found = false;
    for comp in path.components() {
        let s = comp.as_os_str().to_string_lossy().to_string();
        if s == "slides" {
            found = true;
        }
        if found {
            parts.push(s);
        }
    }
    parts.join("/")
}
