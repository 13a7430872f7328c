//! Composition Builder (C7): pure, deterministic assembly of `composition.json`
//! (spec §4.7). The single source of truth for `composition.json`; no other
//! component writes it.

use crate::config::{Config, TransitionType};
use crate::paths::ProjectPaths;
use crate::persona::Persona;
use crate::phrase::Phrase;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionSpec {
    #[serde(rename = "type")]
    pub transition_type: String,
    pub duration_frames: u32,
    pub timing: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionPhrase {
    pub text: String,
    pub reading: Option<String>,
    pub audio_file: String,
    pub slide_file: String,
    pub duration_frames: u32,
    pub persona_id: Option<String>,
    pub persona_name: Option<String>,
    pub subtitle_color: Option<String>,
    pub character_image: Option<String>,
    pub mouth_open_image: Option<String>,
    pub eye_close_image: Option<String>,
    pub character_position: Option<String>,
    pub animation_style: Option<String>,
    pub background: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionData {
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub transition: TransitionSpec,
    pub background: Option<String>,
    pub bgm: Option<String>,
    pub phrases: Vec<CompositionPhrase>,
    pub total_frames: u32,
}

/// Slide file lookup is passed in rather than recomputed, since it depends on
/// multilingual routing (`slides/<lang>/`) decided by the caller.
pub fn build_composition(
    phrases: &[Phrase],
    config: &Config,
    personas: &[Persona],
    paths: &ProjectPaths,
    slide_for: impl Fn(&Phrase) -> String,
) -> CompositionData {
    let persona_by_id: HashMap<&str, &Persona> =
        personas.iter().map(|p| (p.id.as_str(), p)).collect();

    let fps = config.style.fps;
    let transition_frames = match config.video.transition.transition_type {
        TransitionType::None => 0,
        _ => config.video.transition.duration_frames,
    };

    let mut comp_phrases = Vec::with_capacity(phrases.len());
    let mut cursor_frame: i64 = 0;
    let mut prev_slide: Option<String> = None;
    let mut n_slide_changes = 0u32;
    let mut total_duration_frames: u32 = 0;

    for phrase in phrases {
        let duration_seconds = phrase.duration.unwrap_or(0.0);
        let duration_frames = (duration_seconds * fps as f64).round() as u32;
        total_duration_frames += duration_frames;

        let slide_file = slide_for(phrase);
        let slide_changed = prev_slide
            .as_ref()
            .map(|prev| prev != &slide_file)
            .unwrap_or(false);

        if slide_changed && transition_frames > 0 {
            cursor_frame -= transition_frames as i64;
            n_slide_changes += 1;
        }
        let start_frame = cursor_frame.max(0) as u32;
        cursor_frame = start_frame as i64 + duration_frames as i64;
        prev_slide = Some(slide_file.clone());

        let persona = persona_by_id.get(phrase.persona_id.as_str()).copied();
        let background = phrase
            .background_override
            .as_ref()
            .map(|b| b.path.clone())
            .or_else(|| config.video.background.clone());

        comp_phrases.push(CompositionPhrase {
            text: phrase.subtitle_text(),
            reading: if phrase.reading.is_empty() {
                None
            } else {
                Some(phrase.reading.clone())
            },
            audio_file: relative_to_public(&paths.phrase_wav(phrase.original_index)),
            slide_file,
            duration_frames,
            persona_id: persona.map(|p| p.id.clone()),
            persona_name: persona.map(|p| p.name.clone()),
            subtitle_color: persona
                .map(|p| p.subtitle_color.clone())
                .or_else(|| Some("#FFFFFF".to_string())),
            character_image: persona.and_then(|p| p.character_image.clone()),
            mouth_open_image: persona.and_then(|p| p.mouth_open_image.clone()),
            eye_close_image: persona.and_then(|p| p.eye_close_image.clone()),
            character_position: persona
                .and_then(|p| p.character_position)
                .map(|c| format!("{c:?}").to_lowercase()),
            animation_style: persona
                .and_then(|p| p.animation_style)
                .map(|a| format!("{a:?}").to_lowercase()),
            background,
        });

        let _ = start_frame; // recorded on the phrase by the orchestrator, not here
    }

    let total_frames = total_duration_frames.saturating_sub(n_slide_changes * transition_frames);

    CompositionData {
        fps,
        width: config.style.width,
        height: config.style.height,
        transition: TransitionSpec {
            transition_type: format!("{:?}", config.video.transition.transition_type).to_lowercase(),
            duration_frames: config.video.transition.duration_frames,
            timing: config.video.transition.timing.clone(),
        },
        background: config.video.background.clone(),
        bgm: config.video.bgm.clone(),
        phrases: comp_phrases,
        total_frames,
    }
}

fn relative_to_public(path: &std::path::Path) -> String {
    // Remotion's static root is `remotion/public/`; audio/slides are symlinked
    // there by C8, so only the trailing `audio/...` / `slides/...` segment matters.
    let mut components: Vec<String> = Vec::new();
    let mut found_root = false;
    for comp in path.components() {
        let s = comp.as_os_str().to_string_lossy().to_string();
        if s == "audio" || s == "slides" {
            found_root = true;
        }
        if found_root {
            components.push(s);
        }
    }
    components.join("/")
}
