//! Pure parsing of the script LLM's JSON response into a `VideoScript`
//! (spec §4.2 "Response parsing"). No I/O.

use crate::error::{Result, VideoGenError};
use crate::persona::Persona;
use crate::script::{Narration, VideoScript};
use std::collections::HashSet;

/// Extract a JSON object from `raw`, tolerating a markdown code fence around it
/// (a common LLM habit), then validate and normalize it per spec §4.2.
pub fn parse_script_response(raw: &str, personas: &[Persona]) -> Result<VideoScript> {
    let json_text = extract_json_block(raw);
    let mut script: VideoScript = serde_json::from_str(json_text).map_err(|e| {
        VideoGenError::ScriptGeneration(format!("failed to parse script JSON: {e}"))
    })?;

    let known_ids: HashSet<&str> = personas.iter().map(|p| p.id.as_str()).collect();
    let single_persona = personas.len() == 1;

    for section in &mut script.sections {
        if !section.has_valid_slide_source() {
            return Err(VideoGenError::ScriptGeneration(format!(
                "section '{}' must set exactly one of slide_prompt / source_image_url",
                section.title
            )));
        }

        for narration in &mut section.narrations {
            if narration.reading.trim().is_empty() {
                return Err(VideoGenError::ScriptGeneration(format!(
                    "section '{}': narration '{}' is missing a non-empty reading",
                    section.title, narration.text
                )));
            }

            resolve_persona_id(narration, single_persona, personas, &known_ids, &section.title)?;
        }
    }

    Ok(script)
}

fn resolve_persona_id(
    narration: &mut Narration,
    single_persona: bool,
    personas: &[Persona],
    known_ids: &HashSet<&str>,
    section_title: &str,
) -> Result<()> {
    match &narration.persona_id {
        Some(id) => {
            if !known_ids.contains(id.as_str()) {
                let known: Vec<&str> = known_ids.iter().copied().collect();
                return Err(VideoGenError::ScriptGeneration(format!(
                    "section '{section_title}': unknown persona_id '{id}' (known: {known:?})"
                )));
            }
        }
        None => {
            if single_persona {
                narration.persona_id = Some(personas[0].id.clone());
            } else {
                return Err(VideoGenError::ScriptGeneration(format!(
                    "section '{section_title}': persona_id is required in dialogue mode with multiple personas"
                )));
            }
        }
    }
    Ok(())
}

/// Structural validation of an already-generated script loaded from disk
/// (`script validate`). Unlike `parse_script_response`, this never mutates
/// `persona_id` — a script on disk is expected to already have it resolved.
pub fn validate_script(script: &VideoScript, personas: &[Persona]) -> Result<()> {
    let known_ids: HashSet<&str> = personas.iter().map(|p| p.id.as_str()).collect();

    for section in &script.sections {
        if !section.has_valid_slide_source() {
            return Err(VideoGenError::ScriptGeneration(format!(
                "section '{}' must set exactly one of slide_prompt / source_image_url",
                section.title
            )));
        }

        for narration in &section.narrations {
            if narration.reading.trim().is_empty() {
                return Err(VideoGenError::ScriptGeneration(format!(
                    "section '{}': narration '{}' is missing a non-empty reading",
                    section.title, narration.text
                )));
            }
            if let Some(id) = &narration.persona_id {
                if !known_ids.contains(id.as_str()) {
                    return Err(VideoGenError::ScriptGeneration(format!(
                        "section '{}': unknown persona_id '{id}'",
                        section.title
                    )));
                }
            }
        }
    }

    Ok(())
}

fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    trimmed
}
