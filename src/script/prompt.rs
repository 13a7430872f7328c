//! Prompt assembly for the script-generation LLM call (spec §4.2).
//!
//! Template-based with four variants (single/dialogue × ja/en) sharing the
//! common instruction blocks, mirroring how the teacher's `translate/gemini.rs`
//! and `transcribe/gemini.rs` both build a prompt string via straight-line
//! `push_str` assembly rather than an external template engine.

use crate::config::NarrationMode;
use crate::persona::Persona;
use crate::script::fetch::{FetchedContent, ImageMetadata};

pub struct PromptInput<'a> {
    pub content: &'a FetchedContent,
    pub language: &'a str,
    pub mode: NarrationMode,
    pub personas: &'a [Persona],
}

pub fn build_prompt(input: &PromptInput) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "You are writing a narrated slide video script in {}.\n\n",
        language_name(input.language)
    ));
    prompt.push_str("Source content:\n");
    prompt.push_str(&format!("Title: {}\n", input.content.title));
    prompt.push_str(&format!("Body: {}\n\n", input.content.body));

    push_output_schema(&mut prompt, input.mode);
    push_reading_requirements(&mut prompt);
    push_sokuon_examples(&mut prompt);
    push_image_selection_criteria(&mut prompt, &input.content.images);
    push_storytelling_scaffold(&mut prompt);

    if matches!(input.mode, NarrationMode::Dialogue) {
        push_dialogue_instructions(&mut prompt, input.personas);
    }

    push_self_evaluation_checklist(&mut prompt);

    prompt
}

fn language_name(code: &str) -> &'static str {
    match code {
        "ja" => "Japanese",
        "en" => "English",
        _ => "the target language",
    }
}

fn push_output_schema(prompt: &mut String, mode: NarrationMode) {
    prompt.push_str("Respond with JSON only, matching this schema:\n");
    prompt.push_str("{\n");
    prompt.push_str("  \"title\": string,\n");
    prompt.push_str("  \"description\": string,\n");
    if matches!(mode, NarrationMode::Dialogue) {
        prompt.push_str("  \"role_assignments\": [{\"persona_id\": string, \"role\": string, \"description\": string}],\n");
    }
    prompt.push_str("  \"sections\": [\n");
    prompt.push_str("    {\n");
    prompt.push_str("      \"title\": string,\n");
    prompt.push_str("      \"slide_prompt\": string?,\n");
    prompt.push_str("      \"source_image_url\": string?,\n");
    prompt.push_str("      \"narrations\": [\n");
    prompt.push_str("        {\n");
    if matches!(mode, NarrationMode::Dialogue) {
        prompt.push_str("          \"persona_id\": string,\n");
    }
    prompt.push_str("          \"text\": string,\n");
    prompt.push_str("          \"reading\": string  // required, non-empty\n");
    prompt.push_str("        }\n");
    prompt.push_str("      ]\n");
    prompt.push_str("    }\n");
    prompt.push_str("  ]\n");
    prompt.push_str("}\n\n");
}

fn push_reading_requirements(prompt: &mut String) {
    prompt.push_str("CRITICAL: every narration must include an accurate katakana `reading`.\n");
    prompt.push_str("Reading rules: render sokuon (small ッ) wherever the spoken form has a\n");
    prompt.push_str("geminate consonant; render the particle は as ワ, へ as エ, を as オ; insert\n");
    prompt.push_str("a space at word and particle boundaries so the synthesizer pauses naturally.\n\n");
}

fn push_sokuon_examples(prompt: &mut String) {
    prompt.push_str("Correct sokuon examples:\n");
    for (surface, reading) in [
        ("やった", "ヤッタ"),
        ("がっこう", "ガッコウ"),
        ("けっこん", "ケッコン"),
        ("しっかり", "シッカリ"),
        ("ちょっと", "チョット"),
        ("きって", "キッテ"),
        ("もっと", "モット"),
        ("きっぷ", "キップ"),
        ("ずっと", "ズット"),
    ] {
        prompt.push_str(&format!("  {surface} -> {reading}\n"));
    }
    prompt.push_str("Incorrect (do not produce):\n");
    prompt.push_str("  やった -> ヤツタ (missing sokuon)\n");
    prompt.push_str("  がっこう -> ガツコウ (full-size ツ instead of small ッ)\n\n");
}

fn push_image_selection_criteria(prompt: &mut String, images: &[ImageMetadata]) {
    prompt.push_str("Available source images:\n");
    for img in images {
        prompt.push_str(&format!(
            "  url={} alt={:?} title={:?} aria_describedby={:?}\n",
            img.resolved_url, img.alt, img.title, img.aria_describedby
        ));
    }
    prompt.push_str(
        "Set a section's source_image_url ONLY when its alt, title, AND aria-describedby\n",
    );
    prompt.push_str(
        "jointly and directly describe that section's content; otherwise omit it and set\n",
    );
    prompt.push_str("slide_prompt instead.\n\n");
}

fn push_storytelling_scaffold(prompt: &mut String) {
    prompt.push_str("Structure the narration as a story: open with a hook, then follow\n");
    prompt.push_str("起承転結 (setup, development, twist, conclusion), with a clear\n");
    prompt.push_str("transition sentence connecting each section to the next.\n\n");
}

fn push_dialogue_instructions(prompt: &mut String, personas: &[Persona]) {
    prompt.push_str("This is a dialogue between personas:\n");
    for p in personas {
        prompt.push_str(&format!("  {} ({}): {}\n", p.id, p.name, p.character));
    }
    prompt.push_str(
        "Assign every narration's persona_id to one of the ids above, and emit\n",
    );
    prompt.push_str("role_assignments describing each persona's conversational function.\n\n");
}

fn push_self_evaluation_checklist(prompt: &mut String) {
    prompt.push_str("Before responding, verify:\n");
    prompt.push_str("- every narration has a non-empty `reading`\n");
    prompt.push_str("- every section has exactly one of slide_prompt / source_image_url\n");
    prompt.push_str("- JSON is valid and matches the schema exactly\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::SynthesizerConfig;

    fn content() -> FetchedContent {
        FetchedContent {
            title: "Web3 basics".to_string(),
            body: "Web3 is a broad term.".to_string(),
            images: vec![],
        }
    }

    #[test]
    fn single_mode_prompt_omits_persona_id_field() {
        let personas = vec![];
        let input = PromptInput {
            content: &content(),
            language: "ja",
            mode: NarrationMode::Single,
            personas: &personas,
        };
        let prompt = build_prompt(&input);
        assert!(prompt.contains("reading"));
        assert!(!prompt.contains("role_assignments"));
    }

    #[test]
    fn dialogue_mode_prompt_includes_persona_roster() {
        let personas = vec![Persona {
            id: "zundamon".to_string(),
            name: "Zundamon".to_string(),
            character: "energetic mascot".to_string(),
            synthesizer: SynthesizerConfig::Voicevox {
                speaker_id: 3,
                speed_scale: 1.0,
            },
            subtitle_color: "#8FCF4F".to_string(),
            character_image: None,
            mouth_open_image: None,
            eye_close_image: None,
            character_position: None,
            animation_style: None,
        }];
        let input = PromptInput {
            content: &content(),
            language: "en",
            mode: NarrationMode::Dialogue,
            personas: &personas,
        };
        let prompt = build_prompt(&input);
        assert!(prompt.contains("role_assignments"));
        assert!(prompt.contains("zundamon"));
    }

    #[test]
    fn includes_sokuon_examples() {
        let personas = vec![];
        let input = PromptInput {
            content: &content(),
            language: "ja",
            mode: NarrationMode::Single,
            personas: &personas,
        };
        let prompt = build_prompt(&input);
        assert!(prompt.contains("ヤッタ"));
        assert!(prompt.contains("ヤツタ"));
    }
}
