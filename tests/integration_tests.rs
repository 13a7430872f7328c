//! Integration tests for narrator-forge
//!
//! These tests validate the integration between components without requiring
//! external API keys or the Node/Remotion render toolchain.

use narrator_forge::composition::build_composition;
use narrator_forge::config::{Config, TransitionType};
use narrator_forge::paths::ProjectPaths;
use narrator_forge::persona::{self, Persona, SynthesizerConfig};
use narrator_forge::phrase::Phrase;
use narrator_forge::scene_range::SceneRange;
use narrator_forge::script::parse::{parse_script_response, validate_script};
use narrator_forge::script::VideoScript;
use narrator_forge::segment::{segment, SegmentConfig};

// ============================================================================
// Config Integration Tests
// ============================================================================

mod config_tests {
    use super::*;
    use std::io::Write;

    fn write_sample_config(dir: &std::path::Path) -> std::path::PathBuf {
        let path = dir.join("config.yaml");
        let yaml = Config::sample().to_yaml().unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        path
    }

    #[test]
    fn load_applies_env_overrides_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_sample_config(dir.path());

        // SAFETY: test runs single-threaded w.r.t. these vars within this process.
        std::env::set_var("PROJECT_ROOT", dir.path());
        std::env::set_var("OPENROUTER_API_KEY", "env-key");
        let config = Config::load(&config_path).unwrap();
        std::env::remove_var("PROJECT_ROOT");
        std::env::remove_var("OPENROUTER_API_KEY");

        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.project.output_dir, dir.path().join("projects/my-video"));
    }

    #[test]
    fn load_without_api_key_env_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = write_sample_config(dir.path());

        std::env::remove_var("OPENROUTER_API_KEY");
        let config = Config::load(&config_path).unwrap();
        assert!(config.validate().is_err());

        let config = config.with_api_key_override(Some("cli-key".to_string()));
        assert!(config.validate().is_ok());
    }
}

// ============================================================================
// Persona Pool <-> Config Validation Integration
// ============================================================================

mod persona_pool_tests {
    use super::*;
    use narrator_forge::persona::PersonaPoolConfig;

    fn persona(id: &str) -> Persona {
        Persona {
            id: id.to_string(),
            name: id.to_string(),
            character: "a character".to_string(),
            synthesizer: SynthesizerConfig::Voicevox {
                speaker_id: 1,
                speed_scale: 1.0,
            },
            subtitle_color: "#FFFFFF".to_string(),
            character_image: None,
            mouth_open_image: None,
            eye_close_image: None,
            character_position: None,
            animation_style: None,
        }
    }

    #[test]
    fn pool_count_exceeding_roster_fails_config_validation() {
        let mut config = Config::sample();
        config.api_key = Some("k".to_string());
        config.personas = vec![persona("a"), persona("b")];
        config.persona_pool = Some(PersonaPoolConfig {
            enabled: true,
            count: 5,
            seed: Some(1),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn sampled_pool_respects_configured_count_and_is_reproducible() {
        let roster: Vec<Persona> = (0..6).map(|i| persona(&format!("p{i}"))).collect();
        let first = persona::sample(&roster, 3, Some(7)).unwrap();
        let second = persona::sample(&roster, 3, Some(7)).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(
            first.iter().map(|p| &p.id).collect::<Vec<_>>(),
            second.iter().map(|p| &p.id).collect::<Vec<_>>()
        );
    }
}

// ============================================================================
// Script Parse -> YAML Round-Trip -> Structural Validation
// ============================================================================

mod script_roundtrip_tests {
    use super::*;

    fn personas() -> Vec<Persona> {
        vec![Persona {
            id: "narrator".to_string(),
            name: "Narrator".to_string(),
            character: "calm narrator".to_string(),
            synthesizer: SynthesizerConfig::Voicevox {
                speaker_id: 3,
                speed_scale: 1.0,
            },
            subtitle_color: "#FFFFFF".to_string(),
            character_image: None,
            mouth_open_image: None,
            eye_close_image: None,
            character_position: None,
            animation_style: None,
        }]
    }

    fn raw_llm_response() -> &'static str {
        r#"```json
        {
            "title": "Web3 basics",
            "description": "An intro to web3",
            "sections": [
                {
                    "title": "Intro",
                    "slide_prompt": "Abstract web3 illustration",
                    "narrations": [
                        {"text": "Web3って難しい。", "reading": "ウェブスリー ッテ ムズカシイ"}
                    ]
                },
                {
                    "title": "Wrap-up",
                    "slide_prompt": "A handshake",
                    "narrations": [
                        {"text": "でも大丈夫！", "reading": "デモ ダイジョウブ"}
                    ]
                }
            ]
        }
        ```"#
    }

    #[test]
    fn script_survives_a_disk_round_trip_and_passes_validation() {
        let personas = personas();
        let script = parse_script_response(raw_llm_response(), &personas).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("script.yaml");
        std::fs::write(&script_path, serde_yaml::to_string(&script).unwrap()).unwrap();

        let reloaded: VideoScript =
            serde_yaml::from_str(&std::fs::read_to_string(&script_path).unwrap()).unwrap();

        assert_eq!(reloaded.title, script.title);
        assert_eq!(reloaded.total_narrations(), 2);
        assert!(validate_script(&reloaded, &personas).is_ok());
    }

    #[test]
    fn validate_script_catches_drift_introduced_after_hand_editing() {
        let personas = personas();
        let mut script = parse_script_response(raw_llm_response(), &personas).unwrap();
        // Simulate a user hand-editing the YAML to reference a persona that
        // no longer exists in the project config.
        script.sections[0].narrations[0].persona_id = Some("deleted-persona".to_string());
        assert!(validate_script(&script, &personas).is_err());
    }
}

// ============================================================================
// Script -> Segmentation -> Composition, with Scene-Range Filtering
// ============================================================================

mod composition_pipeline_tests {
    use super::*;

    fn personas() -> Vec<Persona> {
        vec![Persona {
            id: "narrator".to_string(),
            name: "Narrator".to_string(),
            character: "calm narrator".to_string(),
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
        }]
    }

    fn three_section_script() -> VideoScript {
        let json = r#"{
            "title": "t", "description": "d",
            "sections": [
                {"title": "s1", "slide_prompt": "p1",
                    "narrations": [{"text": "一文目。", "reading": "イチブンメ"}]},
                {"title": "s2", "slide_prompt": "p2",
                    "narrations": [{"text": "二文目。", "reading": "ニブンメ"}]},
                {"title": "s3", "slide_prompt": "p3",
                    "narrations": [{"text": "三文目。", "reading": "サンブンメ"}]}
            ]
        }"#;
        parse_script_response(json, &personas()).unwrap()
    }

    /// Mirrors the orchestrator's own phrase-assembly shape closely enough to
    /// exercise the public segmentation + composition seam end to end.
    fn build_phrases(script: &VideoScript, range: &Option<SceneRange>) -> Vec<Phrase> {
        let config = SegmentConfig::default();
        let mut phrases = Vec::new();
        let mut next_index = 0usize;
        for (section_index, section) in script.sections.iter().enumerate() {
            for narration in &section.narrations {
                for seg in segment(&narration.text, &config) {
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
                        persona_id: narration.persona_id.clone().unwrap_or_default(),
                        persona_name: "Narrator".to_string(),
                        text: seg.text,
                        reading: narration.reading.clone(),
                        duration: Some(1.0),
                        start_frame: None,
                        background_override: section.background.clone(),
                    });
                }
            }
        }
        phrases
    }

    #[test]
    fn scene_range_filters_phrases_without_renumbering_original_index() {
        let script = three_section_script();
        let range = SceneRange::parse("2-3", script.sections.len()).unwrap();
        let phrases = build_phrases(&script, &Some(range));

        // One phrase per section; sections 2 and 3 keep their pre-filter
        // original_index of 1 and 2 respectively.
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].original_index, 1);
        assert_eq!(phrases[1].original_index, 2);
    }

    #[test]
    fn filtered_phrases_build_a_consistent_composition() {
        let script = three_section_script();
        let range = SceneRange::parse("1", script.sections.len()).unwrap();
        let phrases = build_phrases(&script, &Some(range));
        assert_eq!(phrases.len(), 1, "only section 1 survives the filter");

        let mut config = Config::sample();
        config.video.transition.transition_type = TransitionType::None;
        let personas = personas();
        let paths = ProjectPaths::new("/tmp/narrator-forge-it");

        let composition = build_composition(&phrases, &config, &personas, &paths, |p| {
            format!("slides/slide_{:04}.png", p.section_index)
        });

        assert_eq!(composition.phrases.len(), 1);
        assert_eq!(composition.phrases[0].subtitle_color.as_deref(), Some("#8FCF4F"));
        // No slide change, no transition configured.
        assert_eq!(composition.total_frames, (1.0 * config.style.fps as f64) as u32);
    }
}
