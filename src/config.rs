use crate::error::{Result, VideoGenError};
use crate::persona::{Persona, PersonaPoolConfig};
use crate::pronunciation::DictionaryEntry;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrationMode {
    Single,
    Dialogue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionType {
    None,
    Fade,
    Slide,
    Wipe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
}

fn default_width() -> u32 {
    1920
}
fn default_height() -> u32 {
    1080
}
fn default_fps() -> u32 {
    30
}
fn default_crf() -> u32 {
    23
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    pub languages: Vec<String>,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    pub mode: NarrationMode,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub dict_dir: PathBuf,
    pub model_path: PathBuf,
    #[serde(default)]
    pub enable_furigana: bool,
    #[serde(default)]
    pub pronunciation_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidesConfig {
    pub llm: LlmConfig,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_slide_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
}

fn default_max_concurrent() -> usize {
    3
}
fn default_slide_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    pub duration_frames: u32,
    #[serde(default)]
    pub timing: Option<String>,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            transition_type: TransitionType::None,
            duration_frames: 0,
            timing: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    pub renderer: String,
    #[serde(default)]
    pub transition: TransitionConfig,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub bgm: Option<String>,
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,
    #[serde(default = "default_render_timeout")]
    pub render_timeout_seconds: u64,
}

fn default_render_concurrency() -> usize {
    2
}
fn default_render_timeout() -> u64 {
    600
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PronunciationConfig {
    #[serde(default)]
    pub custom: Vec<DictionaryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub style: StyleConfig,
    pub content: ContentConfig,
    pub narration: NarrationConfig,
    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub persona_pool: Option<PersonaPoolConfig>,
    pub audio: AudioConfig,
    pub slides: SlidesConfig,
    pub video: VideoConfig,
    #[serde(default)]
    pub pronunciation: PronunciationConfig,

    /// Resolved from `OPENROUTER_API_KEY` / `--api-key`, never persisted.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Resolved from `FIRECRAWL_API_KEY`, only required when MCP fetching is used.
    #[serde(skip)]
    pub firecrawl_api_key: Option<String>,
}

impl Config {
    /// Load from a YAML file, then apply environment variable overrides,
    /// following the teacher's file-then-env pattern.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&contents)?;

        if let Ok(root) = std::env::var("PROJECT_ROOT") {
            config.project.output_dir = PathBuf::from(root).join(&config.project.output_dir);
        }
        if let Ok(key) = std::env::var("OPENROUTER_API_KEY") {
            config.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("FIRECRAWL_API_KEY") {
            config.firecrawl_api_key = Some(key);
        }

        Ok(config)
    }

    pub fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        if let Some(key) = api_key {
            self.api_key = Some(key);
        }
        self
    }

    /// Validate the full config tree. Errors cite the offending field, per
    /// spec §6, and fail loudly rather than silently substituting defaults.
    pub fn validate(&self) -> Result<()> {
        crate::persona::validate_personas(&self.personas)?;

        if let Some(pool) = &self.persona_pool {
            if pool.enabled {
                if pool.count == 0 {
                    return Err(VideoGenError::Configuration(
                        "persona_pool.count must be >= 1".to_string(),
                    ));
                }
                if pool.count > self.personas.len() {
                    return Err(VideoGenError::Configuration(format!(
                        "persona_pool.count ({}) exceeds configured personas ({})",
                        pool.count,
                        self.personas.len()
                    )));
                }
            }
        }

        if self.content.languages.is_empty() {
            return Err(VideoGenError::Configuration(
                "content.languages must list at least one language".to_string(),
            ));
        }
        for lang in &self.content.languages {
            if lang != "ja" && lang != "en" {
                return Err(VideoGenError::Configuration(format!(
                    "content.languages: unsupported language '{lang}' (only ja, en are supported)"
                )));
            }
        }

        if matches!(self.narration.mode, NarrationMode::Dialogue) && self.personas.len() < 2 {
            return Err(VideoGenError::Configuration(
                "narration.mode=dialogue requires at least 2 personas".to_string(),
            ));
        }

        if self.slides.max_concurrent == 0 || self.slides.max_concurrent > 10 {
            return Err(VideoGenError::Configuration(
                "slides.max_concurrent must be between 1 and 10".to_string(),
            ));
        }

        if self.style.width == 0 || self.style.height == 0 || self.style.fps == 0 {
            return Err(VideoGenError::Configuration(
                "style.width, style.height, and style.fps must be positive".to_string(),
            ));
        }

        if self.api_key.is_none() {
            return Err(VideoGenError::Configuration(
                "OPENROUTER_API_KEY not set. Set the environment variable or pass --api-key"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Serialize back to YAML, used by `config init` and round-trip tests (L1).
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// A fully-populated, placeholder-valued config emitted by `config init`,
    /// meant to be edited in place rather than used as-is.
    pub fn sample() -> Self {
        Self {
            project: ProjectConfig {
                name: "my-video".to_string(),
                output_dir: PathBuf::from("projects/my-video"),
            },
            style: StyleConfig::default(),
            content: ContentConfig {
                languages: vec!["ja".to_string()],
                llm: LlmConfig {
                    model: "openai/gpt-4o".to_string(),
                    base_url: None,
                },
            },
            narration: NarrationConfig {
                mode: NarrationMode::Single,
                style: None,
            },
            personas: vec![Persona {
                id: "narrator".to_string(),
                name: "Narrator".to_string(),
                character: "a calm, knowledgeable narrator".to_string(),
                synthesizer: crate::persona::SynthesizerConfig::Voicevox {
                    speaker_id: 3,
                    speed_scale: 1.0,
                },
                subtitle_color: "#FFFFFF".to_string(),
                character_image: None,
                mouth_open_image: None,
                eye_close_image: None,
                character_position: None,
                animation_style: None,
            }],
            persona_pool: None,
            audio: AudioConfig {
                dict_dir: PathBuf::from("dict"),
                model_path: PathBuf::from("models"),
                enable_furigana: false,
                pronunciation_model: None,
            },
            slides: SlidesConfig {
                llm: LlmConfig {
                    model: "openai/gpt-4o".to_string(),
                    base_url: None,
                },
                max_concurrent: default_max_concurrent(),
                max_retries: default_slide_retries(),
                retry_delay: default_retry_delay(),
            },
            video: VideoConfig {
                renderer: "remotion".to_string(),
                transition: TransitionConfig::default(),
                background: None,
                bgm: None,
                render_concurrency: default_render_concurrency(),
                render_timeout_seconds: default_render_timeout(),
            },
            pronunciation: PronunciationConfig::default(),
            api_key: None,
            firecrawl_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::SynthesizerConfig;

    fn sample_config() -> Config {
        Config {
            project: ProjectConfig {
                name: "demo".to_string(),
                output_dir: PathBuf::from("projects/demo"),
            },
            style: StyleConfig::default(),
            content: ContentConfig {
                languages: vec!["ja".to_string()],
                llm: LlmConfig {
                    model: "gpt-4".to_string(),
                    base_url: None,
                },
            },
            narration: NarrationConfig {
                mode: NarrationMode::Single,
                style: None,
            },
            personas: vec![Persona {
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
            }],
            persona_pool: None,
            audio: AudioConfig {
                dict_dir: PathBuf::from("dict"),
                model_path: PathBuf::from("models"),
                enable_furigana: false,
                pronunciation_model: None,
            },
            slides: SlidesConfig {
                llm: LlmConfig {
                    model: "dall-e-3".to_string(),
                    base_url: None,
                },
                max_concurrent: 3,
                max_retries: 3,
                retry_delay: 1000,
            },
            video: VideoConfig {
                renderer: "remotion".to_string(),
                transition: TransitionConfig::default(),
                background: None,
                bgm: None,
                render_concurrency: 2,
                render_timeout_seconds: 600,
            },
            pronunciation: PronunciationConfig::default(),
            api_key: Some("test-key".to_string()),
            firecrawl_api_key: None,
        }
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_api_key() {
        let mut config = sample_config();
        config.api_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unsupported_language() {
        let mut config = sample_config();
        config.content.languages = vec!["fr".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_dialogue_mode_with_one_persona() {
        let mut config = sample_config();
        config.narration.mode = NarrationMode::Dialogue;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sample_config_serializes_and_parses_back() {
        let yaml = Config::sample().to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "my-video");
    }

    #[test]
    fn l1_round_trips_through_yaml() {
        let config = sample_config();
        let yaml = config.to_yaml().unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, config.project.name);
        assert_eq!(parsed.personas.len(), config.personas.len());
        assert_eq!(parsed.video.transition.duration_frames, config.video.transition.duration_frames);
    }
}
