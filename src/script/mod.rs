//! Script Synthesizer (C2): data model, prompt assembly, content fetching,
//! and response parsing (spec §4.2, §3).

pub mod fetch;
pub mod llm;
pub mod parse;
pub mod prompt;

pub use fetch::{ContentFetcher, FetchedContent, HttpContentFetcher, ImageMetadata};
pub use llm::{LanguageModel, OpenRouterClient};
pub use parse::parse_script_response;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundFit {
    Cover,
    Contain,
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundKind {
    Image,
    Video,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(rename = "type")]
    pub kind: BackgroundKind,
    pub path: String,
    pub fit: BackgroundFit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<String>,
    pub text: String,
    pub reading: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSection {
    pub title: String,
    pub narrations: Vec<Narration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundConfig>,
}

impl ScriptSection {
    /// A section is valid only when exactly one slide source is given.
    pub fn has_valid_slide_source(&self) -> bool {
        self.slide_prompt.is_some() != self.source_image_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub persona_id: String,
    pub role: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoScript {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_assignments: Option<Vec<RoleAssignment>>,
    pub sections: Vec<ScriptSection>,
}

impl VideoScript {
    pub fn total_narrations(&self) -> usize {
        self.sections.iter().map(|s| s.narrations.len()).sum()
    }
}
