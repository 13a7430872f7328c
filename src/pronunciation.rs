//! Pronunciation Resolver (C4): merges manual, LLM-verified, and morphological
//! readings into a single dictionary consumed by the synthesizer (spec §4.4).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{Result, VideoGenError};
use crate::script::llm::LanguageModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WordType {
    ProperNoun,
    CommonNoun,
    Verb,
    Adjective,
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub surface: String,
    pub reading: String,
    pub accent_type: u32,
    pub word_type: WordType,
    pub priority: u8,
}

pub const PRIORITY_MANUAL: u8 = 10;
pub const PRIORITY_LLM_VERIFIED: u8 = 7;
pub const PRIORITY_MORPHOLOGICAL: u8 = 5;

/// Ordered pronunciation dictionary. Insertion order is preserved for tie-breaks.
#[derive(Debug, Default, Clone)]
pub struct PronunciationDictionary {
    entries: Vec<DictionaryEntry>,
    index: HashMap<String, usize>,
}

impl PronunciationDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, resolving conflicts by priority; ties keep the first insert.
    pub fn insert(&mut self, entry: DictionaryEntry) {
        match self.index.get(&entry.surface).copied() {
            Some(i) => {
                if entry.priority > self.entries[i].priority {
                    self.entries[i] = entry;
                }
                // equal or lower priority: existing entry retained.
            }
            None => {
                self.index.insert(entry.surface.clone(), self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    pub fn get(&self, surface: &str) -> Option<&DictionaryEntry> {
        self.index.get(surface).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A surface token paired with the morphological analyzer's candidate reading,
/// found in text whose phrase-level `reading` was missing or empty.
#[derive(Debug, Clone)]
pub struct CandidateToken {
    pub surface: String,
    pub morphological_reading: String,
    pub context: String,
}

/// Morphological analysis over raw text. Grounded on the pool's need for an
/// offline fallback when a narration carries no `reading`.
pub trait MorphologicalAnalyzer: Send + Sync {
    fn analyze(&self, text: &str) -> Vec<CandidateToken>;
}

/// LLM-based reading verification for ambiguous kanji/ASCII tokens.
#[async_trait]
pub trait ReadingVerifier: Send + Sync {
    async fn verify(&self, tokens: &[CandidateToken]) -> Result<Vec<String>>;
}

fn sanitize_reading(raw: &str) -> String {
    raw.chars()
        .filter(|c| {
            let is_katakana = matches!(*c, '\u{30A0}'..='\u{30FF}');
            is_katakana || *c == 'ー'
        })
        .collect()
}

/// Run the morphological + LLM fallback pass over phrases whose `reading` is
/// empty, registering results in `dict`. Failure of the LLM step falls back to
/// the raw morphological readings and logs a warning; it is never silent.
pub async fn resolve_fallback(
    dict: &mut PronunciationDictionary,
    analyzer: &dyn MorphologicalAnalyzer,
    verifier: Option<&dyn ReadingVerifier>,
    texts_missing_reading: &[String],
) -> Result<()> {
    let mut candidates = Vec::new();
    for text in texts_missing_reading {
        candidates.extend(analyzer.analyze(text));
    }
    if candidates.is_empty() {
        return Ok(());
    }

    let verified = match verifier {
        Some(v) => match v.verify(&candidates).await {
            Ok(readings) if readings.len() == candidates.len() => Some(readings),
            Ok(_) => {
                warn!("pronunciation verifier returned mismatched token count, falling back to morphological readings");
                None
            }
            Err(e) => {
                warn!("pronunciation LLM verification failed, falling back to morphological readings: {e}");
                None
            }
        },
        None => None,
    };

    for (i, token) in candidates.into_iter().enumerate() {
        let (reading, priority) = match &verified {
            Some(readings) => (sanitize_reading(&readings[i]), PRIORITY_LLM_VERIFIED),
            None => (
                sanitize_reading(&token.morphological_reading),
                PRIORITY_MORPHOLOGICAL,
            ),
        };
        if reading.is_empty() {
            continue;
        }
        dict.insert(DictionaryEntry {
            surface: token.surface,
            reading,
            accent_type: 0,
            word_type: WordType::CommonNoun,
            priority,
        });
    }

    Ok(())
}

/// Substitute every dictionary surface found in `text` with its resolved
/// reading, longest surface first so multi-kanji entries win over any
/// single-kanji entry they contain. Leaves unmatched text untouched.
pub fn apply_dictionary(dict: &PronunciationDictionary, text: &str) -> String {
    let mut entries: Vec<&DictionaryEntry> = dict.entries().iter().collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.surface.chars().count()));

    let mut result = text.to_string();
    for entry in entries {
        if result.contains(&entry.surface) {
            result = result.replace(entry.surface.as_str(), &entry.reading);
        }
    }
    result
}

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// Offline tokenizer: segments text into maximal runs of kanji characters,
/// the spots a `reading` field can't cover with plain kana. No morphological
/// dictionary is bundled; `morphological_reading` is left empty when the run
/// isn't in `known_readings`, and resolution then falls to the LLM verifier.
pub struct KanjiRunAnalyzer {
    known_readings: HashMap<String, String>,
}

impl KanjiRunAnalyzer {
    pub fn new(known_readings: HashMap<String, String>) -> Self {
        Self { known_readings }
    }
}

impl Default for KanjiRunAnalyzer {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl MorphologicalAnalyzer for KanjiRunAnalyzer {
    fn analyze(&self, text: &str) -> Vec<CandidateToken> {
        let mut tokens = Vec::new();
        let mut run = String::new();

        let flush = |run: &mut String, tokens: &mut Vec<CandidateToken>| {
            if run.is_empty() {
                return;
            }
            let morphological_reading = self.known_readings.get(run.as_str()).cloned().unwrap_or_default();
            tokens.push(CandidateToken {
                surface: std::mem::take(run),
                morphological_reading,
                context: text.to_string(),
            });
        };

        for c in text.chars() {
            if is_kanji(c) {
                run.push(c);
            } else {
                flush(&mut run, &mut tokens);
            }
        }
        flush(&mut run, &mut tokens);

        tokens
    }
}

/// LLM-backed verifier that reuses the script-generation language model to
/// produce a katakana reading per candidate token, grounded on the same
/// single-call `LanguageModel::complete` the script stage uses.
pub struct LlmReadingVerifier {
    model: std::sync::Arc<dyn LanguageModel>,
}

impl LlmReadingVerifier {
    pub fn new(model: std::sync::Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

fn build_verification_prompt(tokens: &[CandidateToken]) -> String {
    let mut prompt = String::from(
        "For each Japanese word below, give its reading as katakana only (no kanji, no okurigana, no punctuation). \
         Use the surrounding sentence to disambiguate. Respond with a JSON array of strings, one reading per word, \
         in the same order, and nothing else.\n\n",
    );
    for (i, token) in tokens.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. word: \"{}\" sentence: \"{}\"\n",
            i + 1,
            token.surface,
            token.context
        ));
    }
    prompt
}

fn extract_json_array(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_fence = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed)
        .trim_end_matches("```")
        .trim();
    match (without_fence.find('['), without_fence.rfind(']')) {
        (Some(start), Some(end)) if start < end => &without_fence[start..=end],
        _ => without_fence,
    }
}

#[async_trait]
impl ReadingVerifier for LlmReadingVerifier {
    async fn verify(&self, tokens: &[CandidateToken]) -> Result<Vec<String>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let prompt = build_verification_prompt(tokens);
        let raw = self.model.complete(&prompt).await?;
        let json_text = extract_json_array(&raw);
        serde_json::from_str(json_text)
            .map_err(|e| VideoGenError::Mcp(format!("pronunciation verifier returned invalid JSON: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(surface: &str, reading: &str, priority: u8) -> DictionaryEntry {
        DictionaryEntry {
            surface: surface.to_string(),
            reading: reading.to_string(),
            accent_type: 0,
            word_type: WordType::CommonNoun,
            priority,
        }
    }

    #[test]
    fn p8_higher_priority_wins() {
        let mut dict = PronunciationDictionary::new();
        dict.insert(entry("東京", "トウキョウ", PRIORITY_MORPHOLOGICAL));
        dict.insert(entry("東京", "トーキョー", PRIORITY_MANUAL));
        assert_eq!(dict.get("東京").unwrap().reading, "トーキョー");
    }

    #[test]
    fn equal_priority_keeps_first_inserted() {
        let mut dict = PronunciationDictionary::new();
        dict.insert(entry("東京", "トウキョウ", PRIORITY_MORPHOLOGICAL));
        dict.insert(entry("東京", "トーキョー", PRIORITY_MORPHOLOGICAL));
        assert_eq!(dict.get("東京").unwrap().reading, "トウキョウ");
    }

    #[test]
    fn sanitize_reading_strips_non_katakana() {
        assert_eq!(sanitize_reading(" トウキョウ123 "), "トウキョウ");
    }

    struct StubAnalyzer;
    impl MorphologicalAnalyzer for StubAnalyzer {
        fn analyze(&self, _text: &str) -> Vec<CandidateToken> {
            vec![CandidateToken {
                surface: "難しい".to_string(),
                morphological_reading: "ムズカシイ".to_string(),
                context: "Web3って難しい".to_string(),
            }]
        }
    }

    struct FailingVerifier;
    #[async_trait]
    impl ReadingVerifier for FailingVerifier {
        async fn verify(&self, _tokens: &[CandidateToken]) -> Result<Vec<String>> {
            Err(crate::error::VideoGenError::Mcp("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_morphological_and_is_not_silent() {
        let mut dict = PronunciationDictionary::new();
        resolve_fallback(
            &mut dict,
            &StubAnalyzer,
            Some(&FailingVerifier),
            &["Web3って難しい".to_string()],
        )
        .await
        .unwrap();

        let entry = dict.get("難しい").unwrap();
        assert_eq!(entry.reading, "ムズカシイ");
        assert_eq!(entry.priority, PRIORITY_MORPHOLOGICAL);
    }

    #[test]
    fn kanji_run_analyzer_finds_maximal_kanji_runs() {
        let analyzer = KanjiRunAnalyzer::default();
        let tokens = analyzer.analyze("東京特許許可局に行った");
        let surfaces: Vec<&str> = tokens.iter().map(|t| t.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["東京特許許可局", "行"]);
    }

    #[test]
    fn kanji_run_analyzer_uses_known_readings_when_available() {
        let mut known = HashMap::new();
        known.insert("東京".to_string(), "トウキョウ".to_string());
        let analyzer = KanjiRunAnalyzer::new(known);
        let tokens = analyzer.analyze("東京に行く");
        assert_eq!(tokens[0].morphological_reading, "トウキョウ");
    }

    #[test]
    fn apply_dictionary_substitutes_longest_surface_first() {
        let mut dict = PronunciationDictionary::new();
        dict.insert(entry("東京", "トウキョウ", PRIORITY_MANUAL));
        dict.insert(entry("東京都", "トウキョウト", PRIORITY_MANUAL));
        assert_eq!(apply_dictionary(&dict, "東京都に住む"), "トウキョウトに住む");
    }

    #[test]
    fn apply_dictionary_leaves_unmatched_text_untouched() {
        let dict = PronunciationDictionary::new();
        assert_eq!(apply_dictionary(&dict, "難しい"), "難しい");
    }

    struct StubLanguageModel {
        response: String,
    }

    #[async_trait]
    impl LanguageModel for StubLanguageModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn llm_reading_verifier_parses_a_fenced_json_array() {
        let verifier = LlmReadingVerifier::new(std::sync::Arc::new(StubLanguageModel {
            response: "```json\n[\"ムズカシイ\"]\n```".to_string(),
        }));
        let tokens = vec![CandidateToken {
            surface: "難しい".to_string(),
            morphological_reading: String::new(),
            context: "Web3って難しい".to_string(),
        }];
        let readings = verifier.verify(&tokens).await.unwrap();
        assert_eq!(readings, vec!["ムズカシイ".to_string()]);
    }

    #[tokio::test]
    async fn llm_reading_verifier_surfaces_malformed_json() {
        let verifier = LlmReadingVerifier::new(std::sync::Arc::new(StubLanguageModel {
            response: "not json".to_string(),
        }));
        let tokens = vec![CandidateToken {
            surface: "難しい".to_string(),
            morphological_reading: String::new(),
            context: "Web3って難しい".to_string(),
        }];
        assert!(verifier.verify(&tokens).await.is_err());
    }
}
