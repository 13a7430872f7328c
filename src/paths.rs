//! Deterministic on-disk project layout (spec §3, §8 P1).
//!
//! File indices are derived solely from `Phrase::original_index`, never from
//! scene-range-filtered position, so partial re-runs and `--scenes` slicing
//! never renumber existing artifacts.

use std::path::{Path, PathBuf};

/// Project-relative filesystem layout for one generation run.
pub struct ProjectPaths {
    pub root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn script_yaml(&self, lang: Option<&str>) -> PathBuf {
        match lang {
            Some(lang) => self.root.join(format!("script_{lang}.yaml")),
            None => self.root.join("script.yaml"),
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.root.join("audio")
    }

    pub fn phrase_wav(&self, original_index: usize) -> PathBuf {
        self.audio_dir()
            .join(Self::phrase_filename(original_index))
    }

    pub fn phrase_filename(original_index: usize) -> String {
        format!("phrase_{original_index:04}.wav")
    }

    pub fn slides_dir(&self, lang: Option<&str>, multilingual: bool) -> PathBuf {
        if multilingual {
            match lang {
                Some(lang) => self.root.join("slides").join(lang),
                None => self.root.join("slides"),
            }
        } else {
            self.root.join("slides")
        }
    }

    pub fn slide_png(&self, original_index: usize, lang: Option<&str>, multilingual: bool) -> PathBuf {
        self.slides_dir(lang, multilingual)
            .join(Self::slide_filename(original_index))
    }

    pub fn slide_filename(original_index: usize) -> String {
        format!("slide_{original_index:04}.png")
    }

    pub fn remotion_dir(&self) -> PathBuf {
        self.root.join("remotion")
    }

    pub fn composition_json(&self) -> PathBuf {
        self.remotion_dir().join("composition.json")
    }

    pub fn output_mp4(&self, scene_range_suffix: Option<&str>) -> PathBuf {
        match scene_range_suffix {
            Some(suffix) => self.root.join(format!("output_scenes_{suffix}.mp4")),
            None => self.root.join("output.mp4"),
        }
    }

    pub fn assets_characters_dir(&self, persona_id: &str) -> PathBuf {
        self.root.join("assets").join("characters").join(persona_id)
    }

    pub fn assets_logos_dir(&self) -> PathBuf {
        self.root.join("assets").join("logos")
    }
}

/// A file is considered present-and-reusable when it exists and is non-empty.
/// This is the sole idempotency check per spec §4.1 / §8 P2.
pub fn is_reusable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_filenames_are_zero_padded_and_stable() {
        let p = ProjectPaths::new("/tmp/project");
        assert_eq!(
            p.phrase_wav(7),
            PathBuf::from("/tmp/project/audio/phrase_0007.wav")
        );
        assert_eq!(
            p.slide_png(12, None, false),
            PathBuf::from("/tmp/project/slides/slide_0012.png")
        );
    }

    #[test]
    fn multilingual_slides_nest_under_language() {
        let p = ProjectPaths::new("/tmp/project");
        assert_eq!(
            p.slide_png(3, Some("en"), true),
            PathBuf::from("/tmp/project/slides/en/slide_0003.png")
        );
        assert_eq!(
            p.slide_png(3, Some("en"), false),
            PathBuf::from("/tmp/project/slides/slide_0003.png")
        );
    }

    #[test]
    fn output_path_encodes_scene_range() {
        let p = ProjectPaths::new("/tmp/project");
        assert_eq!(
            p.output_mp4(Some("2-3")),
            PathBuf::from("/tmp/project/output_scenes_2-3.mp4")
        );
        assert_eq!(p.output_mp4(None), PathBuf::from("/tmp/project/output.mp4"));
    }

    #[test]
    fn is_reusable_requires_nonempty_file() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.wav");
        std::fs::write(&empty, []).unwrap();
        assert!(!is_reusable(&empty));

        let nonempty = dir.path().join("full.wav");
        std::fs::write(&nonempty, b"data").unwrap();
        assert!(is_reusable(&nonempty));

        assert!(!is_reusable(&dir.path().join("missing.wav")));
    }
}
