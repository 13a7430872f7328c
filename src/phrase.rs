//! The mutable `Phrase` record threaded across pipeline stages (spec §3, §9
//! "Cyclic graphs / shared mutable state"). Each stage reads and writes
//! explicit fields; there is no hidden aliasing, and `composition.rs`'s
//! `build_composition` is a pure projection of the finished container.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phrase {
    /// Stable, 0-based index over the full ordered narration sequence,
    /// assigned before any scene-range filtering. Sole source of filename
    /// indexing (P1).
    pub original_index: usize,
    pub section_index: usize,
    pub persona_id: String,
    pub persona_name: String,
    pub text: String,
    pub reading: String,
    /// Filled by C5.
    pub duration: Option<f64>,
    /// Filled by C7.
    pub start_frame: Option<u32>,
    pub background_override: Option<crate::script::BackgroundConfig>,
}

impl Phrase {
    pub fn subtitle_text(&self) -> String {
        crate::segment::get_subtitle_text(&self.text)
    }
}
