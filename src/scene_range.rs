//! Scene-range selector parsing (spec §4.1, §6).
//!
//! Syntax: `"N" | "N-M" | "N-" | "-M"`, 1-indexed, inclusive. Filters phrases
//! by `section_index`; `original_index` is never renumbered.

use crate::error::{Result, VideoGenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneRange {
    pub start: usize,
    pub end: usize,
}

impl SceneRange {
    /// Parse a 1-indexed inclusive range string against a known section count.
    pub fn parse(raw: &str, section_count: usize) -> Result<Self> {
        if section_count == 0 {
            return Err(VideoGenError::Configuration(
                "cannot apply a scene range to a script with no sections".to_string(),
            ));
        }

        let raw = raw.trim();
        let (start, end) = if let Some(rest) = raw.strip_suffix('-') {
            (parse_bound(rest, raw)?, section_count)
        } else if let Some(rest) = raw.strip_prefix('-') {
            (1, parse_bound(rest, raw)?)
        } else if let Some((lo, hi)) = raw.split_once('-') {
            (parse_bound(lo, raw)?, parse_bound(hi, raw)?)
        } else {
            let n = parse_bound(raw, raw)?;
            (n, n)
        };

        if start == 0 || end == 0 {
            return Err(VideoGenError::Configuration(format!(
                "invalid scene range '{raw}': scenes are 1-indexed, got 0"
            )));
        }
        if start > end {
            return Err(VideoGenError::Configuration(format!(
                "invalid scene range '{raw}': start {start} is after end {end}"
            )));
        }
        if end > section_count {
            return Err(VideoGenError::Configuration(format!(
                "invalid scene range '{raw}': end {end} exceeds {section_count} sections (valid: 1-{section_count})"
            )));
        }

        Ok(Self { start, end })
    }

    /// Whether a 0-based section index falls inside this range.
    pub fn contains(&self, section_index: usize) -> bool {
        let one_based = section_index + 1;
        one_based >= self.start && one_based <= self.end
    }

    /// Suffix used in `output_scenes_<suffix>.mp4`.
    pub fn output_suffix(&self) -> String {
        if self.start == self.end {
            self.start.to_string()
        } else {
            format!("{}-{}", self.start, self.end)
        }
    }
}

fn parse_bound(s: &str, original: &str) -> Result<usize> {
    s.trim().parse::<usize>().map_err(|_| {
        VideoGenError::Configuration(format!("invalid scene range '{original}': not a number"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_scene() {
        let r = SceneRange::parse("2", 4).unwrap();
        assert_eq!(r, SceneRange { start: 2, end: 2 });
        assert_eq!(r.output_suffix(), "2");
    }

    #[test]
    fn parses_closed_range() {
        let r = SceneRange::parse("2-3", 4).unwrap();
        assert!(!r.contains(0));
        assert!(r.contains(1));
        assert!(r.contains(2));
        assert!(!r.contains(3));
        assert_eq!(r.output_suffix(), "2-3");
    }

    #[test]
    fn parses_open_ended_ranges() {
        let r = SceneRange::parse("3-", 5).unwrap();
        assert_eq!(r, SceneRange { start: 3, end: 5 });

        let r = SceneRange::parse("-2", 5).unwrap();
        assert_eq!(r, SceneRange { start: 1, end: 2 });
    }

    #[test]
    fn rejects_reversed_range() {
        let err = SceneRange::parse("4-2", 5).unwrap_err();
        assert!(err.to_string().contains("after"));
    }

    #[test]
    fn rejects_zero_and_out_of_bounds() {
        assert!(SceneRange::parse("0", 5).is_err());
        assert!(SceneRange::parse("9", 5).is_err());
    }

    #[test]
    fn e3_scene_range_filtering() {
        // spec E3: 4 sections, --scenes 2-3 selects original_index 1 and 2.
        let r = SceneRange::parse("2-3", 4).unwrap();
        let selected: Vec<usize> = (0..4).filter(|&i| r.contains(i)).collect();
        assert_eq!(selected, vec![1, 2]);
        assert_eq!(r.output_suffix(), "2-3");
    }
}
