//! Phrase Segmenter (C3): quote-aware, punctuation-priority splitting of a
//! narration into 3-6s phrases (spec §4.3). Pure, deterministic (L3); no I/O.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_chars: 15,
            max_chars: 80,
        }
    }
}

/// One segmented unit of narration, prior to `original_index` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentedPhrase {
    pub text: String,
}

fn is_open_quote(c: char) -> bool {
    c == '「' || c == '『'
}

fn is_close_quote(c: char) -> bool {
    c == '」' || c == '』'
}

/// Split priority at an offset: lower is higher priority. `None` = not a candidate.
fn split_priority(c: char) -> Option<u8> {
    match c {
        '。' => Some(0),
        '、' => Some(1),
        '\n' => Some(2),
        '!' | '?' | '！' | '？' => Some(3),
        _ => None,
    }
}

/// Segment `text` into an ordered list of phrases per the quote-safety (P5),
/// no-empty-phrase (P6) and deterministic (L3) invariants.
pub fn segment(text: &str, config: &SegmentConfig) -> Vec<SegmentedPhrase> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();

    // offsets[i] = quote_depth of text[..i] (state *before* consuming chars[i]).
    let mut quote_depth_at = vec![0i32; n + 1];
    for i in 0..n {
        let mut depth = quote_depth_at[i];
        if is_open_quote(chars[i]) {
            depth += 1;
        } else if is_close_quote(chars[i]) {
            depth = (depth - 1).max(0);
        }
        quote_depth_at[i + 1] = depth;
    }

    let mut phrases = Vec::new();
    let mut window_start = 0usize;

    while window_start < n {
        let remaining = n - window_start;
        let hard_limit = (window_start + config.max_chars).min(n);

        // Gather admissible candidates (offset is the exclusive end of the
        // phrase, i.e. the split happens *after* chars[offset-1]).
        let mut best: Option<(u8, usize)> = None;
        for offset in (window_start + 1)..=hard_limit {
            if quote_depth_at[offset] != 0 {
                continue;
            }
            let len = offset - window_start;
            if let Some(priority) = split_priority(chars[offset - 1]) {
                if len < config.min_chars && offset != n {
                    continue;
                }
                match best {
                    Some((p, o)) if p < priority || (p == priority && o < offset) => {}
                    _ => best = Some((priority, offset)),
                }
            }
        }

        let split_at = if let Some((_, offset)) = best {
            offset
        } else if hard_limit < n && quote_depth_at[hard_limit] == 0 {
            hard_limit
        } else if remaining as f64 > 1.5 * config.max_chars as f64 {
            // Emergency release: next admissible close-quote boundary.
            let mut release = None;
            for offset in (window_start + 1)..=n {
                if is_close_quote(chars[offset - 1]) && quote_depth_at[offset] == 0 {
                    release = Some(offset);
                    break;
                }
            }
            release.unwrap_or(n)
        } else {
            n
        };

        let split_at = split_at.max(window_start + 1).min(n);
        let raw: String = chars[window_start..split_at].iter().collect();
        window_start = split_at;

        let stripped = raw.trim();
        if !is_punctuation_only(stripped) {
            phrases.push(SegmentedPhrase {
                text: raw,
            });
        }
    }

    phrases
}

fn is_punctuation_only(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .all(|c| matches!(c, '。' | '、' | '！' | '？' | '\n') || c.is_whitespace())
}

/// Derive subtitle display text by iteratively stripping trailing `。`/`、`.
/// `phrase.text` and `phrase.reading` are left unmodified (P7).
pub fn get_subtitle_text(phrase_text: &str) -> String {
    let mut s = phrase_text.trim_end().to_string();
    while let Some(stripped) = s.strip_suffix('。').or_else(|| s.strip_suffix('、')) {
        s = stripped.trim_end().to_string();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p6_no_empty_or_punctuation_only_phrase() {
        let config = SegmentConfig::default();
        let phrases = segment("こんにちは。。これはテストです、、、終わり。", &config);
        for p in &phrases {
            assert!(!is_punctuation_only(p.text.trim()), "got {:?}", p.text);
        }
    }

    #[test]
    fn p5_quote_safety_never_splits_inside_quotes() {
        let config = SegmentConfig {
            min_chars: 2,
            max_chars: 10,
        };
        let text = "彼は「これはとても長い引用文です」と言った。";
        let phrases = segment(text, &config);

        // Reconstruct and verify no phrase boundary lands inside an open quote.
        let mut depth = 0i32;
        let mut offset = 0usize;
        for p in &phrases {
            for c in p.text.chars() {
                if is_open_quote(c) {
                    depth += 1;
                } else if is_close_quote(c) {
                    depth = (depth - 1).max(0);
                }
                offset += 1;
            }
            assert_eq!(depth, 0, "quote_depth nonzero at phrase boundary {offset}");
        }
    }

    #[test]
    fn emergency_release_splits_at_closing_quote_when_quote_too_long() {
        let config = SegmentConfig {
            min_chars: 5,
            max_chars: 10,
        };
        // Quote body alone exceeds 1.5 * max_chars (15 chars) with no internal split.
        let long_quote_body: String = "あ".repeat(20);
        let text = format!("「{long_quote_body}」おわり。");
        let phrases = segment(&text, &config);
        assert!(!phrases.is_empty());
        // The first phrase must end exactly at the closing quote.
        assert!(phrases[0].text.ends_with('」'));
    }

    #[test]
    fn l3_segmentation_is_deterministic() {
        let config = SegmentConfig::default();
        let text = "これは最初の文です。そしてこれは二番目の文です。最後の文。";
        let a = segment(text, &config);
        let b = segment(text, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn p7_subtitle_text_strips_trailing_punctuation_only() {
        assert_eq!(get_subtitle_text("こんにちは。"), "こんにちは");
        assert_eq!(get_subtitle_text("こんにちは、、"), "こんにちは");
        assert_eq!(get_subtitle_text("Web3って難しい"), "Web3って難しい");
        assert_eq!(get_subtitle_text("途中、の話。"), "途中、の話");
    }

    #[test]
    fn splits_on_sentence_punctuation_priority() {
        let config = SegmentConfig {
            min_chars: 1,
            max_chars: 80,
        };
        let phrases = segment("一文目。二文目、続き！三文目？", &config);
        assert_eq!(phrases.len(), 4);
        assert_eq!(phrases[0].text, "一文目。");
        assert_eq!(phrases[1].text, "二文目、");
        assert_eq!(phrases[2].text, "続き！");
        assert_eq!(phrases[3].text, "三文目？");
    }

    #[test]
    fn comma_outranks_exclamation_in_the_same_window() {
        let config = SegmentConfig {
            min_chars: 1,
            max_chars: 80,
        };
        let phrases = segment("これは、重要です！", &config);
        assert_eq!(phrases.len(), 2);
        assert_eq!(phrases[0].text, "これは、");
        assert_eq!(phrases[1].text, "重要です！");
    }
}
