//! Candidate string assembly
//!
//! Groups classified glyphs into candidate strings using spatial gap
//! heuristics, then selects one candidate. The selection policy prefers the
//! last sufficiently long candidate because register numbers sit near the
//! end of the scanned region on the supported card layout; it is kept
//! configurable rather than "fixed" because it encodes that layout
//! assumption.

use tracing::debug;

use crate::config::AssemblerConfig;

/// A classified glyph with its position in the source region.
#[derive(Debug, Clone, Copy)]
pub struct PlacedGlyph {
    pub ch: char,
    pub confidence: f32,
    pub x: i32,
    pub y: i32,
}

/// A candidate string with the mean confidence of its glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub text: String,
    pub confidence: f32,
}

impl Candidate {
    fn empty() -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
        }
    }
}

/// Group glyphs into candidates.
///
/// Glyphs below the confidence floor are dropped (not substituted) before
/// assembly. A new candidate starts when the vertical gap from the previous
/// glyph exceeds the line-break threshold, or the horizontal x-advance
/// exceeds the word-break threshold.
pub fn assemble(glyphs: &[PlacedGlyph], cfg: &AssemblerConfig) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut text = String::new();
    let mut conf_sum = 0.0f32;
    let mut prev: Option<&PlacedGlyph> = None;

    let flush = |text: &mut String, conf_sum: &mut f32, out: &mut Vec<Candidate>| {
        if !text.is_empty() {
            let len = text.chars().count();
            out.push(Candidate {
                text: std::mem::take(text),
                confidence: *conf_sum / len as f32,
            });
            *conf_sum = 0.0;
        }
    };

    for glyph in glyphs {
        if glyph.confidence < cfg.confidence_floor {
            continue;
        }

        if let Some(p) = prev {
            let line_break = (glyph.y - p.y).abs() > cfg.line_break_px;
            // Estimated gap past the previous glyph's assumed right edge
            let advance = glyph.x - p.x;
            let word_break = advance > cfg.word_break_px;
            if line_break || word_break {
                debug!(
                    "candidate break at x={} (advance {}, past right edge {})",
                    glyph.x,
                    advance,
                    advance - cfg.avg_glyph_width
                );
                flush(&mut text, &mut conf_sum, &mut candidates);
            }
        }

        text.push(glyph.ch);
        conf_sum += glyph.confidence;
        prev = Some(glyph);
    }
    flush(&mut text, &mut conf_sum, &mut candidates);

    candidates
}

/// Select the best candidate.
///
/// Preference order: the last candidate of at least `preferred_len`
/// characters, then the last of at least `min_candidate_len` (candidates
/// below that are noise-tier), then the last candidate of any length, then
/// empty.
pub fn select(candidates: &[Candidate], cfg: &AssemblerConfig) -> Candidate {
    let last_with = |min_len: usize| {
        candidates
            .iter()
            .rev()
            .find(|c| c.text.chars().count() >= min_len)
    };

    last_with(cfg.preferred_len)
        .or_else(|| last_with(cfg.min_candidate_len))
        .or_else(|| candidates.last())
        .cloned()
        .unwrap_or_else(Candidate::empty)
}

/// Assemble and select in one step.
pub fn assemble_and_select(glyphs: &[PlacedGlyph], cfg: &AssemblerConfig) -> Candidate {
    let candidates = assemble(glyphs, cfg);
    let chosen = select(&candidates, cfg);
    debug!(
        "{} candidates, selected {:?} (confidence {:.3})",
        candidates.len(),
        chosen.text,
        chosen.confidence
    );
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(ch: char, x: i32, y: i32) -> PlacedGlyph {
        PlacedGlyph {
            ch,
            confidence: 0.9,
            x,
            y,
        }
    }

    fn cfg() -> AssemblerConfig {
        AssemblerConfig::default()
    }

    #[test]
    fn test_word_break_splits_candidates() {
        // x gaps: 20, 20, 60, 20 -- the 60px gap exceeds the 50px word break
        let glyphs: Vec<PlacedGlyph> = [0, 20, 40, 100, 120]
            .iter()
            .zip("ABCDE".chars())
            .map(|(&x, ch)| glyph(ch, x, 0))
            .collect();

        let candidates = assemble(&glyphs, &cfg());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].text, "ABC");
        assert_eq!(candidates[1].text, "DE");

        // Neither reaches the length tiers; selection falls back to the last
        let chosen = select(&candidates, &cfg());
        assert_eq!(chosen.text, "DE");
    }

    #[test]
    fn test_line_break_splits_candidates() {
        let glyphs = vec![
            glyph('A', 0, 0),
            glyph('B', 20, 2),
            glyph('C', 0, 50), // 48px below: new line
            glyph('D', 20, 50),
        ];

        let candidates = assemble(&glyphs, &cfg());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].text, "AB");
        assert_eq!(candidates[1].text, "CD");
    }

    #[test]
    fn test_low_confidence_glyphs_dropped_not_substituted() {
        let mut glyphs = vec![
            glyph('A', 0, 0),
            glyph('B', 20, 0),
            glyph('C', 40, 0),
        ];
        glyphs[1].confidence = 0.2; // below the 0.45 floor

        let candidates = assemble(&glyphs, &cfg());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].text, "AC");
    }

    #[test]
    fn test_selection_prefers_last_long_candidate() {
        let candidates = vec![
            Candidate { text: "REGNO2021".into(), confidence: 0.8 },
            Candidate { text: "ABC".into(), confidence: 0.9 },
        ];
        // The trailing short candidate loses to the earlier >= 6 one
        assert_eq!(select(&candidates, &cfg()).text, "REGNO2021");
    }

    #[test]
    fn test_selection_mid_tier_five_chars() {
        let candidates = vec![
            Candidate { text: "ABCDE".into(), confidence: 0.8 },
            Candidate { text: "XY".into(), confidence: 0.9 },
        ];
        // No >= 6 candidate; the >= 5 tier wins over the trailing noise
        assert_eq!(select(&candidates, &cfg()).text, "ABCDE");
    }

    #[test]
    fn test_selection_empty_input() {
        let chosen = select(&[], &cfg());
        assert!(chosen.text.is_empty());
        assert_eq!(chosen.confidence, 0.0);
    }

    #[test]
    fn test_candidate_confidence_is_mean_of_glyphs() {
        let mut glyphs = vec![glyph('A', 0, 0), glyph('B', 20, 0)];
        glyphs[0].confidence = 0.6;
        glyphs[1].confidence = 1.0;

        let candidates = assemble(&glyphs, &cfg());
        assert!((candidates[0].confidence - 0.8).abs() < 1e-6);
    }
}
