//! Pipeline Configuration
//!
//! Every behavior-defining threshold lives here rather than in algorithm
//! logic. The current values are empirically tuned against real card
//! captures; change them deliberately, not in passing. Stored in TOML format.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::regions::RegionKind;

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OcrConfig {
    /// Preprocessing settings
    pub preprocess: PreprocessConfig,
    /// Card band layout fractions
    pub bands: BandLayout,
    /// Segmentation thresholds
    pub segmenter: SegmenterConfig,
    /// Template matcher settings
    pub matcher: MatcherConfig,
    /// Sequence assembly thresholds
    pub assembler: AssemblerConfig,
    /// Institution whitelist validation
    pub validator: ValidatorConfig,
    /// Neural backend settings
    pub neural: NeuralConfig,
}

/// Preprocessing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Captures wider than this are downscaled before processing
    pub max_width: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self { max_width: 1000 }
    }
}

/// Fractional band layout of the card template.
///
/// Tied to one specific card layout; future layouts supply different
/// fractions instead of code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandLayout {
    /// Institution name band: top of the card, this fraction of the height
    pub institution_height: f32,
    /// Person name band starts at this fraction of the height
    pub name_start: f32,
    /// Person name band height fraction
    pub name_height: f32,
    /// Register number band: bottom of the card, this fraction of the height
    pub number_height: f32,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            institution_height: 1.0 / 5.0,
            name_start: 0.5,
            name_height: 1.0 / 6.0,
            number_height: 1.0 / 6.0,
        }
    }
}

/// Segmentation thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// Blobs narrower than this are noise
    pub min_blob_width: u32,
    /// Blobs shorter than this are noise
    pub min_blob_height: u32,
    /// Blobs wider than this multiple of their height are noise
    pub max_aspect: f32,
    /// Blobs whose y-centers differ by at most this are the same text line
    pub line_merge_px: u32,
    /// Minimum ink pixels for a column to count as part of a glyph
    pub min_column_ink: u32,
    /// Minimum width of a projection run to emit a glyph slice
    pub min_run_width: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_blob_width: 2,
            min_blob_height: 6,
            max_aspect: 3.0,
            line_merge_px: 20,
            min_column_ink: 2,
            min_run_width: 5,
        }
    }
}

/// Template matcher settings.
///
/// The distance norms directly determine downstream acceptance: a glyph at
/// distance `norm` scores zero confidence. The digit path tolerates more
/// distance to cope with moire on cards photographed from a phone screen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Canonical square template size in pixels
    pub template_size: u32,
    /// Distance normalization constant for general text
    pub text_distance_norm: f32,
    /// Distance normalization constant for the digits-only path
    pub digit_distance_norm: f32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            template_size: 20,
            text_distance_norm: 50_000.0,
            digit_distance_norm: 80_000.0,
        }
    }
}

/// Sequence assembly thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblerConfig {
    /// Vertical gap that starts a new candidate (line break)
    pub line_break_px: i32,
    /// Horizontal x-advance gap that starts a new candidate (word break)
    pub word_break_px: i32,
    /// Assumed average glyph width, used to estimate right edges
    pub avg_glyph_width: i32,
    /// Glyphs below this confidence are dropped before assembly
    pub confidence_floor: f32,
    /// Candidates shorter than this are noise-tier
    pub min_candidate_len: usize,
    /// Selection prefers the last candidate at least this long
    pub preferred_len: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            line_break_px: 30,
            word_break_px: 50,
            avg_glyph_width: 20,
            confidence_floor: 0.45,
            min_candidate_len: 5,
            preferred_len: 6,
        }
    }
}

/// Institution whitelist validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// Accepted institution names
    pub whitelist: Vec<String>,
    /// Accept entries within this fraction of the entry length in edit distance
    pub tolerance: f32,
    /// If all tiers fail but the OCR text contains this keyword,
    /// fall back to `fallback_entry`
    pub fallback_keyword: String,
    /// Entry returned by the keyword escape hatch
    pub fallback_entry: String,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            whitelist: vec![
                "SAVEETHA SCHOOL OF ENGINEERING".to_string(),
                "SAVEETHA ENGINEERING COLLEGE".to_string(),
                "SAVEETHA SCHOOL OF LAW".to_string(),
                "SAVEETHA MEDICAL COLLEGE".to_string(),
                "SAVEETHA DENTAL COLLEGE".to_string(),
            ],
            tolerance: 0.4,
            fallback_keyword: "SAVEETHA".to_string(),
            fallback_entry: "SAVEETHA SCHOOL OF ENGINEERING".to_string(),
        }
    }
}

/// Neural backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralConfig {
    /// Detector input is a square of this size, single channel
    pub det_input_size: u32,
    /// Recognizer input width
    pub rec_width: u32,
    /// Recognizer input height
    pub rec_height: u32,
    /// Recognizer output alphabet; the CTC blank class is `charset.len()`
    pub charset: String,
    /// Which field each of the detector's three boxes maps to, in output order
    pub box_fields: [RegionKind; 3],
}

impl Default for NeuralConfig {
    fn default() -> Self {
        Self {
            det_input_size: 224,
            rec_width: 400,
            rec_height: 100,
            charset: "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ".to_string(),
            box_fields: [RegionKind::Institution, RegionKind::Name, RegionKind::Number],
        }
    }
}

/// Load configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<OcrConfig, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Save configuration to a TOML file.
pub fn save_config(config: &OcrConfig, path: &Path) -> Result<(), std::io::Error> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_tuned_values() {
        let config = OcrConfig::default();

        assert!((config.bands.institution_height - 0.2).abs() < 1e-6);
        assert!((config.bands.name_start - 0.5).abs() < 1e-6);

        assert_eq!(config.segmenter.min_blob_width, 2);
        assert_eq!(config.segmenter.min_blob_height, 6);
        assert!((config.segmenter.max_aspect - 3.0).abs() < 1e-6);

        assert_eq!(config.matcher.template_size, 20);
        assert!((config.matcher.text_distance_norm - 50_000.0).abs() < 1e-3);
        assert!((config.matcher.digit_distance_norm - 80_000.0).abs() < 1e-3);

        assert_eq!(config.assembler.line_break_px, 30);
        assert_eq!(config.assembler.word_break_px, 50);
        assert!((config.assembler.confidence_floor - 0.45).abs() < 1e-6);
        assert_eq!(config.assembler.preferred_len, 6);

        assert!((config.validator.tolerance - 0.4).abs() < 1e-6);
        assert!(!config.validator.whitelist.is_empty());
    }

    #[test]
    fn test_config_round_trip() {
        let config = OcrConfig::default();
        let file = NamedTempFile::new().unwrap();

        save_config(&config, file.path()).unwrap();
        let loaded = load_config(file.path()).unwrap();

        assert_eq!(loaded.segmenter.min_blob_height, config.segmenter.min_blob_height);
        assert_eq!(loaded.validator.whitelist, config.validator.whitelist);
        assert_eq!(loaded.neural.charset, config.neural.charset);
    }
}
