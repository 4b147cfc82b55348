//! Glyph classification
//!
//! Two interchangeable backends behind one [`Recognizer`] capability:
//!
//! - [`TemplateRecognizer`](template_match::TemplateRecognizer): transparent
//!   pixel-distance nearest-neighbor against the template store.
//! - [`NeuralOcr`](neural::NeuralOcr): ONNX detector plus CTC-decoded line
//!   recognizer; tolerant of font and skew variation at higher compute cost.
//!
//! Downstream assembly consumes [`MatchResult`]s and is agnostic to which
//! backend produced them.

pub mod neural;
pub mod template_match;

pub use neural::{ctc_best_path, CardDetector, DetectionBox, LineRecognizer, NeuralOcr};
pub use template_match::TemplateRecognizer;

use image::GrayImage;

use crate::error::OcrError;

/// A classified glyph: the character and a confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub ch: char,
    pub confidence: f32,
}

/// Restricts which template labels a classification considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelFilter {
    /// All loaded labels
    #[default]
    All,
    /// 0-9 only (register number field)
    DigitsOnly,
    /// A-Z only
    LettersOnly,
}

impl LabelFilter {
    pub fn accepts(&self, label: char) -> bool {
        match self {
            LabelFilter::All => true,
            LabelFilter::DigitsOnly => label.is_ascii_digit(),
            LabelFilter::LettersOnly => label.is_ascii_uppercase(),
        }
    }
}

/// Classifies a single glyph bitmap.
pub trait Recognizer {
    fn classify(&self, glyph: &GrayImage) -> Result<MatchResult, OcrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_filter() {
        assert!(LabelFilter::All.accepts('A'));
        assert!(LabelFilter::All.accepts('7'));

        assert!(LabelFilter::DigitsOnly.accepts('0'));
        assert!(!LabelFilter::DigitsOnly.accepts('A'));

        assert!(LabelFilter::LettersOnly.accepts('Z'));
        assert!(!LabelFilter::LettersOnly.accepts('9'));
    }
}
