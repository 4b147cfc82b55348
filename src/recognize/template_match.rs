//! Template nearest-neighbor glyph classifier
//!
//! Classifies a glyph by summed absolute pixel difference against every
//! stored template at the canonical size. Transparent and dependency-free,
//! but sensitive to fonts the template set was not drawn from.

use image::imageops::FilterType;
use image::GrayImage;
use tracing::trace;

use super::{LabelFilter, MatchResult, Recognizer};
use crate::error::OcrError;
use crate::templates::TemplateStore;

/// Pixel-distance nearest-neighbor matcher over a [`TemplateStore`].
///
/// `distance_norm` maps raw distance to confidence:
/// `confidence = clamp(1 - distance / distance_norm, 0, 1)`. The digit-only
/// path uses a larger norm than general text to tolerate screen moire.
pub struct TemplateRecognizer<'a> {
    store: &'a TemplateStore,
    filter: LabelFilter,
    distance_norm: f32,
}

impl<'a> TemplateRecognizer<'a> {
    pub fn new(store: &'a TemplateStore, filter: LabelFilter, distance_norm: f32) -> Self {
        Self {
            store,
            filter,
            distance_norm,
        }
    }

    /// Sum of absolute single-channel differences over the canonical grid.
    fn distance(glyph: &GrayImage, template: &GrayImage) -> u32 {
        glyph
            .as_raw()
            .iter()
            .zip(template.as_raw().iter())
            .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs())
            .sum()
    }
}

impl Recognizer for TemplateRecognizer<'_> {
    fn classify(&self, glyph: &GrayImage) -> Result<MatchResult, OcrError> {
        let size = self.store.size();
        let scaled = if glyph.dimensions() == (size, size) {
            glyph.clone()
        } else {
            image::imageops::resize(glyph, size, size, FilterType::Triangle)
        };

        let mut best: Option<(char, u32)> = None;
        for (label, template) in self.store.iter() {
            if !self.filter.accepts(label) {
                continue;
            }
            let dist = Self::distance(&scaled, template);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((label, dist));
            }
        }

        let (ch, dist) = best.ok_or(OcrError::NoTemplates)?;
        let confidence = (1.0 - dist as f32 / self.distance_norm).clamp(0.0, 1.0);
        trace!("glyph -> '{}' (distance {}, confidence {:.3})", ch, dist, confidence);

        Ok(MatchResult { ch, confidence })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::TemplateSource;
    use image::{DynamicImage, Luma};
    use std::collections::HashMap;

    struct MapSource(HashMap<char, DynamicImage>);

    impl TemplateSource for MapSource {
        fn load(&self, label: char) -> Option<DynamicImage> {
            self.0.get(&label).cloned()
        }
    }

    /// Distinct ink-on-dark 20x20 glyph per label: a border frame plus a
    /// code-dependent vertical and horizontal bar.
    fn synthetic_glyph(label: char) -> GrayImage {
        let code = crate::templates::labels().position(|l| l == label).unwrap() as u32;
        let mut img = GrayImage::from_pixel(20, 20, Luma([0]));
        for i in 0..20 {
            img.put_pixel(i, 0, Luma([255]));
            img.put_pixel(i, 19, Luma([255]));
            img.put_pixel(0, i, Luma([255]));
            img.put_pixel(19, i, Luma([255]));
        }
        let vx = 2 + (code % 6) * 3;
        let hy = 2 + (code / 6) * 3;
        for i in 0..20 {
            img.put_pixel(vx, i, Luma([255]));
            img.put_pixel(i, hy, Luma([255]));
        }
        img
    }

    fn store_with(labels: &[char]) -> TemplateStore {
        let map: HashMap<char, DynamicImage> = labels
            .iter()
            .map(|&l| (l, DynamicImage::ImageLuma8(synthetic_glyph(l))))
            .collect();
        TemplateStore::load(&MapSource(map), 20)
    }

    #[test]
    fn test_identical_glyph_matches_with_full_confidence() {
        let store = store_with(&['A', 'B', 'C', '1', '2']);
        let rec = TemplateRecognizer::new(&store, LabelFilter::All, 50_000.0);

        let result = rec.classify(&synthetic_glyph('B')).unwrap();
        assert_eq!(result.ch, 'B');
        assert!((result.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_digit_filter_excludes_letters() {
        let store = store_with(&['A', 'B', '1', '2']);
        let rec = TemplateRecognizer::new(&store, LabelFilter::DigitsOnly, 80_000.0);

        // Even a perfect letter glyph can only resolve to a digit
        let result = rec.classify(&synthetic_glyph('A')).unwrap();
        assert!(result.ch.is_ascii_digit());
    }

    #[test]
    fn test_empty_store_is_an_error() {
        let store = store_with(&[]);
        let rec = TemplateRecognizer::new(&store, LabelFilter::All, 50_000.0);
        assert!(matches!(
            rec.classify(&synthetic_glyph('A')),
            Err(OcrError::NoTemplates)
        ));
    }

    #[test]
    fn test_filter_with_no_surviving_labels_is_an_error() {
        let store = store_with(&['A', 'B']);
        let rec = TemplateRecognizer::new(&store, LabelFilter::DigitsOnly, 80_000.0);
        assert!(matches!(
            rec.classify(&synthetic_glyph('A')),
            Err(OcrError::NoTemplates)
        ));
    }

    #[test]
    fn test_confidence_degrades_with_distance() {
        let store = store_with(&['A']);
        let rec = TemplateRecognizer::new(&store, LabelFilter::All, 50_000.0);

        let exact = rec.classify(&synthetic_glyph('A')).unwrap();
        // A different glyph still maps to 'A' (only label) but farther away
        let off = rec.classify(&synthetic_glyph('Z')).unwrap();
        assert_eq!(off.ch, 'A');
        assert!(off.confidence < exact.confidence);
    }
}
