//! OCR pipeline orchestration
//!
//! Ties the stages together: preprocess, crop the region bands, segment,
//! classify, assemble, validate, aggregate. The template store and the
//! neural models are lazily initialized exactly once and shared read-only
//! across invocations; each scan is otherwise independent.

use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::assemble::{assemble_and_select, Candidate, PlacedGlyph};
use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::preprocess::{binarize, resize_max_width, to_grayscale, BinaryImage};
use crate::recognize::{LabelFilter, NeuralOcr, Recognizer, TemplateRecognizer};
use crate::regions::{crop_band_binary, RegionKind};
use crate::segment::{extract_blobs, split_columns};
use crate::templates::{TemplateSource, TemplateStore};
use crate::validate::validate_institution;

/// Institution value reported when whitelist validation fails every tier.
pub const UNKNOWN_INSTITUTION: &str = "unknown";

/// One recognized field before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldResult {
    pub text: String,
    pub confidence: f32,
}

/// The structured result of one pipeline invocation. Immutable; owned by
/// the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResult {
    /// Matched whitelist entry, or [`UNKNOWN_INSTITUTION`]
    pub institution: String,
    pub person_name: String,
    pub register_number: String,
    /// Institution matched and both other fields non-empty
    pub is_valid: bool,
    /// Arithmetic mean of the per-field confidences collected in this run
    pub confidence: f32,
}

/// The offline card OCR pipeline.
///
/// Construct once and reuse: the template store (and neural models, when
/// configured) are loaded on first use and cached for the lifetime of the
/// pipeline.
pub struct OcrPipeline {
    config: OcrConfig,
    template_source: Box<dyn TemplateSource>,
    templates: OnceLock<TemplateStore>,
    model_paths: Option<(PathBuf, PathBuf)>,
    neural: OnceLock<NeuralOcr>,
}

impl OcrPipeline {
    pub fn new(config: OcrConfig, template_source: Box<dyn TemplateSource>) -> Self {
        Self {
            config,
            template_source,
            templates: OnceLock::new(),
            model_paths: None,
            neural: OnceLock::new(),
        }
    }

    /// Enable the neural backend with detector and recognizer model files.
    pub fn with_models(
        mut self,
        detector: impl Into<PathBuf>,
        recognizer: impl Into<PathBuf>,
    ) -> Self {
        self.model_paths = Some((detector.into(), recognizer.into()));
        self
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Scan a full card capture with the template backend, extracting all
    /// three fields.
    pub fn scan(&self, data: &[u8], width: u32, height: u32) -> Result<OcrResult, OcrError> {
        let card = self.prepare(data, width, height)?;

        let institution = self.recognize_field(&card, RegionKind::Institution)?;
        let name = self.recognize_field(&card, RegionKind::Name)?;
        let number = self.recognize_field(&card, RegionKind::Number)?;

        Ok(self.aggregate(&[
            (RegionKind::Institution, institution),
            (RegionKind::Name, name),
            (RegionKind::Number, number),
        ]))
    }

    /// Scan a capture for a single field. The result carries only that
    /// field; validity still requires all three, so it is always false.
    pub fn scan_region(
        &self,
        data: &[u8],
        width: u32,
        height: u32,
        region: RegionKind,
    ) -> Result<OcrResult, OcrError> {
        let card = self.prepare(data, width, height)?;
        let field = self.recognize_field(&card, region)?;
        Ok(self.aggregate(&[(region, field)]))
    }

    /// Single-shot full-card scan with the neural backend.
    pub fn scan_neural(&self, data: &[u8], width: u32, height: u32) -> Result<OcrResult, OcrError> {
        let gray = to_grayscale(data, width, height)?;
        let gray = resize_max_width(&gray, self.config.preprocess.max_width);

        let neural = self.neural()?;
        let fields = neural.extract(&gray)?;

        let collected: Vec<(RegionKind, FieldResult)> = fields
            .into_iter()
            .map(|(region, text, confidence)| (region, FieldResult { text, confidence }))
            .collect();
        Ok(self.aggregate(&collected))
    }

    /// Grayscale, downscale, binarize. Polarity is normalized here, once.
    fn prepare(&self, data: &[u8], width: u32, height: u32) -> Result<BinaryImage, OcrError> {
        let gray = to_grayscale(data, width, height)?;
        let gray = resize_max_width(&gray, self.config.preprocess.max_width);
        Ok(binarize(&gray, None))
    }

    /// Segment and classify one region band, then assemble a candidate.
    ///
    /// Institution and name bands may span multiple words and lines, so
    /// they use blob extraction; the register number is a single line and
    /// uses the simpler projection split with the wider distance norm.
    fn recognize_field(
        &self,
        card: &BinaryImage,
        region: RegionKind,
    ) -> Result<FieldResult, OcrError> {
        let band = crop_band_binary(card, region, &self.config.bands);
        let store = self.templates()?;
        let matcher = &self.config.matcher;

        let glyphs: Vec<PlacedGlyph> = match region {
            RegionKind::Number => {
                // Register numbers carry a letter prefix, so the full label
                // set stays in play; the wider digit norm absorbs the moire
                // typical of numbers photographed off a phone screen.
                let recognizer =
                    TemplateRecognizer::new(store, LabelFilter::All, matcher.digit_distance_norm);
                let slices = split_columns(&band, &self.config.segmenter);
                let mut glyphs = Vec::with_capacity(slices.len());
                for slice in &slices {
                    let result = recognizer.classify(&slice.bitmap)?;
                    glyphs.push(PlacedGlyph {
                        ch: result.ch,
                        confidence: result.confidence,
                        x: slice.x as i32,
                        y: 0,
                    });
                }
                glyphs
            }
            RegionKind::Institution | RegionKind::Name => {
                let recognizer =
                    TemplateRecognizer::new(store, LabelFilter::All, matcher.text_distance_norm);
                let blobs = extract_blobs(&band, &self.config.segmenter);
                let mut glyphs = Vec::with_capacity(blobs.len());
                for blob in &blobs {
                    let result = recognizer.classify(&blob.bitmap)?;
                    glyphs.push(PlacedGlyph {
                        ch: result.ch,
                        confidence: result.confidence,
                        x: blob.x as i32,
                        y: blob.y as i32,
                    });
                }
                glyphs
            }
        };

        let Candidate { text, confidence } = assemble_and_select(&glyphs, &self.config.assembler);
        debug!(
            "{} field -> {:?} (confidence {:.3})",
            region.name(),
            text,
            confidence
        );
        Ok(FieldResult { text, confidence })
    }

    /// Combine recognized fields into the final result.
    fn aggregate(&self, fields: &[(RegionKind, FieldResult)]) -> OcrResult {
        let mut institution = String::new();
        let mut institution_matched = false;
        let mut person_name = String::new();
        let mut register_number = String::new();
        let mut confidences = Vec::with_capacity(fields.len());

        for (region, field) in fields {
            confidences.push(if field.text.is_empty() {
                0.0
            } else {
                field.confidence
            });
            match region {
                RegionKind::Institution => {
                    match validate_institution(&field.text, &self.config.validator) {
                        Some(entry) => {
                            institution = entry;
                            institution_matched = true;
                        }
                        None => institution = UNKNOWN_INSTITUTION.to_string(),
                    }
                }
                RegionKind::Name => person_name = field.text.clone(),
                RegionKind::Number => register_number = field.text.clone(),
            }
        }

        let confidence = if confidences.is_empty() {
            0.0
        } else {
            confidences.iter().sum::<f32>() / confidences.len() as f32
        };
        let is_valid =
            institution_matched && !person_name.is_empty() && !register_number.is_empty();

        info!(
            "scan complete: institution={:?} valid={} confidence={:.3}",
            institution, is_valid, confidence
        );

        OcrResult {
            institution,
            person_name,
            register_number,
            is_valid,
            confidence,
        }
    }

    /// Template store, loaded on first use. Initialization may race but
    /// only one result is kept; the cache is read-only afterwards.
    fn templates(&self) -> Result<&TemplateStore, OcrError> {
        if let Some(store) = self.templates.get() {
            return Ok(store);
        }

        let store = TemplateStore::load(
            self.template_source.as_ref(),
            self.config.matcher.template_size,
        );
        if store.is_empty() {
            return Err(OcrError::NoTemplates);
        }
        Ok(self.templates.get_or_init(|| store))
    }

    /// Neural backend, loaded on first use.
    fn neural(&self) -> Result<&NeuralOcr, OcrError> {
        if let Some(neural) = self.neural.get() {
            return Ok(neural);
        }

        let (det, rec) = self
            .model_paths
            .as_ref()
            .ok_or(OcrError::ModelsNotConfigured)?;
        let loaded = NeuralOcr::load(det, rec, &self.config.neural)?;
        Ok(self.neural.get_or_init(|| loaded))
    }
}
