//! Neural detection + recognition backend
//!
//! Two-stage ONNX pipeline: a fixed-input regression detector that emits
//! exactly three field bounding boxes, and a CRNN-style line recognizer
//! decoded with greedy CTC best-path. Selected for full-card single-shot
//! extraction where the fixed band layout cannot be trusted.

use image::imageops::FilterType;
use image::GrayImage;
use ndarray::{Array4, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::Path;
use tracing::{debug, info};

use super::MatchResult;
use crate::config::NeuralConfig;
use crate::error::OcrError;
use crate::regions::RegionKind;

/// A detector bounding box in normalized [0, 1] coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionBox {
    pub ymin: f32,
    pub xmin: f32,
    pub ymax: f32,
    pub xmax: f32,
}

impl DetectionBox {
    /// Build from raw model output, clamping to [0, 1] and normalizing
    /// coordinate order so `min <= max` always holds.
    pub fn from_raw(raw: [f32; 4]) -> Self {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let (mut ymin, mut xmin, mut ymax, mut xmax) =
            (clamp(raw[0]), clamp(raw[1]), clamp(raw[2]), clamp(raw[3]));
        if ymin > ymax {
            std::mem::swap(&mut ymin, &mut ymax);
        }
        if xmin > xmax {
            std::mem::swap(&mut xmin, &mut xmax);
        }
        Self { ymin, xmin, ymax, xmax }
    }

    /// Denormalize to a pixel rectangle within an image, at least 1x1.
    pub fn to_pixel_rect(&self, width: u32, height: u32) -> (u32, u32, u32, u32) {
        let x = (self.xmin * width as f32) as u32;
        let y = (self.ymin * height as f32) as u32;
        let x = x.min(width.saturating_sub(1));
        let y = y.min(height.saturating_sub(1));
        let w = (((self.xmax - self.xmin) * width as f32) as u32).clamp(1, width - x);
        let h = (((self.ymax - self.ymin) * height as f32) as u32).clamp(1, height - y);
        (x, y, w, h)
    }
}

/// ONNX Runtime session wrapper. `run` needs exclusive access, so the
/// session sits behind a mutex; after load the handle is otherwise
/// read-only and shared across invocations.
struct OnnxSession {
    session: Mutex<Session>,
    input_name: String,
}

impl OnnxSession {
    fn load(path: &Path) -> Result<Self, OcrError> {
        if !path.exists() {
            return Err(OcrError::ModelLoad {
                path: path.to_path_buf(),
                reason: "file not found".to_string(),
            });
        }

        let session = (|| -> Result<Session, ort::Error> {
            Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(4)?
                .commit_from_file(path)
        })()
        .map_err(|e| OcrError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        info!("loaded model {:?} (input '{}')", path, input_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
        })
    }

    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, OcrError> {
        let mut session = self.session.lock();

        let input_value = Value::from_array(input)?;
        let outputs = session.run(ort::inputs![&self.input_name => input_value])?;
        let output = outputs[0].try_extract_array::<f32>()?;

        Ok(output.to_owned())
    }
}

/// Resize to the model input size and pack into a [1, 1, H, W] float
/// tensor scaled to [0, 1].
fn gray_to_tensor(image: &GrayImage, width: u32, height: u32) -> Array4<f32> {
    let resized = if image.dimensions() == (width, height) {
        image.clone()
    } else {
        image::imageops::resize(image, width, height, FilterType::Triangle)
    };

    let mut tensor = Array4::<f32>::zeros((1, 1, height as usize, width as usize));
    for y in 0..height as usize {
        for x in 0..width as usize {
            tensor[[0, 0, y, x]] = resized.get_pixel(x as u32, y as u32).0[0] as f32 / 255.0;
        }
    }
    tensor
}

/// Field-box regression detector: single-channel square input, 12 floats
/// out, reshaped to three `(ymin, xmin, ymax, xmax)` boxes.
pub struct CardDetector {
    session: OnnxSession,
    input_size: u32,
}

impl std::fmt::Debug for CardDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetector")
            .field("input_size", &self.input_size)
            .finish_non_exhaustive()
    }
}

impl CardDetector {
    pub fn load(path: &Path, input_size: u32) -> Result<Self, OcrError> {
        Ok(Self {
            session: OnnxSession::load(path)?,
            input_size,
        })
    }

    pub fn detect(&self, image: &GrayImage) -> Result<Vec<DetectionBox>, OcrError> {
        let tensor = gray_to_tensor(image, self.input_size, self.input_size);
        let output = self.session.run(tensor)?;

        let flat: Vec<f32> = output.iter().copied().collect();
        if flat.len() != 12 {
            return Err(OcrError::BadTensorShape {
                got: output.shape().to_vec(),
                expected: "12 floats (3 boxes of 4)".to_string(),
            });
        }

        let boxes: Vec<DetectionBox> = flat
            .chunks_exact(4)
            .map(|c| DetectionBox::from_raw([c[0], c[1], c[2], c[3]]))
            .collect();
        debug!("detector returned {} field boxes", boxes.len());
        Ok(boxes)
    }
}

/// CRNN-style line recognizer decoded with greedy CTC best-path.
pub struct LineRecognizer {
    session: OnnxSession,
    charset: Vec<char>,
    width: u32,
    height: u32,
}

impl LineRecognizer {
    pub fn load(path: &Path, config: &NeuralConfig) -> Result<Self, OcrError> {
        Ok(Self {
            session: OnnxSession::load(path)?,
            charset: config.charset.chars().collect(),
            width: config.rec_width,
            height: config.rec_height,
        })
    }

    /// Recognize one text line, returning the emitted symbols with their
    /// per-symbol arg-max probabilities.
    pub fn recognize(&self, region: &GrayImage) -> Result<Vec<MatchResult>, OcrError> {
        let tensor = gray_to_tensor(region, self.width, self.height);
        let output = self.session.run(tensor)?;

        let shape = output.shape().to_vec();
        let (timesteps, classes) = match shape.as_slice() {
            [1, t, c] => (*t, *c),
            [t, c] => (*t, *c),
            _ => {
                return Err(OcrError::BadTensorShape {
                    got: shape,
                    expected: "(timesteps, classes) probability tensor".to_string(),
                })
            }
        };
        if classes != self.charset.len() + 1 {
            return Err(OcrError::BadTensorShape {
                got: shape,
                expected: format!("{} classes (charset + blank)", self.charset.len() + 1),
            });
        }

        let probs: Vec<f32> = output.iter().copied().collect();
        let emitted = ctc_best_path(&probs, timesteps, classes, self.charset.len());

        Ok(emitted
            .into_iter()
            .map(|(class, p)| MatchResult {
                ch: self.charset[class],
                confidence: p,
            })
            .collect())
    }
}

/// Greedy CTC best-path decoding.
///
/// At each timestep the arg-max class wins; a symbol is emitted only if it
/// is not the blank class and differs from the immediately preceding
/// timestep's arg-max (repeat collapsing). Returns `(class, probability)`
/// per emitted symbol.
pub fn ctc_best_path(
    probs: &[f32],
    timesteps: usize,
    classes: usize,
    blank: usize,
) -> Vec<(usize, f32)> {
    let mut emitted = Vec::new();
    let mut prev: Option<usize> = None;

    for t in 0..timesteps {
        let row = &probs[t * classes..(t + 1) * classes];
        let (class, p) = row
            .iter()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |(bi, bp), (i, &v)| {
                if v > bp {
                    (i, v)
                } else {
                    (bi, bp)
                }
            });

        if class != blank && prev != Some(class) {
            emitted.push((class, p));
        }
        prev = Some(class);
    }

    emitted
}

/// The complete two-stage neural backend.
pub struct NeuralOcr {
    detector: CardDetector,
    recognizer: LineRecognizer,
    box_fields: [RegionKind; 3],
}

impl NeuralOcr {
    pub fn load(
        detector_path: &Path,
        recognizer_path: &Path,
        config: &NeuralConfig,
    ) -> Result<Self, OcrError> {
        Ok(Self {
            detector: CardDetector::load(detector_path, config.det_input_size)?,
            recognizer: LineRecognizer::load(recognizer_path, config)?,
            box_fields: config.box_fields,
        })
    }

    /// Single-shot extraction: detect the three field boxes, then recognize
    /// each crop. Box order maps to fields via the configured layout.
    pub fn extract(&self, card: &GrayImage) -> Result<Vec<(RegionKind, String, f32)>, OcrError> {
        let boxes = self.detector.detect(card)?;

        let mut fields = Vec::with_capacity(boxes.len());
        for (bbox, &field) in boxes.iter().zip(self.box_fields.iter()) {
            let (x, y, w, h) = bbox.to_pixel_rect(card.width(), card.height());
            let crop = image::imageops::crop_imm(card, x, y, w, h).to_image();

            let matches = self.recognizer.recognize(&crop)?;
            let text: String = matches.iter().map(|m| m.ch).collect();
            let confidence = if matches.is_empty() {
                0.0
            } else {
                matches.iter().map(|m| m.confidence).sum::<f32>() / matches.len() as f32
            };

            debug!(
                "{} box -> {:?} (confidence {:.3})",
                field.name(),
                text,
                confidence
            );
            fields.push((field, text, confidence));
        }

        Ok(fields)
    }
}
