//! cardscan - offline OCR for institution ID cards
//!
//! Extracts an institution name, a person's name, and a register number
//! from a photographed ID card without any cloud OCR service, then
//! validates the institution against a closed whitelist with fuzzy
//! matching. Built for noisy, skewed, variable-contrast captures,
//! including photos of a card rendered on a phone screen.
//!
//! Two interchangeable recognition backends:
//! - a transparent nearest-neighbor template matcher over a fixed
//!   A-Z / 0-9 bitmap set, and
//! - a two-stage ONNX detector + CTC-decoded line recognizer for
//!   single-shot full-card extraction.
//!
//! ```no_run
//! use cardscan::{DirTemplateSource, OcrConfig, OcrPipeline};
//!
//! let pipeline = OcrPipeline::new(
//!     OcrConfig::default(),
//!     Box::new(DirTemplateSource::new("assets/templates")),
//! );
//! # let (rgba, width, height) = (vec![0u8; 4], 1u32, 1u32);
//! let result = pipeline.scan(&rgba, width, height)?;
//! println!("{} ({})", result.institution, result.confidence);
//! # Ok::<(), cardscan::OcrError>(())
//! ```

pub mod assemble;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod preprocess;
pub mod recognize;
pub mod regions;
pub mod segment;
pub mod templates;
pub mod validate;

pub use config::OcrConfig;
pub use error::OcrError;
pub use pipeline::{FieldResult, OcrPipeline, OcrResult, UNKNOWN_INSTITUTION};
pub use preprocess::BinaryImage;
pub use recognize::{LabelFilter, MatchResult, NeuralOcr, Recognizer, TemplateRecognizer};
pub use regions::RegionKind;
pub use templates::{DirTemplateSource, TemplateSource, TemplateStore};
