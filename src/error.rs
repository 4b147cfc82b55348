//! Error types for the OCR pipeline
//!
//! Recoverable per-field issues (a low-confidence candidate, a failed
//! whitelist match) degrade the corresponding field and never surface here.
//! Environment-level failures (bad input, missing models, runtime errors)
//! are typed so callers can decide user-facing messaging.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the OCR pipeline.
#[derive(Debug, Error)]
pub enum OcrError {
    /// Input buffer is empty, zero-sized, or too short for its dimensions.
    #[error("input image is empty or truncated ({width}x{height})")]
    EmptyInput { width: u32, height: u32 },

    /// The template store loaded zero usable character templates.
    #[error("no character templates available")]
    NoTemplates,

    /// A neural model file could not be loaded.
    #[error("failed to load model {path:?}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// The neural backend was requested but no model paths were configured.
    #[error("neural backend requested but no model paths configured")]
    ModelsNotConfigured,

    /// ONNX Runtime inference failed. Fatal for the invocation; never
    /// converted to an empty result.
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),

    /// A model produced output with an unexpected shape.
    #[error("unexpected tensor shape {got:?}, expected {expected}")]
    BadTensorShape { got: Vec<usize>, expected: String },
}
