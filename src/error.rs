//! Error types for Gazemetry
//!
//! Missing fields in a sample are never errors; they travel as `None` through
//! the pipeline. Only structural failures surface here.

use thiserror::Error;

use crate::calibration::TargetId;

/// Errors that can occur during calibration, persistence, or session recording
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Insufficient samples for target {target}: no usable sample within {timeout_ms} ms")]
    InsufficientSamples { target: TargetId, timeout_ms: u64 },

    #[error("Sample source ended before calibration completed (waiting on target {0})")]
    SourceExhausted(TargetId),

    #[error("Calibration is not complete: {completed} of {required} targets collected")]
    CalibrationIncomplete { completed: usize, required: usize },

    #[error("Invalid calibration: {0}")]
    CalibrationInvalid(String),

    #[error("Calibration not found: {0}")]
    CalibrationNotFound(String),

    #[error("Sample out of order: {0}")]
    OutOfOrderSample(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse sample payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
