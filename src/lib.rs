//! Gazemetry - Gaze calibration and behavioral indicator engine
//!
//! Gazemetry turns per-frame gaze ratios from an eye detector into screen
//! coordinates and scores a recorded session for gaze patterns associated with
//! social anxiety:
//! calibration (5 targets → mapping) → recording (sanitize → smooth → map)
//! → analysis (indicators → composite score) → report encoding.
//!
//! ## Modules
//!
//! - **Calibration**: Collect samples per target and fit a persisted mapping
//! - **Session**: Record a stream of samples into a frozen screen-space trace
//! - **Indicators**: Derive behavioral metrics and the composite score from a trace

pub mod calibration;
pub mod config;
pub mod encoder;
pub mod error;
pub mod indicators;
pub mod mapper;
pub mod pipeline;
pub mod schema;
pub mod session;
pub mod smoother;
pub mod source;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use calibration::{CalibrationEngine, Mapping};
pub use config::GazeConfig;
pub use error::ComputeError;
pub use indicators::{IndicatorEngine, IndicatorReport};
pub use pipeline::{analyze_samples, calibrate_samples, samples_to_calibration, samples_to_report, GazeProcessor};
pub use session::{SessionRecorder, SessionTrace};

// Schema exports
pub use schema::{RawSample, RawSampleAdapter, SCHEMA_VERSION};

/// Gazemetry version embedded in every report envelope
pub const GAZEMETRY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report envelopes
pub const PRODUCER_NAME: &str = "gazemetry";
