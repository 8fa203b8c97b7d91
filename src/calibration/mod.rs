//! Five-point calibration
//!
//! Collects gaze ratios while the user fixates known screen targets, filters
//! and reduces them per target, and fits the ratio → screen [`Mapping`].

mod collector;
mod engine;
mod filter;
mod mapping;
mod store;
mod target;

pub use collector::{
    CalibrationProgress, CalibrationSample, CollectOutcome, CollectionPhase, TargetCollector,
};
pub use engine::CalibrationEngine;
pub use filter::{estimate_ratio, median, reject_outliers, RatioEstimate};
pub use mapping::{
    AxisFit, CalibrationSummary, Knot, Mapping, TargetRecord, CALIBRATION_SCHEMA_VERSION,
};
pub use store::{load_mapping, save_mapping};
pub use target::{standard_targets, CalibrationTarget, TargetId, REQUIRED_TARGETS};
