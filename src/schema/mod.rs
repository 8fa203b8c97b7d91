//! Unified gaze.raw_sample.v1 schema
//!
//! This module defines the detector-agnostic input schema for per-frame gaze
//! samples, plus the adapter that parses and sanitizes recorded streams.

mod adapter;
mod raw_sample;

pub use adapter::*;
pub use raw_sample::*;
