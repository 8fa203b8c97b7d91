//! Adapter for reading recorded gaze.raw_sample.v1 streams
//!
//! Parses NDJSON or JSON-array recordings into `RawSample`s, enforcing the
//! strictly increasing timestamp contract and sanitizing untrusted fields.

use crate::error::ComputeError;
use crate::schema::raw_sample::*;
use log::warn;

/// Adapter for converting recorded payloads into raw samples
pub struct RawSampleAdapter;

impl RawSampleAdapter {
    /// Parse a JSON string containing an array of RawSamples
    pub fn parse_array(json: &str) -> Result<Vec<RawSample>, ComputeError> {
        let samples: Vec<RawSample> = serde_json::from_str(json)?;
        Ok(samples)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawSamples
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawSample>, ComputeError> {
        let mut samples = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawSample>(trimmed) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(samples)
    }

    /// Prepare parsed samples for the pipeline.
    ///
    /// Rejects a stream whose timestamps do not strictly increase, and turns
    /// out-of-range or non-finite measurements into absent fields.
    pub fn to_stream(samples: Vec<RawSample>) -> Result<Vec<RawSample>, ComputeError> {
        let mut stream = Vec::with_capacity(samples.len());
        let mut dropped_fields = 0usize;

        for (idx, sample) in samples.into_iter().enumerate() {
            if let Some(prev) = stream.last().map(|s: &RawSample| s.timestamp) {
                if sample.timestamp <= prev {
                    return Err(ComputeError::OutOfOrderSample(format!(
                        "sample {} at {} does not follow {}",
                        idx,
                        sample.timestamp.to_rfc3339(),
                        prev.to_rfc3339()
                    )));
                }
            }

            if let Err(e) = sample.validate() {
                if let ValidationError::InvalidSchemaVersion { .. } = e {
                    return Err(ComputeError::ParseError(format!("Invalid sample {}: {}", idx, e)));
                }
                dropped_fields += 1;
            }
            stream.push(sample.sanitized());
        }

        if dropped_fields > 0 {
            warn!(
                "{} samples carried out-of-range or non-finite fields; those fields were treated as absent",
                dropped_fields
            );
        }

        Ok(stream)
    }

    /// Validate a batch of samples, including timestamp ordering
    pub fn validate_samples(samples: &[RawSample]) -> Vec<ValidationResult> {
        samples
            .iter()
            .enumerate()
            .filter_map(|(idx, sample)| {
                let ordering = match idx {
                    0 => Ok(()),
                    _ if sample.timestamp <= samples[idx - 1].timestamp => {
                        Err(ValidationError::NonIncreasingTimestamp)
                    }
                    _ => Ok(()),
                };
                ordering
                    .and_then(|_| sample.validate())
                    .err()
                    .map(|error| ValidationResult {
                        index: idx,
                        timestamp: sample.timestamp.to_rfc3339(),
                        error,
                    })
            })
            .collect()
    }
}

/// A sample that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub timestamp: String,
    pub error: ValidationError,
}
