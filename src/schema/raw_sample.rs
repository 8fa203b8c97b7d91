//! gaze.raw_sample.v1 schema definition
//!
//! One record per camera frame, as produced by whatever pupil detector sits
//! upstream. Every measurement is optional: a detector that loses the eyes for
//! a frame simply leaves the fields out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "gaze.raw_sample.v1";

/// A point in camera (pupil) space or screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Midpoint between two points
    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A single raw gaze sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Schema version identifier (optional on the wire)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Frame timestamp (UTC), strictly increasing within a stream
    pub timestamp: DateTime<Utc>,
    /// Left pupil position in camera pixels
    #[serde(default)]
    pub pupil_left: Option<Point2>,
    /// Right pupil position in camera pixels
    #[serde(default)]
    pub pupil_right: Option<Point2>,
    /// Horizontal gaze ratio (0.0-1.0) relative to the eye region
    #[serde(default)]
    pub gaze_h: Option<f64>,
    /// Vertical gaze ratio (0.0-1.0) relative to the eye region
    #[serde(default)]
    pub gaze_v: Option<f64>,
    /// Whether the detector reports the eyes as closed
    #[serde(default)]
    pub blinking: bool,
}

impl RawSample {
    /// Create a sample with every measurement absent
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            schema_version: None,
            timestamp,
            pupil_left: None,
            pupil_right: None,
            gaze_h: None,
            gaze_v: None,
            blinking: false,
        }
    }

    /// Create a sample carrying only gaze ratios
    pub fn with_ratios(timestamp: DateTime<Utc>, gaze_h: f64, gaze_v: f64) -> Self {
        Self {
            gaze_h: Some(gaze_h),
            gaze_v: Some(gaze_v),
            ..Self::empty(timestamp)
        }
    }

    /// Set both pupil positions
    pub fn with_pupils(mut self, left: Point2, right: Point2) -> Self {
        self.pupil_left = Some(left);
        self.pupil_right = Some(right);
        self
    }

    /// Set the blink flag
    pub fn blinking(mut self, blinking: bool) -> Self {
        self.blinking = blinking;
        self
    }

    /// Both gaze ratios, if both are present
    pub fn gaze_ratio(&self) -> Option<(f64, f64)> {
        match (self.gaze_h, self.gaze_v) {
            (Some(h), Some(v)) => Some((h, v)),
            _ => None,
        }
    }

    /// Midpoint of both pupils, if both are present
    pub fn pupil_midpoint(&self) -> Option<Point2> {
        match (self.pupil_left, self.pupil_right) {
            (Some(l), Some(r)) => Some(l.midpoint(&r)),
            _ => None,
        }
    }

    /// Validate the sample against the schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(version) = &self.schema_version {
            if version != SCHEMA_VERSION {
                return Err(ValidationError::InvalidSchemaVersion {
                    expected: SCHEMA_VERSION.to_string(),
                    actual: version.clone(),
                });
            }
        }

        for (field, value) in [("gaze_h", self.gaze_h), ("gaze_v", self.gaze_v)] {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(ValidationError::NonFiniteValue {
                        field: field.to_string(),
                    });
                }
                if !(0.0..=1.0).contains(&v) {
                    return Err(ValidationError::RatioOutOfRange {
                        field: field.to_string(),
                        value: v,
                    });
                }
            }
        }

        for (field, value) in [("pupil_left", self.pupil_left), ("pupil_right", self.pupil_right)] {
            if let Some(p) = value {
                if !p.is_finite() {
                    return Err(ValidationError::NonFiniteValue {
                        field: field.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Drop measurements that cannot be trusted.
    ///
    /// Non-finite values and ratios outside 0.0-1.0 become absent; nothing is
    /// clamped or invented.
    pub fn sanitized(mut self) -> Self {
        let ratio_ok = |v: &f64| v.is_finite() && (0.0..=1.0).contains(v);
        self.gaze_h = self.gaze_h.filter(ratio_ok);
        self.gaze_v = self.gaze_v.filter(ratio_ok);
        self.pupil_left = self.pupil_left.filter(Point2::is_finite);
        self.pupil_right = self.pupil_right.filter(Point2::is_finite);
        self
    }
}

/// Validation errors for raw samples
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Gaze ratio {field} out of range 0.0-1.0: {value}")]
    RatioOutOfRange { field: String, value: f64 },

    #[error("Non-finite value in {field}")]
    NonFiniteValue { field: String },

    #[error("Timestamp does not increase over the previous sample")]
    NonIncreasingTimestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_deserialize_minimal_sample() {
        let json = r#"{ "timestamp": "2024-03-01T10:00:00Z" }"#;
        let sample: RawSample = serde_json::from_str(json).unwrap();

        assert_eq!(sample.timestamp, ts());
        assert!(sample.gaze_h.is_none());
        assert!(sample.pupil_left.is_none());
        assert!(!sample.blinking);
        assert!(sample.validate().is_ok());
    }

    #[test]
    fn test_deserialize_full_sample() {
        let json = r#"{
            "schema_version": "gaze.raw_sample.v1",
            "timestamp": "2024-03-01T10:00:00.033Z",
            "pupil_left": { "x": 210.0, "y": 180.5 },
            "pupil_right": { "x": 290.0, "y": 181.5 },
            "gaze_h": 0.52,
            "gaze_v": 0.47,
            "blinking": false
        }"#;
        let sample: RawSample = serde_json::from_str(json).unwrap();

        assert_eq!(sample.gaze_ratio(), Some((0.52, 0.47)));
        assert_eq!(sample.pupil_midpoint(), Some(Point2::new(250.0, 181.0)));
        assert!(sample.validate().is_ok());
    }

    #[test]
    fn test_gaze_ratio_requires_both_axes() {
        let mut sample = RawSample::with_ratios(ts(), 0.4, 0.6);
        sample.gaze_v = None;
        assert!(sample.gaze_ratio().is_none());
    }

    #[test]
    fn test_validation_rejects_out_of_range_ratio() {
        let sample = RawSample::with_ratios(ts(), 1.2, 0.5);
        assert!(matches!(
            sample.validate(),
            Err(ValidationError::RatioOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_wrong_schema() {
        let mut sample = RawSample::with_ratios(ts(), 0.5, 0.5);
        sample.schema_version = Some("gaze.raw_sample.v0".to_string());
        assert!(matches!(
            sample.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));
    }

    #[test]
    fn test_sanitized_drops_bad_fields_only() {
        let sample = RawSample::with_ratios(ts(), f64::NAN, 0.3)
            .with_pupils(Point2::new(1.0, 2.0), Point2::new(f64::INFINITY, 2.0));
        let clean = sample.sanitized();

        assert!(clean.gaze_h.is_none());
        assert_eq!(clean.gaze_v, Some(0.3));
        assert!(clean.pupil_left.is_some());
        assert!(clean.pupil_right.is_none());
        assert!(clean.validate().is_ok());
    }
}
