//! Raw sample to screen coordinate mapping

use serde::{Deserialize, Serialize};

use crate::calibration::Mapping;
use crate::schema::RawSample;

/// A gaze position on screen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
    /// False when the sample lacked gaze ratios or no mapping was available
    pub valid: bool,
    /// 1.0 inside the calibrated ratio range, lower when extrapolating
    pub confidence: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64, confidence: f64) -> Self {
        Self {
            x,
            y,
            valid: true,
            confidence,
        }
    }

    /// A point carrying no position
    pub fn invalid() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            valid: false,
            confidence: 0.0,
        }
    }

    /// Straight-line distance in pixels
    pub fn distance(&self, other: &ScreenPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Applies a calibration mapping to raw samples
pub struct ScreenMapper;

impl ScreenMapper {
    /// Map one sample to the screen.
    ///
    /// The result is clamped to the mapping's screen bounds.
    pub fn map(sample: &RawSample, mapping: Option<&Mapping>) -> ScreenPoint {
        let (Some(mapping), Some((h, v))) = (mapping, sample.gaze_ratio()) else {
            return ScreenPoint::invalid();
        };

        let (x, y) = mapping.apply(h, v);
        let (x, y) = mapping.screen().clamp(x, y);
        ScreenPoint::new(x, y, mapping.confidence(h, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{standard_targets, TargetId, TargetRecord};
    use crate::config::ScreenGeometry;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    fn mapping() -> Mapping {
        let screen = ScreenGeometry::default();
        let records = standard_targets(&screen, 150)
            .into_iter()
            .map(|t| TargetRecord {
                id: t.id,
                screen_x: t.screen_x,
                screen_y: t.screen_y,
                gaze_h: 0.30 + 0.40 * t.screen_x / 1920.0,
                gaze_v: 0.35 + 0.30 * t.screen_y / 1080.0,
                pupil: None,
                samples_collected: 10,
                samples_kept: 10,
            })
            .collect();
        Mapping::fit(screen, records, 10, ts()).unwrap()
    }

    #[test]
    fn test_center_ratio_maps_to_center() {
        let mapping = mapping();
        let center = mapping.target(TargetId::Center).unwrap();
        let sample = RawSample::with_ratios(ts(), center.gaze_h, center.gaze_v);

        let point = ScreenMapper::map(&sample, Some(&mapping));
        assert_eq!((point.x, point.y), (960.0, 540.0));
        assert!(point.valid);
        assert_eq!(point.confidence, 1.0);
    }

    #[test]
    fn test_missing_ratio_invalid() {
        let mapping = mapping();
        let mut sample = RawSample::with_ratios(ts(), 0.5, 0.5);
        sample.gaze_h = None;

        assert!(!ScreenMapper::map(&sample, Some(&mapping)).valid);
    }

    #[test]
    fn test_no_mapping_invalid() {
        let sample = RawSample::with_ratios(ts(), 0.5, 0.5);
        let point = ScreenMapper::map(&sample, None);
        assert_eq!(point, ScreenPoint::invalid());
    }

    #[test]
    fn test_out_of_range_stays_on_screen_with_lower_confidence() {
        let mapping = mapping();
        let sample = RawSample::with_ratios(ts(), 0.99, 0.01);
        let point = ScreenMapper::map(&sample, Some(&mapping));

        assert!(point.valid);
        assert!(point.x >= 0.0 && point.x <= 1920.0);
        assert!(point.y >= 0.0 && point.y <= 1080.0);
        assert!(point.confidence < 1.0);
    }
}
