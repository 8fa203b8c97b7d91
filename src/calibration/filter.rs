//! Outlier rejection and weighted averaging of a target's samples
//!
//! Distances are measured in gaze-ratio space from the per-axis median. The
//! spread estimate is the median of those distances (MAD around the median
//! point).

use serde::{Deserialize, Serialize};

use crate::calibration::collector::CalibrationSample;
use crate::schema::Point2;

/// Representative gaze ratio for one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioEstimate {
    pub gaze_h: f64,
    pub gaze_v: f64,
    /// Mean pupil midpoint of the kept samples (camera pixels), when known
    pub pupil: Option<Point2>,
    /// Samples that survived outlier rejection
    pub kept: usize,
}

/// Median of a slice (mean of the two middle values for even lengths)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Drop samples farther than `multiplier` × MAD from the median point.
///
/// Returns the kept samples with their distances. If fewer than two samples
/// would survive, nothing is dropped.
pub fn reject_outliers(
    samples: &[CalibrationSample],
    multiplier: f64,
) -> Vec<(CalibrationSample, f64)> {
    let Some(center) = median_point(samples) else {
        return Vec::new();
    };

    let scored: Vec<(CalibrationSample, f64)> = samples
        .iter()
        .map(|s| (*s, Point2::new(s.gaze_h, s.gaze_v).distance(&center)))
        .collect();

    let distances: Vec<f64> = scored.iter().map(|(_, d)| *d).collect();
    let mad = median(&distances).unwrap_or(0.0);
    let threshold = multiplier * mad;

    let kept: Vec<(CalibrationSample, f64)> = scored
        .iter()
        .filter(|(_, d)| *d <= threshold)
        .copied()
        .collect();

    if kept.len() < 2 {
        scored
    } else {
        kept
    }
}

/// Filter and average a target's samples into one ratio pair.
///
/// Each kept sample is weighted by `1 / (distance + epsilon)`, so samples
/// close to the median dominate.
pub fn estimate_ratio(
    samples: &[CalibrationSample],
    multiplier: f64,
    epsilon: f64,
) -> Option<RatioEstimate> {
    let kept = reject_outliers(samples, multiplier);
    if kept.is_empty() {
        return None;
    }

    let (mut sum_w, mut sum_h, mut sum_v) = (0.0, 0.0, 0.0);
    for (sample, distance) in &kept {
        let w = 1.0 / (distance + epsilon);
        sum_w += w;
        sum_h += w * sample.gaze_h;
        sum_v += w * sample.gaze_v;
    }

    let pupils: Vec<Point2> = kept.iter().filter_map(|(s, _)| s.pupil).collect();
    let pupil = (!pupils.is_empty()).then(|| {
        let n = pupils.len() as f64;
        Point2::new(
            pupils.iter().map(|p| p.x).sum::<f64>() / n,
            pupils.iter().map(|p| p.y).sum::<f64>() / n,
        )
    });

    Some(RatioEstimate {
        gaze_h: sum_h / sum_w,
        gaze_v: sum_v / sum_w,
        pupil,
        kept: kept.len(),
    })
}

fn median_point(samples: &[CalibrationSample]) -> Option<Point2> {
    let h: Vec<f64> = samples.iter().map(|s| s.gaze_h).collect();
    let v: Vec<f64> = samples.iter().map(|s| s.gaze_v).collect();
    Some(Point2::new(median(&h)?, median(&v)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(h: f64, v: f64) -> CalibrationSample {
        CalibrationSample {
            gaze_h: h,
            gaze_v: v,
            pupil: None,
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_rejects_far_outlier() {
        let samples = vec![
            sample(0.50, 0.50),
            sample(0.51, 0.49),
            sample(0.49, 0.51),
            sample(0.50, 0.52),
            sample(0.52, 0.50),
            sample(0.95, 0.05),
        ];
        let kept = reject_outliers(&samples, 3.0);

        assert_eq!(kept.len(), 5);
        assert!(kept.iter().all(|(s, _)| s.gaze_h < 0.9));
    }

    #[test]
    fn test_never_leaves_fewer_than_two() {
        // MAD of 0 keeps only exact matches of the median
        let samples = vec![
            sample(0.5, 0.5),
            sample(0.5, 0.5),
            sample(0.5, 0.5),
            sample(0.1, 0.1),
            sample(0.9, 0.9),
        ];
        assert_eq!(reject_outliers(&samples, 3.0).len(), 3);

        let lone = vec![sample(0.5, 0.5), sample(0.1, 0.1), sample(0.9, 0.9)];
        assert!(reject_outliers(&lone, 0.01).len() >= 2);

        let pair = vec![sample(0.2, 0.2), sample(0.8, 0.8)];
        assert_eq!(reject_outliers(&pair, 0.5).len(), 2);

        for n in 2..12 {
            let spread: Vec<CalibrationSample> = (0..n)
                .map(|i| sample((i * i) as f64 / 150.0, 0.5))
                .collect();
            assert!(reject_outliers(&spread, 0.1).len() >= 2, "n = {n}");
        }
    }

    #[test]
    fn test_single_sample_passes_through() {
        let estimate = estimate_ratio(&[sample(0.3, 0.7)], 3.0, 0.01).unwrap();
        assert_eq!(estimate.kept, 1);
        assert!((estimate.gaze_h - 0.3).abs() < 1e-12);
        assert!((estimate.gaze_v - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_empty_has_no_estimate() {
        assert!(estimate_ratio(&[], 3.0, 0.01).is_none());
    }

    #[test]
    fn test_weighted_average_favours_median() {
        let samples = vec![
            sample(0.50, 0.50),
            sample(0.50, 0.50),
            sample(0.51, 0.50),
            sample(0.56, 0.50),
        ];
        let estimate = estimate_ratio(&samples, 100.0, 0.01).unwrap();

        // Plain mean would be 0.5175; the far sample is down-weighted
        assert_eq!(estimate.kept, 4);
        assert!(estimate.gaze_h > 0.5 && estimate.gaze_h < 0.51);
    }

    #[test]
    fn test_pupil_midpoint_averaged() {
        let samples = vec![
            CalibrationSample {
                gaze_h: 0.5,
                gaze_v: 0.5,
                pupil: Some(Point2::new(100.0, 50.0)),
            },
            CalibrationSample {
                gaze_h: 0.5,
                gaze_v: 0.5,
                pupil: Some(Point2::new(102.0, 52.0)),
            },
            sample(0.5, 0.5),
        ];
        let estimate = estimate_ratio(&samples, 3.0, 0.01).unwrap();
        assert_eq!(estimate.pupil, Some(Point2::new(101.0, 51.0)));
    }
}
