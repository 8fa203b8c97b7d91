//! Session analysis

use log::{debug, warn};

use crate::config::IndicatorConfig;
use crate::error::ComputeError;
use crate::indicators::events::{BlinkStats, LookAwayStats, SaccadeStats};
use crate::indicators::regions::{CenterRegion, FocusStats};
use crate::indicators::scoring::{self, ScoreInputs};
use crate::indicators::types::{AssessmentLevel, IndicatorReport, ReportFlag, SessionSummary};
use crate::session::SessionTrace;

/// Derives an [`IndicatorReport`] from a frozen trace.
///
/// Analysis is a pure function of the trace and the configuration: running it
/// twice on the same trace yields identical reports.
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    /// Create an engine; the configuration is validated first
    pub fn new(config: IndicatorConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    pub fn analyze(&self, trace: &SessionTrace) -> IndicatorReport {
        let config = &self.config;
        let screen = trace.screen();
        let entries = trace.entries();
        let region = CenterRegion::new(screen, config.center_area_fraction);

        let focus = FocusStats::compute(
            entries.iter().map(|e| &e.point),
            &region,
            screen,
            config.edge_margin_px,
        );
        let look_away = LookAwayStats::compute(entries, &region);
        let blinks = BlinkStats::compute(entries);
        let saccades = SaccadeStats::compute(entries, config.saccade_velocity_threshold);

        let total = entries.len();
        let valid = focus.valid_points;
        let data_loss_ratio = if total == 0 {
            0.0
        } else {
            (total - valid) as f64 / total as f64
        };

        let duration_secs = trace.duration_secs();
        let minutes = duration_secs / 60.0;
        let per_minute = |count: usize| {
            if minutes > 0.0 {
                count as f64 / minutes
            } else {
                0.0
            }
        };

        let inputs = ScoreInputs {
            center_focus_ratio: focus.center_focus_ratio,
            edge_gaze_ratio: focus.edge_gaze_ratio,
            look_away_rate: per_minute(look_away.count),
            blink_rate: per_minute(blinks.count),
            saccade_rate: per_minute(saccades.count),
            mean_blink_duration: blinks.mean_duration,
            blink_duration_variance: blinks.duration_variance,
            mean_gaze_velocity: saccades.mean_gaze_velocity,
            has_gaze: valid > 0,
            has_duration: duration_secs > 0.0,
        };

        let breakdown = scoring::score(&inputs, config);
        let composite_score = breakdown.total().clamp(0.0, 1.0);
        let indicators = scoring::indicators(&inputs, config);

        let mut flags = Vec::new();
        if valid == 0 {
            warn!("Session {} has no valid gaze points", trace.session_id());
            flags.push(ReportFlag::DegenerateSession);
        }
        if data_loss_ratio > config.high_data_loss_ratio {
            flags.push(ReportFlag::HighDataLoss);
        }
        if duration_secs < config.min_session_secs {
            flags.push(ReportFlag::ShortSession);
        }
        if !trace.is_calibrated() {
            flags.push(ReportFlag::NoMapping);
        }

        debug!(
            "Session {}: {} samples, {} valid, score {:.3}",
            trace.session_id(),
            total,
            valid,
            composite_score
        );

        IndicatorReport {
            session_id: trace.session_id(),
            valid: valid > 0,
            summary: SessionSummary {
                started_at: trace.started_at(),
                ended_at: trace.ended_at(),
                duration_secs,
                total_samples: total,
                valid_samples: valid,
                detection_rate: if total == 0 { 0.0 } else { 1.0 - data_loss_ratio },
                calibrated: trace.is_calibrated(),
            },
            data_loss_ratio,
            center_focus_ratio: focus.center_focus_ratio,
            center_accuracy: focus.center_accuracy,
            edge_gaze_ratio: focus.edge_gaze_ratio,
            look_away_count: look_away.count,
            look_away_mean_duration: look_away.mean_duration,
            look_away_rate: inputs.look_away_rate,
            blink_count: blinks.count,
            blink_rate: inputs.blink_rate,
            blink_durations: blinks.durations,
            mean_blink_duration: blinks.mean_duration,
            blink_duration_variance: blinks.duration_variance,
            saccade_count: saccades.count,
            saccade_rate: inputs.saccade_rate,
            mean_saccade_velocity: saccades.mean_velocity,
            mean_gaze_velocity: saccades.mean_gaze_velocity,
            composite_score,
            assessment: AssessmentLevel::from_score(composite_score),
            component_breakdown: breakdown,
            indicators,
            flags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScreenGeometry;
    use crate::mapper::ScreenPoint;
    use crate::session::TraceBuilder;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn trace(points: &[(ScreenPoint, bool)], step_ms: i64) -> SessionTrace {
        let mut builder = TraceBuilder::new(ScreenGeometry::default()).calibrated(true);
        for (i, (point, blinking)) in points.iter().enumerate() {
            builder
                .push_point(t(i as i64 * step_ms), *point, *blinking)
                .unwrap();
        }
        builder.freeze()
    }

    fn inside() -> ScreenPoint {
        ScreenPoint::new(960.0, 540.0, 1.0)
    }

    fn outside() -> ScreenPoint {
        ScreenPoint::new(300.0, 540.0, 1.0)
    }

    #[test]
    fn test_all_inside_full_focus() {
        let points = vec![(inside(), false); 60];
        let report = IndicatorEngine::default().analyze(&trace(&points, 500));

        assert!(report.valid);
        assert_eq!(report.center_focus_ratio, 1.0);
        assert_eq!(report.look_away_count, 0);
        assert_eq!(report.data_loss_ratio, 0.0);
        assert_eq!(report.blink_rate, 0.0);
        assert!(report.flags.is_empty());
    }

    #[test]
    fn test_empty_trace_is_degenerate() {
        let empty = TraceBuilder::new(ScreenGeometry::default()).freeze();
        let report = IndicatorEngine::default().analyze(&empty);

        assert!(!report.valid);
        assert_eq!(report.center_focus_ratio, 0.0);
        assert_eq!(report.blink_rate, 0.0);
        assert_eq!(report.composite_score, 0.0);
        assert!(report.has_flag(ReportFlag::DegenerateSession));
        assert!(report.has_flag(ReportFlag::ShortSession));
    }

    #[test]
    fn test_all_invalid_keeps_blink_term() {
        // One blink every 2 s for 60 s: 30/min
        let points: Vec<(ScreenPoint, bool)> = (0..121)
            .map(|i| (ScreenPoint::invalid(), i % 4 == 1))
            .collect();
        let report = IndicatorEngine::default().analyze(&trace(&points, 500));

        assert!(!report.valid);
        assert_eq!(report.data_loss_ratio, 1.0);
        assert_eq!(report.blink_count, 30);
        assert!((report.blink_rate - 30.0).abs() < 1e-9);
        assert_eq!(report.component_breakdown.center_avoidance.contribution, 0.0);
        assert!((report.composite_score - 0.20).abs() < 1e-9);
        assert!(report.has_flag(ReportFlag::DegenerateSession));
        assert!(report.has_flag(ReportFlag::HighDataLoss));
    }

    #[test]
    fn test_alternating_look_aways() {
        let points: Vec<(ScreenPoint, bool)> = (0..100)
            .map(|i| (if i % 2 == 0 { outside() } else { inside() }, false))
            .collect();
        let report = IndicatorEngine::default().analyze(&trace(&points, 100));

        assert_eq!(report.look_away_count, 50);
        assert_eq!(report.center_focus_ratio, 0.5);
    }

    #[test]
    fn test_analyze_is_idempotent() {
        let points: Vec<(ScreenPoint, bool)> = (0..200)
            .map(|i| {
                let point = match i % 7 {
                    0 => ScreenPoint::invalid(),
                    1 | 2 => outside(),
                    3 => ScreenPoint::new(40.0, 1050.0, 0.8),
                    _ => inside(),
                };
                (point, i % 11 == 3)
            })
            .collect();
        let trace = trace(&points, 33);
        let engine = IndicatorEngine::default();

        let first = engine.analyze(&trace);
        let second = engine.analyze(&trace);
        assert_eq!(first, second);
        assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    }

    #[test]
    fn test_composite_matches_breakdown() {
        let points: Vec<(ScreenPoint, bool)> = (0..120)
            .map(|i| (if i % 3 == 0 { outside() } else { inside() }, i % 10 == 5))
            .collect();
        let report = IndicatorEngine::default().analyze(&trace(&points, 250));

        assert!((report.composite_score - report.component_breakdown.total()).abs() < 1e-12);
        assert_eq!(
            report.assessment,
            AssessmentLevel::from_score(report.composite_score)
        );
        assert!(report.composite_score >= 0.0 && report.composite_score <= 1.0);
    }

    #[test]
    fn test_new_rejects_nan_center_fraction() {
        let config = IndicatorConfig {
            center_area_fraction: f64::NAN,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            IndicatorEngine::new(config),
            Err(ComputeError::InvalidConfig(_))
        ));
        assert!(IndicatorEngine::new(IndicatorConfig::default()).is_ok());
    }

    #[test]
    fn test_uncalibrated_trace_flagged() {
        let trace = TraceBuilder::new(ScreenGeometry::default())
            .calibrated(false)
            .freeze();
        let report = IndicatorEngine::default().analyze(&trace);
        assert!(report.has_flag(ReportFlag::NoMapping));
    }

    #[test]
    fn test_unmarked_builder_reports_no_mapping() {
        let mut builder = TraceBuilder::new(ScreenGeometry::default());
        for i in 0..40 {
            builder.push_point(t(i * 500), inside(), false).unwrap();
        }
        let report = IndicatorEngine::default().analyze(&builder.freeze());
        assert!(report.has_flag(ReportFlag::NoMapping));
        assert_eq!(report.center_focus_ratio, 1.0);
    }
}
