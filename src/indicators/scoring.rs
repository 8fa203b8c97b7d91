//! Composite score and behavioral indicator rules

use crate::config::IndicatorConfig;
use crate::indicators::types::{ComponentBreakdown, ComponentTerm, Indicator, IndicatorKind};

/// Session metrics that feed the score and the indicator rules
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub center_focus_ratio: f64,
    pub edge_gaze_ratio: f64,
    /// Look-away runs per minute
    pub look_away_rate: f64,
    /// Blinks per minute
    pub blink_rate: f64,
    /// Saccades per minute
    pub saccade_rate: f64,
    pub mean_blink_duration: f64,
    pub blink_duration_variance: f64,
    pub mean_gaze_velocity: f64,
    /// At least one valid gaze point exists
    pub has_gaze: bool,
    /// Session lasted longer than zero seconds
    pub has_duration: bool,
}

/// Build the per-term breakdown.
///
/// Without any valid gaze point the gaze-derived terms are zero and only the
/// blink term can contribute.
pub fn score(inputs: &ScoreInputs, config: &IndicatorConfig) -> ComponentBreakdown {
    let w = &config.weights;

    let blink = ComponentTerm::new(
        inputs.blink_rate,
        config.blink_rate_range.normalize(inputs.blink_rate),
        w.blink,
    );

    if !inputs.has_gaze {
        return ComponentBreakdown {
            center_avoidance: ComponentTerm::zero(w.center_avoidance),
            look_away: ComponentTerm::zero(w.look_away),
            blink,
            saccade: ComponentTerm::zero(w.saccade),
            edge_fixation: ComponentTerm::zero(w.edge_fixation),
        };
    }

    let avoidance = 1.0 - inputs.center_focus_ratio;
    ComponentBreakdown {
        center_avoidance: ComponentTerm::new(
            avoidance,
            avoidance.clamp(0.0, 1.0),
            w.center_avoidance,
        ),
        look_away: ComponentTerm::new(
            inputs.look_away_rate,
            config.look_away_rate_range.normalize(inputs.look_away_rate),
            w.look_away,
        ),
        blink,
        saccade: ComponentTerm::new(
            inputs.saccade_rate,
            config.saccade_rate_range.normalize(inputs.saccade_rate),
            w.saccade,
        ),
        edge_fixation: ComponentTerm::new(
            inputs.edge_gaze_ratio,
            config.edge_ratio_range.normalize(inputs.edge_gaze_ratio),
            w.edge_fixation,
        ),
    }
}

/// Raise the behavioral indicators the metrics cross
pub fn indicators(inputs: &ScoreInputs, config: &IndicatorConfig) -> Vec<Indicator> {
    let th = &config.thresholds;
    let mut out = Vec::new();

    if inputs.has_duration {
        if inputs.blink_rate > th.high_blink_rate {
            out.push(Indicator::new(IndicatorKind::HighBlinkRate, inputs.blink_rate));
        } else if inputs.blink_rate < th.low_blink_rate {
            out.push(Indicator::new(IndicatorKind::LowBlinkRate, inputs.blink_rate));
        }
    }

    if inputs.mean_blink_duration > 0.0 {
        if inputs.mean_blink_duration < th.rapid_blink_secs {
            out.push(Indicator::new(
                IndicatorKind::RapidBlinking,
                inputs.mean_blink_duration,
            ));
        } else if inputs.mean_blink_duration > th.prolonged_blink_secs {
            out.push(Indicator::new(
                IndicatorKind::ProlongedBlinks,
                inputs.mean_blink_duration,
            ));
        }
    }

    if inputs.blink_duration_variance > th.irregular_blink_variance {
        out.push(Indicator::new(
            IndicatorKind::IrregularBlinking,
            inputs.blink_duration_variance,
        ));
    }

    if !inputs.has_gaze {
        return out;
    }

    if inputs.saccade_rate > th.excessive_saccade_rate {
        out.push(Indicator::new(IndicatorKind::ExcessiveSaccades, inputs.saccade_rate));
    }

    if inputs.center_focus_ratio < th.strong_avoidance_ratio {
        out.push(Indicator::new(
            IndicatorKind::StrongCenterAvoidance,
            inputs.center_focus_ratio,
        ));
    } else if inputs.center_focus_ratio < th.moderate_avoidance_ratio {
        out.push(Indicator::new(
            IndicatorKind::ModerateCenterAvoidance,
            inputs.center_focus_ratio,
        ));
    }

    if inputs.edge_gaze_ratio > th.high_edge_ratio {
        out.push(Indicator::new(IndicatorKind::HighEdgeFixation, inputs.edge_gaze_ratio));
    }

    if inputs.mean_gaze_velocity > th.rapid_scan_velocity {
        out.push(Indicator::new(IndicatorKind::RapidScanning, inputs.mean_gaze_velocity));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm() -> ScoreInputs {
        ScoreInputs {
            center_focus_ratio: 1.0,
            edge_gaze_ratio: 0.0,
            look_away_rate: 0.0,
            blink_rate: 15.0,
            saccade_rate: 0.0,
            mean_blink_duration: 0.2,
            blink_duration_variance: 0.0,
            mean_gaze_velocity: 20.0,
            has_gaze: true,
            has_duration: true,
        }
    }

    #[test]
    fn test_calm_session_scores_zero() {
        let config = IndicatorConfig::default();
        let breakdown = score(&calm(), &config);

        assert_eq!(breakdown.total(), 0.0);
        assert!(indicators(&calm(), &config).is_empty());
    }

    #[test]
    fn test_every_term_saturates() {
        let config = IndicatorConfig::default();
        let inputs = ScoreInputs {
            center_focus_ratio: 0.0,
            edge_gaze_ratio: 0.9,
            look_away_rate: 60.0,
            blink_rate: 45.0,
            saccade_rate: 400.0,
            ..calm()
        };
        let breakdown = score(&inputs, &config);

        assert!((breakdown.total() - 1.0).abs() < 1e-12);
        assert_eq!(breakdown.edge_fixation.normalized, 1.0);
        assert_eq!(breakdown.edge_fixation.raw, 0.9);
    }

    #[test]
    fn test_partial_terms() {
        let config = IndicatorConfig::default();
        let inputs = ScoreInputs {
            center_focus_ratio: 0.5,
            look_away_rate: 10.0,
            ..calm()
        };
        let breakdown = score(&inputs, &config);

        assert!((breakdown.center_avoidance.contribution - 0.15).abs() < 1e-12);
        assert!((breakdown.look_away.contribution - 0.10).abs() < 1e-12);
        assert!((breakdown.total() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_no_gaze_keeps_only_blink_term() {
        let config = IndicatorConfig::default();
        let inputs = ScoreInputs {
            center_focus_ratio: 0.0,
            blink_rate: 30.0,
            has_gaze: false,
            ..calm()
        };
        let breakdown = score(&inputs, &config);

        assert_eq!(breakdown.center_avoidance.contribution, 0.0);
        assert!((breakdown.total() - 0.20).abs() < 1e-12);
    }

    #[test]
    fn test_indicator_rules() {
        let config = IndicatorConfig::default();
        let inputs = ScoreInputs {
            center_focus_ratio: 0.3,
            edge_gaze_ratio: 0.35,
            blink_rate: 35.0,
            mean_blink_duration: 0.05,
            mean_gaze_velocity: 200.0,
            ..calm()
        };
        let kinds: Vec<IndicatorKind> = indicators(&inputs, &config)
            .iter()
            .map(|i| i.kind)
            .collect();

        assert_eq!(
            kinds,
            vec![
                IndicatorKind::HighBlinkRate,
                IndicatorKind::RapidBlinking,
                IndicatorKind::ModerateCenterAvoidance,
                IndicatorKind::HighEdgeFixation,
                IndicatorKind::RapidScanning,
            ]
        );
    }

    #[test]
    fn test_zero_duration_raises_no_blink_rate_indicator() {
        let config = IndicatorConfig::default();
        let inputs = ScoreInputs {
            blink_rate: 0.0,
            has_duration: false,
            ..calm()
        };
        assert!(indicators(&inputs, &config).is_empty());
    }
}
