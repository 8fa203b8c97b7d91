//! Tunable parameters for calibration and scoring
//!
//! Every threshold the engines use lives here with a documented default, so a
//! deployment can tune them from a JSON file instead of patching constants.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};

/// Screen dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Screen midpoint in pixels
    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Clamp a coordinate pair into the pixel bounds
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(0.0, self.width as f64),
            y.clamp(0.0, self.height as f64),
        )
    }
}

/// Smoothing parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Centered moving-average window in samples (1 disables smoothing)
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

/// Calibration collection and fitting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Distance of the corner targets from the screen edges (pixels)
    pub target_margin_px: u32,
    /// Accepted samples that complete a target
    pub samples_per_target: usize,
    /// Collection time that completes a target (milliseconds)
    pub target_duration_ms: u64,
    /// Time without a single accepted sample that aborts calibration (milliseconds)
    pub hard_timeout_ms: u64,
    /// Samples arriving this soon after a target is shown are discarded (milliseconds)
    pub settle_ms: u64,
    /// Samples farther than this multiple of the MAD from the median are outliers
    pub outlier_mad_multiplier: f64,
    /// Added to the median distance before inverting it into a weight (ratio units)
    pub weight_epsilon: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_margin_px: 150,
            samples_per_target: 10,
            target_duration_ms: 3_000,
            hard_timeout_ms: 10_000,
            settle_ms: 0,
            outlier_mad_multiplier: 3.0,
            weight_epsilon: 0.01,
        }
    }
}

/// Lower and upper bound used to normalize a metric into 0.0-1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub low: f64,
    pub high: f64,
}

impl ReferenceRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Position of `value` inside the range, clipped to 0.0-1.0
    pub fn normalize(&self, value: f64) -> f64 {
        if self.high <= self.low {
            return 0.0;
        }
        ((value - self.low) / (self.high - self.low)).clamp(0.0, 1.0)
    }
}

/// Weights of the composite score terms
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub center_avoidance: f64,
    pub look_away: f64,
    pub blink: f64,
    pub saccade: f64,
    pub edge_fixation: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            center_avoidance: 0.30,
            look_away: 0.20,
            blink: 0.20,
            saccade: 0.15,
            edge_fixation: 0.15,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.center_avoidance + self.look_away + self.blink + self.saccade + self.edge_fixation
    }
}

/// Cut-offs that raise a behavioral indicator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorThresholds {
    /// Blinks per minute above which the rate counts as high
    pub high_blink_rate: f64,
    /// Blinks per minute below which the rate counts as low
    pub low_blink_rate: f64,
    /// Mean blink duration below which blinking is rapid (seconds)
    pub rapid_blink_secs: f64,
    /// Mean blink duration above which blinks are prolonged (seconds)
    pub prolonged_blink_secs: f64,
    /// Variance of successive blink-duration differences counted as irregular
    pub irregular_blink_variance: f64,
    /// Saccades per minute counted as excessive
    pub excessive_saccade_rate: f64,
    /// Center focus below this share is strong avoidance
    pub strong_avoidance_ratio: f64,
    /// Center focus below this share is moderate avoidance
    pub moderate_avoidance_ratio: f64,
    /// Edge gaze share above which edge fixation is high
    pub high_edge_ratio: f64,
    /// Mean gaze velocity counted as rapid scanning (pixels/second)
    pub rapid_scan_velocity: f64,
}

impl Default for IndicatorThresholds {
    fn default() -> Self {
        Self {
            high_blink_rate: 30.0,
            low_blink_rate: 8.0,
            rapid_blink_secs: 0.1,
            prolonged_blink_secs: 0.5,
            irregular_blink_variance: 0.2,
            excessive_saccade_rate: 360.0,
            strong_avoidance_ratio: 0.2,
            moderate_avoidance_ratio: 0.4,
            high_edge_ratio: 0.3,
            rapid_scan_velocity: 150.0,
        }
    }
}

/// Indicator and scoring parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Share of the screen area covered by the center region
    pub center_area_fraction: f64,
    /// Width of the band along each screen edge counted as edge fixation (pixels)
    pub edge_margin_px: f64,
    /// Gaze velocity above which a transition counts as a saccade (pixels/second)
    pub saccade_velocity_threshold: f64,
    /// Look-away runs per minute mapped onto the look-away term
    pub look_away_rate_range: ReferenceRange,
    /// Blinks per minute mapped onto the blink term
    pub blink_rate_range: ReferenceRange,
    /// Saccades per minute mapped onto the saccade term
    pub saccade_rate_range: ReferenceRange,
    /// Edge fixation share mapped onto the edge term
    pub edge_ratio_range: ReferenceRange,
    /// Composite score weights
    pub weights: ScoreWeights,
    /// Behavioral indicator cut-offs
    pub thresholds: IndicatorThresholds,
    /// Data loss above this share raises the high-data-loss flag
    pub high_data_loss_ratio: f64,
    /// Sessions shorter than this raise the short-session flag (seconds)
    pub min_session_secs: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            center_area_fraction: 0.40,
            edge_margin_px: 100.0,
            saccade_velocity_threshold: 300.0,
            look_away_rate_range: ReferenceRange::new(0.0, 20.0),
            blink_rate_range: ReferenceRange::new(17.0, 30.0),
            saccade_rate_range: ReferenceRange::new(0.0, 120.0),
            edge_ratio_range: ReferenceRange::new(0.0, 0.3),
            weights: ScoreWeights::default(),
            thresholds: IndicatorThresholds::default(),
            high_data_loss_ratio: 0.5,
            min_session_secs: 10.0,
        }
    }
}

impl IndicatorConfig {
    /// Check the region, ranges, weights and cut-offs; NaN never passes
    pub fn validate(&self) -> Result<(), ComputeError> {
        let invalid = |msg: &str| Err(ComputeError::InvalidConfig(msg.to_string()));

        if !(self.center_area_fraction > 0.0 && self.center_area_fraction <= 1.0) {
            return invalid("center_area_fraction must be within (0, 1]");
        }
        if !(self.saccade_velocity_threshold > 0.0 && self.saccade_velocity_threshold.is_finite()) {
            return invalid("saccade_velocity_threshold must be positive");
        }
        if !(self.edge_margin_px >= 0.0 && self.edge_margin_px.is_finite()) {
            return invalid("edge_margin_px must not be negative");
        }
        let ranges = [
            self.look_away_rate_range,
            self.blink_rate_range,
            self.saccade_rate_range,
            self.edge_ratio_range,
        ];
        if ranges
            .iter()
            .any(|r| !(r.low.is_finite() && r.high.is_finite() && r.high > r.low))
        {
            return invalid("reference ranges need finite bounds with high > low");
        }
        if !(0.0..=1.0).contains(&self.high_data_loss_ratio) {
            return invalid("high_data_loss_ratio must be within [0, 1]");
        }
        if !(self.min_session_secs >= 0.0 && self.min_session_secs.is_finite()) {
            return invalid("min_session_secs must not be negative");
        }
        let w = &self.weights;
        let weights = [
            w.center_avoidance,
            w.look_away,
            w.blink,
            w.saccade,
            w.edge_fixation,
        ];
        if weights.iter().any(|v| !(*v >= 0.0)) || !((w.total() - 1.0).abs() <= 1e-6) {
            return invalid("score weights must be non-negative and sum to 1.0");
        }
        let th = &self.thresholds;
        let cut_offs = [
            th.high_blink_rate,
            th.low_blink_rate,
            th.rapid_blink_secs,
            th.prolonged_blink_secs,
            th.irregular_blink_variance,
            th.excessive_saccade_rate,
            th.strong_avoidance_ratio,
            th.moderate_avoidance_ratio,
            th.high_edge_ratio,
            th.rapid_scan_velocity,
        ];
        if cut_offs.iter().any(|v| !v.is_finite()) {
            return invalid("indicator thresholds must be finite");
        }

        Ok(())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    pub screen: ScreenGeometry,
    pub smoothing: SmoothingConfig,
    pub calibration: CalibrationConfig,
    pub indicators: IndicatorConfig,
}

impl GazeConfig {
    /// Load a configuration from JSON; missing sections take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: GazeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Check that the parameters describe a usable setup
    pub fn validate(&self) -> Result<(), ComputeError> {
        let invalid = |msg: &str| Err(ComputeError::InvalidConfig(msg.to_string()));

        if self.screen.width == 0 || self.screen.height == 0 {
            return invalid("screen dimensions must be non-zero");
        }

        let cal = &self.calibration;
        if cal.target_margin_px * 2 >= self.screen.width.min(self.screen.height) {
            return invalid("target margin leaves no room between corner targets");
        }
        if cal.samples_per_target == 0 {
            return invalid("samples_per_target must be at least 1");
        }
        if cal.target_duration_ms == 0 || cal.hard_timeout_ms < cal.target_duration_ms {
            return invalid("hard_timeout_ms must be at least target_duration_ms, which must be non-zero");
        }
        if !(cal.outlier_mad_multiplier.is_finite() && cal.outlier_mad_multiplier > 0.0) {
            return invalid("outlier_mad_multiplier must be positive");
        }
        if !(cal.weight_epsilon.is_finite() && cal.weight_epsilon > 0.0) {
            return invalid("weight_epsilon must be positive");
        }

        self.indicators.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(GazeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        assert!((ScoreWeights::default().total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GazeConfig::from_json(
            r#"{ "screen": { "width": 2560, "height": 1440 }, "smoothing": { "window": 3 } }"#,
        )
        .unwrap();

        assert_eq!(config.screen, ScreenGeometry::new(2560, 1440));
        assert_eq!(config.smoothing.window, 3);
        assert_eq!(config.calibration.samples_per_target, 10);
        assert!((config.indicators.center_area_fraction - 0.40).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_weights() {
        let json = r#"{ "indicators": { "weights": { "center_avoidance": 0.9 } } }"#;
        assert!(matches!(
            GazeConfig::from_json(json),
            Err(ComputeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_indicator_config_rejects_nan() {
        let mut config = IndicatorConfig::default();
        config.center_area_fraction = f64::NAN;
        assert!(matches!(config.validate(), Err(ComputeError::InvalidConfig(_))));

        let mut config = IndicatorConfig::default();
        config.edge_margin_px = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = IndicatorConfig::default();
        config.blink_rate_range = ReferenceRange::new(f64::NAN, 30.0);
        assert!(config.validate().is_err());

        let mut config = IndicatorConfig::default();
        config.thresholds.rapid_scan_velocity = f64::INFINITY;
        assert!(config.validate().is_err());

        assert!(IndicatorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_oversized_margin() {
        let mut config = GazeConfig::default();
        config.calibration.target_margin_px = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reference_range_normalize() {
        let range = ReferenceRange::new(17.0, 30.0);
        assert_eq!(range.normalize(10.0), 0.0);
        assert_eq!(range.normalize(40.0), 1.0);
        assert!((range.normalize(23.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_config_round_trip() {
        let config = GazeConfig::default();
        let json = config.to_json().unwrap();
        let loaded = GazeConfig::from_json(&json).unwrap();
        assert_eq!(loaded.calibration.hard_timeout_ms, 10_000);
        assert_eq!(loaded.screen, config.screen);
    }
}
