//! Indicator report types
//!
//! Everything here is a plain value: the report is derived once from a frozen
//! trace and never mutated afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputeError;

/// Composite score below this is `None`
const MILD_THRESHOLD: f64 = 0.15;
/// Composite score below this is `Mild`
const MODERATE_THRESHOLD: f64 = 0.35;
/// Composite score below this is `Moderate`, at or above it `High`
const HIGH_THRESHOLD: f64 = 0.55;

/// Discrete reading of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentLevel {
    None,
    Mild,
    Moderate,
    High,
}

impl AssessmentLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= HIGH_THRESHOLD {
            AssessmentLevel::High
        } else if score >= MODERATE_THRESHOLD {
            AssessmentLevel::Moderate
        } else if score >= MILD_THRESHOLD {
            AssessmentLevel::Mild
        } else {
            AssessmentLevel::None
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AssessmentLevel::None => "No significant anxiety indicators",
            AssessmentLevel::Mild => "Mild anxiety indicators detected",
            AssessmentLevel::Moderate => "Moderate anxiety indicators detected",
            AssessmentLevel::High => "High anxiety indicators detected",
        }
    }
}

/// Kind of behavioral indicator raised by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    HighBlinkRate,
    LowBlinkRate,
    RapidBlinking,
    ProlongedBlinks,
    IrregularBlinking,
    ExcessiveSaccades,
    StrongCenterAvoidance,
    ModerateCenterAvoidance,
    HighEdgeFixation,
    RapidScanning,
}

/// A raised indicator with the metric value that triggered it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub kind: IndicatorKind,
    pub value: f64,
}

impl Indicator {
    pub fn new(kind: IndicatorKind, value: f64) -> Self {
        Self { kind, value }
    }

    /// Human-readable line for the presentation layer
    pub fn description(&self) -> String {
        let v = self.value;
        match self.kind {
            IndicatorKind::HighBlinkRate => {
                format!("High blink rate: {v:.1}/min (typical: 15-20/min)")
            }
            IndicatorKind::LowBlinkRate => {
                format!("Very low blink rate: {v:.1}/min (may indicate stress)")
            }
            IndicatorKind::RapidBlinking => {
                format!("Rapid blinking pattern: {v:.3}s mean duration")
            }
            IndicatorKind::ProlongedBlinks => format!("Prolonged blinks: {v:.3}s mean duration"),
            IndicatorKind::IrregularBlinking => "Irregular blink pattern".to_string(),
            IndicatorKind::ExcessiveSaccades => format!("Excessive eye movements: {v:.1}/min"),
            IndicatorKind::StrongCenterAvoidance => {
                format!("Strong center avoidance: only {:.1}% center focus", v * 100.0)
            }
            IndicatorKind::ModerateCenterAvoidance => {
                format!("Moderate center avoidance: {:.1}% center focus", v * 100.0)
            }
            IndicatorKind::HighEdgeFixation => {
                format!("High edge fixation: {:.1}% edge focus", v * 100.0)
            }
            IndicatorKind::RapidScanning => format!("Rapid gaze scanning: {v:.0} pixels/sec"),
        }
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Quality flags attached to a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFlag {
    /// No valid gaze point in the trace
    DegenerateSession,
    /// More than the configured share of samples were invalid
    HighDataLoss,
    /// Session shorter than the configured minimum
    ShortSession,
    /// Points were recorded without a calibration mapping
    NoMapping,
}

/// One term of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentTerm {
    /// Metric value before normalization
    pub raw: f64,
    /// Position inside the reference range, 0.0-1.0
    pub normalized: f64,
    pub weight: f64,
    /// `normalized * weight`
    pub contribution: f64,
}

impl ComponentTerm {
    pub fn new(raw: f64, normalized: f64, weight: f64) -> Self {
        Self {
            raw,
            normalized,
            weight,
            contribution: normalized * weight,
        }
    }

    pub fn zero(weight: f64) -> Self {
        Self::new(0.0, 0.0, weight)
    }
}

/// Per-term view of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    /// Raw value is `1 - center_focus_ratio`
    pub center_avoidance: ComponentTerm,
    /// Raw value is look-away runs per minute
    pub look_away: ComponentTerm,
    /// Raw value is blinks per minute
    pub blink: ComponentTerm,
    /// Raw value is saccades per minute
    pub saccade: ComponentTerm,
    /// Raw value is the edge gaze ratio
    pub edge_fixation: ComponentTerm,
}

impl ComponentBreakdown {
    /// Sum of the contributions
    pub fn total(&self) -> f64 {
        self.center_avoidance.contribution
            + self.look_away.contribution
            + self.blink.contribution
            + self.saccade.contribution
            + self.edge_fixation.contribution
    }
}

/// Session-level counts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: f64,
    pub total_samples: usize,
    pub valid_samples: usize,
    /// Share of samples with a valid point (`1 - data_loss_ratio`)
    pub detection_rate: f64,
    pub calibrated: bool,
}

/// Behavioral indicators of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReport {
    pub session_id: Uuid,
    /// False when the trace held no valid gaze point
    pub valid: bool,
    pub summary: SessionSummary,
    pub data_loss_ratio: f64,

    // Focus
    pub center_focus_ratio: f64,
    pub center_accuracy: f64,
    pub edge_gaze_ratio: f64,

    // Look-away
    pub look_away_count: usize,
    /// Mean run duration in seconds
    pub look_away_mean_duration: f64,
    pub look_away_rate: f64,

    // Blinks
    pub blink_count: usize,
    /// Blinks per minute
    pub blink_rate: f64,
    /// Durations of completed blinks in seconds
    pub blink_durations: Vec<f64>,
    pub mean_blink_duration: f64,
    /// Variance of successive blink-duration differences
    pub blink_duration_variance: f64,

    // Saccades
    pub saccade_count: usize,
    /// Saccades per minute
    pub saccade_rate: f64,
    /// Mean velocity over saccades only (pixels/second)
    pub mean_saccade_velocity: f64,
    /// Mean velocity over every valid transition (pixels/second)
    pub mean_gaze_velocity: f64,

    // Score
    pub composite_score: f64,
    pub assessment: AssessmentLevel,
    pub component_breakdown: ComponentBreakdown,
    pub indicators: Vec<Indicator>,
    pub flags: Vec<ReportFlag>,
}

impl IndicatorReport {
    pub fn has_flag(&self, flag: ReportFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Descriptions of the raised indicators
    pub fn indicator_descriptions(&self) -> Vec<String> {
        self.indicators.iter().map(Indicator::description).collect()
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assessment_levels() {
        assert_eq!(AssessmentLevel::from_score(0.0), AssessmentLevel::None);
        assert_eq!(AssessmentLevel::from_score(0.15), AssessmentLevel::Mild);
        assert_eq!(AssessmentLevel::from_score(0.40), AssessmentLevel::Moderate);
        assert_eq!(AssessmentLevel::from_score(0.55), AssessmentLevel::High);
        assert_eq!(AssessmentLevel::from_score(1.0), AssessmentLevel::High);
    }

    #[test]
    fn test_indicator_description() {
        let indicator = Indicator::new(IndicatorKind::StrongCenterAvoidance, 0.125);
        assert_eq!(
            indicator.description(),
            "Strong center avoidance: only 12.5% center focus"
        );
        assert_eq!(
            Indicator::new(IndicatorKind::HighBlinkRate, 34.31).to_string(),
            "High blink rate: 34.3/min (typical: 15-20/min)"
        );
    }

    #[test]
    fn test_component_term_contribution() {
        let term = ComponentTerm::new(25.0, 0.5, 0.2);
        assert!((term.contribution - 0.1).abs() < 1e-12);
        assert_eq!(ComponentTerm::zero(0.3).contribution, 0.0);
    }

    #[test]
    fn test_flags_serialize_snake_case() {
        let json = serde_json::to_string(&ReportFlag::DegenerateSession).unwrap();
        assert_eq!(json, "\"degenerate_session\"");
    }
}
