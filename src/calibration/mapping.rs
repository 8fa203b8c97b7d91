//! Fitted gaze-ratio to screen-pixel mapping
//!
//! Each axis is fitted independently from three knots: the averaged "low"
//! corners, the center target and the averaged "high" corners. When the
//! center ratio sits strictly between the corner ratios the axis is
//! piecewise-linear through the three knots; otherwise it falls back to a
//! least-squares line forced through the center target.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::calibration::target::{TargetId, REQUIRED_TARGETS};
use crate::config::ScreenGeometry;
use crate::error::ComputeError;
use crate::schema::Point2;

/// Current calibration record schema version
pub const CALIBRATION_SCHEMA_VERSION: &str = "gaze.calibration.v1";

/// One (ratio, screen) anchor of an axis fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knot {
    pub ratio: f64,
    pub screen: f64,
}

impl Knot {
    pub fn new(ratio: f64, screen: f64) -> Self {
        Self { ratio, screen }
    }

    fn mean(knots: &[Knot]) -> Knot {
        let n = knots.len() as f64;
        Knot::new(
            knots.iter().map(|k| k.ratio).sum::<f64>() / n,
            knots.iter().map(|k| k.screen).sum::<f64>() / n,
        )
    }
}

/// Fitted function for one screen axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisFit {
    /// Two linear segments meeting at the center knot; knots sorted by ratio
    PiecewiseLinear { knots: [Knot; 3] },
    /// Single line through the center knot
    Affine {
        slope: f64,
        center: Knot,
        ratio_min: f64,
        ratio_max: f64,
    },
}

impl AxisFit {
    /// Fit one axis.
    ///
    /// `low` and `high` are the averaged corner knots, `corners` the
    /// individual corner knots used by the affine fallback.
    pub fn fit(
        axis: &str,
        low: Knot,
        center: Knot,
        high: Knot,
        corners: &[Knot],
    ) -> Result<Self, ComputeError> {
        if (high.ratio - low.ratio).abs() < f64::EPSILON {
            return Err(ComputeError::CalibrationInvalid(format!(
                "{axis} axis has no spread between corner ratios ({:.4})",
                low.ratio
            )));
        }

        let (lo_ratio, hi_ratio) = (low.ratio.min(high.ratio), low.ratio.max(high.ratio));
        if center.ratio > lo_ratio && center.ratio < hi_ratio {
            let mut knots = [low, center, high];
            knots.sort_by(|a, b| a.ratio.total_cmp(&b.ratio));
            return Ok(AxisFit::PiecewiseLinear { knots });
        }

        // slope = Σ dr·ds / Σ dr² with d measured from the center knot
        let (num, den) = corners.iter().fold((0.0, 0.0), |(num, den), k| {
            let dr = k.ratio - center.ratio;
            (num + dr * (k.screen - center.screen), den + dr * dr)
        });
        if den < f64::EPSILON {
            return Err(ComputeError::CalibrationInvalid(format!(
                "{axis} axis corners coincide with the center ratio"
            )));
        }

        Ok(AxisFit::Affine {
            slope: num / den,
            center,
            ratio_min: lo_ratio.min(center.ratio),
            ratio_max: hi_ratio.max(center.ratio),
        })
    }

    /// Calibrated ratio range; inputs are clamped into it
    pub fn ratio_range(&self) -> (f64, f64) {
        match self {
            AxisFit::PiecewiseLinear { knots } => (knots[0].ratio, knots[2].ratio),
            AxisFit::Affine {
                ratio_min,
                ratio_max,
                ..
            } => (*ratio_min, *ratio_max),
        }
    }

    /// Screen coordinate for a gaze ratio (no extrapolation)
    pub fn apply(&self, ratio: f64) -> f64 {
        let (min, max) = self.ratio_range();
        let r = ratio.clamp(min, max);

        match self {
            AxisFit::PiecewiseLinear { knots } => {
                let [a, c, b] = knots;
                // Anchored at the center knot so r == c.ratio is exact
                let other = if r <= c.ratio { a } else { b };
                let slope = (other.screen - c.screen) / (other.ratio - c.ratio);
                c.screen + (r - c.ratio) * slope
            }
            AxisFit::Affine { slope, center, .. } => center.screen + (r - center.ratio) * slope,
        }
    }

    /// 1.0 inside the calibrated range, falling linearly to 0.0 as the ratio
    /// overshoots by a full span
    pub fn confidence(&self, ratio: f64) -> f64 {
        let (min, max) = self.ratio_range();
        let span = max - min;
        let overshoot = if ratio < min {
            min - ratio
        } else if ratio > max {
            ratio - max
        } else {
            0.0
        };
        if overshoot == 0.0 {
            1.0
        } else if span <= 0.0 {
            0.0
        } else {
            (1.0 - overshoot / span).max(0.0)
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AxisFit::PiecewiseLinear { .. } => "piecewise_linear",
            AxisFit::Affine { .. } => "affine",
        }
    }

    fn validate(&self, axis: &str) -> Result<(), ComputeError> {
        let ok = match self {
            AxisFit::PiecewiseLinear { knots } => {
                knots
                    .iter()
                    .all(|k| k.ratio.is_finite() && k.screen.is_finite())
                    && knots[0].ratio < knots[1].ratio
                    && knots[1].ratio < knots[2].ratio
            }
            AxisFit::Affine {
                slope,
                center,
                ratio_min,
                ratio_max,
            } => {
                slope.is_finite()
                    && center.ratio.is_finite()
                    && center.screen.is_finite()
                    && ratio_min.is_finite()
                    && ratio_max.is_finite()
                    && ratio_min < ratio_max
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ComputeError::CalibrationInvalid(format!(
                "{axis} axis parameters are not a usable fit"
            )))
        }
    }
}

/// Per-target summary kept in the calibration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetId,
    pub screen_x: f64,
    pub screen_y: f64,
    /// Representative ratio after outlier filtering and weighting
    pub gaze_h: f64,
    pub gaze_v: f64,
    /// Mean pupil midpoint in camera pixels
    #[serde(default)]
    pub pupil: Option<Point2>,
    pub samples_collected: usize,
    pub samples_kept: usize,
}

/// A fully fitted calibration.
///
/// Only constructed through [`Mapping::fit`] or a validated load, so holding
/// one means all five targets were covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    schema_version: String,
    created_at: DateTime<Utc>,
    screen: ScreenGeometry,
    target_count: usize,
    samples_per_target: usize,
    targets: Vec<TargetRecord>,
    x_fit: AxisFit,
    y_fit: AxisFit,
}

/// Status snapshot of a mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummary {
    pub created_at: DateTime<Utc>,
    pub screen: ScreenGeometry,
    pub target_count: usize,
    pub samples_per_target: usize,
    pub samples_collected: usize,
    pub samples_kept: usize,
    pub x_fit: String,
    pub y_fit: String,
    pub ratio_range_h: (f64, f64),
    pub ratio_range_v: (f64, f64),
}

impl Mapping {
    /// Fit a mapping from one record per target
    pub fn fit(
        screen: ScreenGeometry,
        records: Vec<TargetRecord>,
        samples_per_target: usize,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ComputeError> {
        let mut targets = Vec::with_capacity(REQUIRED_TARGETS);
        for id in TargetId::ALL {
            let record = records
                .iter()
                .find(|r| r.id == id)
                .ok_or(ComputeError::CalibrationIncomplete {
                    completed: records.len(),
                    required: REQUIRED_TARGETS,
                })?;
            targets.push(record.clone());
        }
        if records.len() != REQUIRED_TARGETS {
            return Err(ComputeError::CalibrationInvalid(format!(
                "expected {REQUIRED_TARGETS} target records, got {}",
                records.len()
            )));
        }

        let x_fit = fit_axis("x", &targets, TargetId::is_left, TargetId::is_right, |r| {
            Knot::new(r.gaze_h, r.screen_x)
        })?;
        let y_fit = fit_axis("y", &targets, TargetId::is_top, TargetId::is_bottom, |r| {
            Knot::new(r.gaze_v, r.screen_y)
        })?;

        let mapping = Self {
            schema_version: CALIBRATION_SCHEMA_VERSION.to_string(),
            created_at,
            screen,
            target_count: REQUIRED_TARGETS,
            samples_per_target,
            targets,
            x_fit,
            y_fit,
        };
        mapping.validate()?;

        info!(
            "Fitted calibration for {}x{}: x={}, y={}",
            screen.width,
            screen.height,
            mapping.x_fit.kind(),
            mapping.y_fit.kind()
        );
        Ok(mapping)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn screen(&self) -> &ScreenGeometry {
        &self.screen
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn samples_per_target(&self) -> usize {
        self.samples_per_target
    }

    pub fn targets(&self) -> &[TargetRecord] {
        &self.targets
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetRecord> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn x_fit(&self) -> &AxisFit {
        &self.x_fit
    }

    pub fn y_fit(&self) -> &AxisFit {
        &self.y_fit
    }

    /// Screen coordinate for a ratio pair (unclamped to the screen)
    pub fn apply(&self, gaze_h: f64, gaze_v: f64) -> (f64, f64) {
        (self.x_fit.apply(gaze_h), self.y_fit.apply(gaze_v))
    }

    /// Confidence of a ratio pair: the weaker of the two axes
    pub fn confidence(&self, gaze_h: f64, gaze_v: f64) -> f64 {
        self.x_fit
            .confidence(gaze_h)
            .min(self.y_fit.confidence(gaze_v))
    }

    /// Reject a mapping fitted for a different screen resolution
    pub fn ensure_screen(&self, screen: &ScreenGeometry) -> Result<(), ComputeError> {
        if &self.screen != screen {
            return Err(ComputeError::CalibrationInvalid(format!(
                "calibrated for {}x{}, current screen is {}x{}",
                self.screen.width, self.screen.height, screen.width, screen.height
            )));
        }
        Ok(())
    }

    pub fn summary(&self) -> CalibrationSummary {
        CalibrationSummary {
            created_at: self.created_at,
            screen: self.screen,
            target_count: self.target_count,
            samples_per_target: self.samples_per_target,
            samples_collected: self.targets.iter().map(|t| t.samples_collected).sum(),
            samples_kept: self.targets.iter().map(|t| t.samples_kept).sum(),
            x_fit: self.x_fit.kind().to_string(),
            y_fit: self.y_fit.kind().to_string(),
            ratio_range_h: self.x_fit.ratio_range(),
            ratio_range_v: self.y_fit.ratio_range(),
        }
    }

    /// Structural checks applied after fitting and after every load
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.schema_version != CALIBRATION_SCHEMA_VERSION {
            return Err(ComputeError::CalibrationInvalid(format!(
                "unsupported schema version {}, expected {}",
                self.schema_version, CALIBRATION_SCHEMA_VERSION
            )));
        }
        if self.target_count != REQUIRED_TARGETS || self.targets.len() != REQUIRED_TARGETS {
            return Err(ComputeError::CalibrationInvalid(format!(
                "expected {REQUIRED_TARGETS} targets, record has {} (declared {})",
                self.targets.len(),
                self.target_count
            )));
        }
        let distinct: HashSet<TargetId> = self.targets.iter().map(|t| t.id).collect();
        if distinct.len() != REQUIRED_TARGETS {
            return Err(ComputeError::CalibrationInvalid(
                "target records are not five distinct targets".to_string(),
            ));
        }
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err(ComputeError::CalibrationInvalid(
                "screen dimensions must be non-zero".to_string(),
            ));
        }
        for t in &self.targets {
            let finite = [t.screen_x, t.screen_y, t.gaze_h, t.gaze_v]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err(ComputeError::CalibrationInvalid(format!(
                    "target {} has non-finite values",
                    t.id
                )));
            }
        }
        self.x_fit.validate("x")?;
        self.y_fit.validate("y")?;
        Ok(())
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Parse and validate a calibration record
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let mapping: Mapping = serde_json::from_str(json)
            .map_err(|e| ComputeError::CalibrationInvalid(format!("malformed record: {e}")))?;
        mapping.validate()?;
        Ok(mapping)
    }
}

fn fit_axis(
    axis: &str,
    targets: &[TargetRecord],
    is_low: fn(&TargetId) -> bool,
    is_high: fn(&TargetId) -> bool,
    knot: impl Fn(&TargetRecord) -> Knot,
) -> Result<AxisFit, ComputeError> {
    let pick = |pred: fn(&TargetId) -> bool| -> Vec<Knot> {
        targets.iter().filter(|t| pred(&t.id)).map(&knot).collect()
    };
    let low = pick(is_low);
    let high = pick(is_high);
    let center = targets
        .iter()
        .find(|t| t.id == TargetId::Center)
        .map(&knot)
        .ok_or_else(|| ComputeError::CalibrationInvalid("missing center target".to_string()))?;

    let corners: Vec<Knot> = low.iter().chain(high.iter()).copied().collect();
    AxisFit::fit(axis, Knot::mean(&low), center, Knot::mean(&high), &corners)
}
