//! Fixed calibration targets
//!
//! Five points: the screen center plus one near each corner, inset by a margin
//! so the user never has to look at the very edge of the display.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ScreenGeometry;

/// Number of targets a complete calibration covers
pub const REQUIRED_TARGETS: usize = 5;

/// Identifier of a calibration target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetId {
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl TargetId {
    /// Presentation order: center first, then the corners clockwise from top-left
    pub const ALL: [TargetId; REQUIRED_TARGETS] = [
        TargetId::Center,
        TargetId::TopLeft,
        TargetId::TopRight,
        TargetId::BottomLeft,
        TargetId::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetId::Center => "center",
            TargetId::TopLeft => "top_left",
            TargetId::TopRight => "top_right",
            TargetId::BottomLeft => "bottom_left",
            TargetId::BottomRight => "bottom_right",
        }
    }

    pub fn is_left(&self) -> bool {
        matches!(self, TargetId::TopLeft | TargetId::BottomLeft)
    }

    pub fn is_right(&self) -> bool {
        matches!(self, TargetId::TopRight | TargetId::BottomRight)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, TargetId::TopLeft | TargetId::TopRight)
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, TargetId::BottomLeft | TargetId::BottomRight)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A known screen location the user fixates during calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTarget {
    pub id: TargetId,
    pub screen_x: f64,
    pub screen_y: f64,
}

impl CalibrationTarget {
    /// Screen position of `id` for the given screen and corner margin
    pub fn place(id: TargetId, screen: &ScreenGeometry, margin_px: u32) -> Self {
        let (cx, cy) = screen.center();
        let margin = margin_px as f64;
        let right = screen.width as f64 - margin;
        let bottom = screen.height as f64 - margin;

        let (screen_x, screen_y) = match id {
            TargetId::Center => (cx, cy),
            TargetId::TopLeft => (margin, margin),
            TargetId::TopRight => (right, margin),
            TargetId::BottomLeft => (margin, bottom),
            TargetId::BottomRight => (right, bottom),
        };

        Self {
            id,
            screen_x,
            screen_y,
        }
    }
}

/// The standard five-point target set in presentation order
pub fn standard_targets(screen: &ScreenGeometry, margin_px: u32) -> Vec<CalibrationTarget> {
    TargetId::ALL
        .iter()
        .map(|&id| CalibrationTarget::place(id, screen, margin_px))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_targets_layout() {
        let screen = ScreenGeometry::new(1920, 1080);
        let targets = standard_targets(&screen, 150);

        assert_eq!(targets.len(), REQUIRED_TARGETS);
        assert_eq!(targets[0].id, TargetId::Center);
        assert_eq!((targets[0].screen_x, targets[0].screen_y), (960.0, 540.0));
        assert_eq!((targets[1].screen_x, targets[1].screen_y), (150.0, 150.0));
        assert_eq!((targets[4].screen_x, targets[4].screen_y), (1770.0, 930.0));
    }

    #[test]
    fn test_corner_sides() {
        assert!(TargetId::TopLeft.is_left() && TargetId::TopLeft.is_top());
        assert!(TargetId::BottomRight.is_right() && TargetId::BottomRight.is_bottom());
        assert!(!TargetId::Center.is_left() && !TargetId::Center.is_bottom());
    }

    #[test]
    fn test_target_id_serializes_snake_case() {
        let json = serde_json::to_string(&TargetId::BottomLeft).unwrap();
        assert_eq!(json, "\"bottom_left\"");
        assert_eq!(TargetId::BottomLeft.to_string(), "bottom_left");
    }
}
