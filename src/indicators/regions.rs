//! Screen regions used for focus classification

use crate::config::ScreenGeometry;
use crate::mapper::ScreenPoint;

/// Rectangle centred on the screen midpoint covering a fixed share of the
/// screen area. Boundary points are inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterRegion {
    pub cx: f64,
    pub cy: f64,
    pub half_width: f64,
    pub half_height: f64,
}

impl CenterRegion {
    /// Each side is the screen side scaled by `sqrt(area_fraction)`
    pub fn new(screen: &ScreenGeometry, area_fraction: f64) -> Self {
        let scale = area_fraction.clamp(0.0, 1.0).sqrt();
        let (cx, cy) = screen.center();
        Self {
            cx,
            cy,
            half_width: screen.width as f64 * scale / 2.0,
            half_height: screen.height as f64 * scale / 2.0,
        }
    }

    pub fn contains(&self, point: &ScreenPoint) -> bool {
        (point.x - self.cx).abs() <= self.half_width && (point.y - self.cy).abs() <= self.half_height
    }

    /// Distance from the region center
    pub fn distance_to_center(&self, point: &ScreenPoint) -> f64 {
        ((point.x - self.cx).powi(2) + (point.y - self.cy).powi(2)).sqrt()
    }

    pub fn half_diagonal(&self) -> f64 {
        (self.half_width.powi(2) + self.half_height.powi(2)).sqrt()
    }
}

/// Whether a point lies within `margin` pixels of any screen edge
pub fn is_edge(point: &ScreenPoint, screen: &ScreenGeometry, margin: f64) -> bool {
    let (w, h) = (screen.width as f64, screen.height as f64);
    point.x <= margin || point.x >= w - margin || point.y <= margin || point.y >= h - margin
}

/// Focus shares over the valid points of a trace
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FocusStats {
    pub valid_points: usize,
    pub center_points: usize,
    pub edge_points: usize,
    /// Share of valid points inside the center region
    pub center_focus_ratio: f64,
    /// Share of valid points near a screen edge
    pub edge_gaze_ratio: f64,
    /// `1 - mean distance / half diagonal` over the center points
    pub center_accuracy: f64,
}

impl FocusStats {
    pub fn compute<'a>(
        points: impl IntoIterator<Item = &'a ScreenPoint>,
        region: &CenterRegion,
        screen: &ScreenGeometry,
        edge_margin: f64,
    ) -> Self {
        let mut stats = FocusStats::default();
        let mut center_distance_sum = 0.0;

        for point in points.into_iter().filter(|p| p.valid) {
            stats.valid_points += 1;
            if region.contains(point) {
                stats.center_points += 1;
                center_distance_sum += region.distance_to_center(point);
            }
            if is_edge(point, screen, edge_margin) {
                stats.edge_points += 1;
            }
        }

        if stats.valid_points == 0 {
            return stats;
        }

        let valid = stats.valid_points as f64;
        stats.center_focus_ratio = stats.center_points as f64 / valid;
        stats.edge_gaze_ratio = stats.edge_points as f64 / valid;

        let half_diagonal = region.half_diagonal();
        if stats.center_points > 0 && half_diagonal > 0.0 {
            let mean = center_distance_sum / stats.center_points as f64;
            stats.center_accuracy = (1.0 - mean / half_diagonal).max(0.0);
        }
        stats
    }
}
