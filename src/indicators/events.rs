//! Event detection over a frozen trace: look-away runs, blinks, saccades

use chrono::{DateTime, Utc};

use crate::indicators::regions::CenterRegion;
use crate::session::TraceEntry;

fn secs_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_microseconds().unwrap_or(0) as f64 / 1e6
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance
fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Maximal runs of valid points outside the center region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookAwayStats {
    pub count: usize,
    /// Wall-clock duration of each run (last minus first timestamp), seconds
    pub durations: Vec<f64>,
    pub mean_duration: f64,
}

impl LookAwayStats {
    /// Invalid points are skipped; they neither extend nor break a run.
    pub fn compute(entries: &[TraceEntry], region: &CenterRegion) -> Self {
        let mut durations = Vec::new();
        let mut run: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for entry in entries.iter().filter(|e| e.point.valid) {
            if region.contains(&entry.point) {
                if let Some((first, last)) = run.take() {
                    durations.push(secs_between(first, last));
                }
            } else {
                run = match run {
                    Some((first, _)) => Some((first, entry.timestamp)),
                    None => Some((entry.timestamp, entry.timestamp)),
                };
            }
        }
        if let Some((first, last)) = run {
            durations.push(secs_between(first, last));
        }

        Self {
            count: durations.len(),
            mean_duration: mean(&durations),
            durations,
        }
    }
}

/// Blink transitions over every entry, valid or not
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlinkStats {
    /// Rising edges of the blink flag
    pub count: usize,
    /// Rising-to-falling durations of completed blinks, seconds
    pub durations: Vec<f64>,
    pub mean_duration: f64,
    /// Variance of the differences between successive blink durations
    pub duration_variance: f64,
}

impl BlinkStats {
    /// A trace that starts mid-blink does not count that blink.
    pub fn compute(entries: &[TraceEntry]) -> Self {
        let mut count = 0;
        let mut durations = Vec::new();
        let mut blink_start: Option<DateTime<Utc>> = None;

        for pair in entries.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            if !prev.blinking && cur.blinking {
                count += 1;
                blink_start = Some(cur.timestamp);
            } else if prev.blinking && !cur.blinking {
                if let Some(start) = blink_start.take() {
                    durations.push(secs_between(start, cur.timestamp));
                }
            }
        }

        let diffs: Vec<f64> = durations.windows(2).map(|w| w[1] - w[0]).collect();
        Self {
            count,
            mean_duration: mean(&durations),
            duration_variance: variance(&diffs),
            durations,
        }
    }
}

/// Velocity statistics over consecutive valid points
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaccadeStats {
    pub count: usize,
    /// Mean velocity over saccades only (pixels/second)
    pub mean_velocity: f64,
    /// Mean velocity over every valid transition (pixels/second)
    pub mean_gaze_velocity: f64,
}

impl SaccadeStats {
    /// Transitions with a non-positive time step are skipped.
    pub fn compute(entries: &[TraceEntry], velocity_threshold: f64) -> Self {
        let valid: Vec<&TraceEntry> = entries.iter().filter(|e| e.point.valid).collect();

        let velocities: Vec<f64> = valid
            .windows(2)
            .filter_map(|pair| {
                let dt = secs_between(pair[0].timestamp, pair[1].timestamp);
                (dt > 0.0).then(|| pair[0].point.distance(&pair[1].point) / dt)
            })
            .collect();

        let saccades: Vec<f64> = velocities
            .iter()
            .copied()
            .filter(|v| *v > velocity_threshold)
            .collect();

        Self {
            count: saccades.len(),
            mean_velocity: mean(&saccades),
            mean_gaze_velocity: mean(&velocities),
        }
    }
}
