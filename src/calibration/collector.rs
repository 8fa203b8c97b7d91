//! Per-target sample collection
//!
//! Each target runs `WaitingToStart → Collecting → TargetComplete`. Completion
//! is a race between a sample budget and a time budget, both checked after
//! every sample using the samples' own timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calibration::target::{CalibrationTarget, TargetId};
use crate::config::CalibrationConfig;
use crate::schema::{Point2, RawSample};

/// Collection phase of a single target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPhase {
    WaitingToStart,
    Collecting,
    TargetComplete,
}

/// Progress event emitted while a target collects samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub target_id: TargetId,
    pub phase: CollectionPhase,
    pub samples_collected: usize,
    pub elapsed_ms: u64,
}

/// Gaze ratios captured while the user fixated a target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub gaze_h: f64,
    pub gaze_v: f64,
    pub pupil: Option<Point2>,
}

/// Result of offering one raw sample to a collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Still inside the settle period
    Waiting,
    /// Collecting, neither budget reached yet
    Collecting,
    /// Sample or time budget reached
    Complete,
    /// Hard timeout passed without one usable sample
    TimedOut,
}

/// Collects calibration samples for one target
#[derive(Debug, Clone)]
pub struct TargetCollector {
    target: CalibrationTarget,
    sample_budget: usize,
    duration_ms: i64,
    hard_timeout_ms: i64,
    settle_ms: i64,
    phase: CollectionPhase,
    shown_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    last_seen: Option<DateTime<Utc>>,
    samples: Vec<CalibrationSample>,
}

impl TargetCollector {
    pub fn new(target: CalibrationTarget, config: &CalibrationConfig) -> Self {
        Self {
            target,
            sample_budget: config.samples_per_target,
            duration_ms: config.target_duration_ms as i64,
            hard_timeout_ms: config.hard_timeout_ms as i64,
            settle_ms: config.settle_ms as i64,
            phase: CollectionPhase::WaitingToStart,
            shown_at: None,
            started_at: None,
            last_seen: None,
            samples: Vec::with_capacity(config.samples_per_target),
        }
    }

    pub fn target(&self) -> &CalibrationTarget {
        &self.target
    }

    pub fn phase(&self) -> CollectionPhase {
        self.phase
    }

    /// Accepted samples in capture order
    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }

    /// Milliseconds since collection began, as of the last sample seen
    pub fn elapsed_ms(&self) -> u64 {
        match (self.started_at, self.last_seen) {
            (Some(start), Some(now)) => (now - start).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }

    /// Offer a raw sample. Samples without both gaze ratios are dropped
    /// silently but still advance the clock.
    pub fn offer(&mut self, sample: &RawSample) -> CollectOutcome {
        if self.phase == CollectionPhase::TargetComplete {
            return CollectOutcome::Complete;
        }

        let now = sample.timestamp;
        self.last_seen = Some(now);
        let shown_at = *self.shown_at.get_or_insert(now);

        if self.phase == CollectionPhase::WaitingToStart {
            if (now - shown_at).num_milliseconds() < self.settle_ms {
                return CollectOutcome::Waiting;
            }
            self.phase = CollectionPhase::Collecting;
            self.started_at = Some(now);
        }

        if let Some((gaze_h, gaze_v)) = sample.gaze_ratio() {
            self.samples.push(CalibrationSample {
                gaze_h,
                gaze_v,
                pupil: sample.pupil_midpoint(),
            });
        }

        let elapsed = self
            .started_at
            .map(|start| (now - start).num_milliseconds())
            .unwrap_or(0);

        let count_reached = self.samples.len() >= self.sample_budget;
        let time_reached = elapsed >= self.duration_ms && !self.samples.is_empty();

        if count_reached || time_reached {
            self.phase = CollectionPhase::TargetComplete;
            return CollectOutcome::Complete;
        }

        if self.samples.is_empty() && elapsed >= self.hard_timeout_ms {
            return CollectOutcome::TimedOut;
        }

        CollectOutcome::Collecting
    }

    /// Snapshot for observers
    pub fn progress(&self) -> CalibrationProgress {
        CalibrationProgress {
            target_id: self.target.id,
            phase: self.phase,
            samples_collected: self.samples.len(),
            elapsed_ms: self.elapsed_ms(),
        }
    }

    /// Hand over the collected samples
    pub fn into_samples(self) -> Vec<CalibrationSample> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::target::TargetId;
    use crate::config::ScreenGeometry;
    use chrono::{Duration, TimeZone};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn collector(config: &CalibrationConfig) -> TargetCollector {
        let target =
            CalibrationTarget::place(TargetId::Center, &ScreenGeometry::default(), 150);
        TargetCollector::new(target, config)
    }

    #[test]
    fn test_stops_at_sample_budget_before_time_budget() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);

        for i in 0..9 {
            let outcome = c.offer(&RawSample::with_ratios(t(i * 50), 0.5, 0.5));
            assert_eq!(outcome, CollectOutcome::Collecting);
        }
        let outcome = c.offer(&RawSample::with_ratios(t(450), 0.5, 0.5));

        assert_eq!(outcome, CollectOutcome::Complete);
        assert_eq!(c.samples().len(), 10);
        assert!(c.elapsed_ms() < 3_000);
        assert_eq!(c.phase(), CollectionPhase::TargetComplete);
    }

    #[test]
    fn test_stops_at_time_budget_with_few_samples() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);

        // One sample per second: budget of 10 never reached
        assert_eq!(c.offer(&RawSample::with_ratios(t(0), 0.5, 0.5)), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::with_ratios(t(1_000), 0.5, 0.5)), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::with_ratios(t(2_000), 0.5, 0.5)), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::with_ratios(t(3_000), 0.5, 0.5)), CollectOutcome::Complete);

        assert_eq!(c.samples().len(), 4);
        assert_eq!(c.elapsed_ms(), 3_000);
    }

    #[test]
    fn test_absent_ratios_dropped_silently() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);

        for i in 0..20 {
            let mut sample = RawSample::with_ratios(t(i * 10), 0.5, 0.5);
            if i % 2 == 1 {
                sample.gaze_v = None;
            }
            if c.offer(&sample) == CollectOutcome::Complete {
                break;
            }
        }

        // Ten accepted samples needed nineteen offers
        assert_eq!(c.samples().len(), 10);
        assert_eq!(c.elapsed_ms(), 180);
    }

    #[test]
    fn test_time_budget_waits_for_first_valid_sample() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);

        assert_eq!(c.offer(&RawSample::empty(t(0))), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::empty(t(4_000))), CollectOutcome::Collecting);
        assert_eq!(
            c.offer(&RawSample::with_ratios(t(4_100), 0.4, 0.6)),
            CollectOutcome::Complete
        );
        assert_eq!(c.samples().len(), 1);
    }

    #[test]
    fn test_hard_timeout_without_samples() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);

        assert_eq!(c.offer(&RawSample::empty(t(0))), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::empty(t(9_999))), CollectOutcome::Collecting);
        assert_eq!(c.offer(&RawSample::empty(t(10_000))), CollectOutcome::TimedOut);
    }

    #[test]
    fn test_settle_period_discards_early_samples() {
        let config = CalibrationConfig {
            settle_ms: 500,
            ..CalibrationConfig::default()
        };
        let mut c = collector(&config);

        assert_eq!(c.offer(&RawSample::with_ratios(t(0), 0.9, 0.9)), CollectOutcome::Waiting);
        assert_eq!(c.offer(&RawSample::with_ratios(t(400), 0.9, 0.9)), CollectOutcome::Waiting);
        assert_eq!(c.phase(), CollectionPhase::WaitingToStart);
        assert!(c.samples().is_empty());

        assert_eq!(
            c.offer(&RawSample::with_ratios(t(500), 0.5, 0.5)),
            CollectOutcome::Collecting
        );
        assert_eq!(c.phase(), CollectionPhase::Collecting);
        assert_eq!(c.samples().len(), 1);
        assert_eq!(c.elapsed_ms(), 0);
    }

    #[test]
    fn test_progress_snapshot() {
        let config = CalibrationConfig::default();
        let mut c = collector(&config);
        c.offer(&RawSample::with_ratios(t(0), 0.5, 0.5));
        c.offer(&RawSample::with_ratios(t(120), 0.5, 0.5));

        let progress = c.progress();
        assert_eq!(progress.target_id, TargetId::Center);
        assert_eq!(progress.phase, CollectionPhase::Collecting);
        assert_eq!(progress.samples_collected, 2);
        assert_eq!(progress.elapsed_ms, 120);
    }

    #[test]
    fn test_complete_collector_ignores_further_samples() {
        let config = CalibrationConfig {
            samples_per_target: 1,
            ..CalibrationConfig::default()
        };
        let mut c = collector(&config);
        assert_eq!(c.offer(&RawSample::with_ratios(t(0), 0.5, 0.5)), CollectOutcome::Complete);
        assert_eq!(c.offer(&RawSample::with_ratios(t(10), 0.1, 0.1)), CollectOutcome::Complete);
        assert_eq!(c.samples().len(), 1);
    }
}
