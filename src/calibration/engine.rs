//! Five-target calibration run
//!
//! Drives one [`TargetCollector`] per target in presentation order, reduces
//! each completed target to a [`TargetRecord`] and fits the [`Mapping`] once
//! all targets are covered. Dropping the engine mid-run aborts calibration
//! without producing anything.

use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::calibration::collector::{
    CalibrationProgress, CollectOutcome, CollectionPhase, TargetCollector,
};
use crate::calibration::filter::estimate_ratio;
use crate::calibration::mapping::{Mapping, TargetRecord};
use crate::calibration::target::{
    standard_targets, CalibrationTarget, TargetId, REQUIRED_TARGETS,
};
use crate::config::{CalibrationConfig, GazeConfig, ScreenGeometry};
use crate::error::ComputeError;
use crate::schema::RawSample;
use crate::source::SampleSource;

/// Calibration state machine over the standard target set
#[derive(Debug)]
pub struct CalibrationEngine {
    screen: ScreenGeometry,
    config: CalibrationConfig,
    targets: Vec<CalibrationTarget>,
    collector: Option<TargetCollector>,
    records: Vec<TargetRecord>,
    last_timestamp: Option<DateTime<Utc>>,
    /// Target that hit the hard timeout; the run is over once set
    aborted: Option<TargetId>,
}

impl CalibrationEngine {
    /// Create an engine for the configured screen
    pub fn new(config: &GazeConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::with_parts(config.screen, config.calibration.clone()))
    }

    fn with_parts(screen: ScreenGeometry, config: CalibrationConfig) -> Self {
        let targets = standard_targets(&screen, config.target_margin_px);
        let collector = targets
            .first()
            .map(|t| TargetCollector::new(*t, &config));
        Self {
            screen,
            config,
            targets,
            collector,
            records: Vec::with_capacity(REQUIRED_TARGETS),
            last_timestamp: None,
            aborted: None,
        }
    }

    /// All targets in presentation order
    pub fn targets(&self) -> &[CalibrationTarget] {
        &self.targets
    }

    /// Target currently collecting, `None` once every target is complete
    pub fn current_target(&self) -> Option<&CalibrationTarget> {
        self.collector.as_ref().map(|c| c.target())
    }

    /// Number of completed targets
    pub fn completed(&self) -> usize {
        self.records.len()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.records.len() == self.targets.len()
    }

    /// Target whose hard timeout aborted the run, if any
    pub fn aborted(&self) -> Option<TargetId> {
        self.aborted
    }

    fn timeout_error(&self, target: TargetId) -> ComputeError {
        ComputeError::InsufficientSamples {
            target,
            timeout_ms: self.config.hard_timeout_ms,
        }
    }

    /// Records of the targets completed so far
    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    /// Feed one sample to the current target.
    ///
    /// Returns the progress of the target the sample was offered to. Samples
    /// pushed after every target completed are ignored. Out-of-range or
    /// non-finite fields are treated as absent. After a hard timeout every
    /// further push fails with the same `InsufficientSamples`.
    pub fn push(&mut self, sample: &RawSample) -> Result<CalibrationProgress, ComputeError> {
        if let Some(target) = self.aborted {
            return Err(self.timeout_error(target));
        }
        if let Some(last) = self.last_timestamp {
            if sample.timestamp <= last {
                return Err(ComputeError::OutOfOrderSample(format!(
                    "{} does not follow {}",
                    sample.timestamp.to_rfc3339(),
                    last.to_rfc3339()
                )));
            }
        }
        self.last_timestamp = Some(sample.timestamp);

        let Some(collector) = self.collector.as_mut() else {
            let (target_id, samples_collected) = self
                .records
                .last()
                .map(|r| (r.id, r.samples_collected))
                .unwrap_or((TargetId::Center, 0));
            return Ok(CalibrationProgress {
                target_id,
                phase: CollectionPhase::TargetComplete,
                samples_collected,
                elapsed_ms: 0,
            });
        };

        let outcome = collector.offer(&sample.clone().sanitized());
        let progress = collector.progress();

        match outcome {
            CollectOutcome::TimedOut => {
                warn!(
                    "No usable sample for target {} within {} ms, aborting calibration",
                    progress.target_id, self.config.hard_timeout_ms
                );
                self.collector = None;
                self.aborted = Some(progress.target_id);
                Err(self.timeout_error(progress.target_id))
            }
            CollectOutcome::Complete => {
                self.complete_current()?;
                Ok(progress)
            }
            CollectOutcome::Waiting | CollectOutcome::Collecting => Ok(progress),
        }
    }

    fn complete_current(&mut self) -> Result<(), ComputeError> {
        let Some(collector) = self.collector.take() else {
            return Ok(());
        };
        let target = *collector.target();
        let elapsed_ms = collector.elapsed_ms();
        let samples = collector.into_samples();

        let estimate = estimate_ratio(
            &samples,
            self.config.outlier_mad_multiplier,
            self.config.weight_epsilon,
        )
        .ok_or_else(|| self.timeout_error(target.id))?;

        debug!(
            "Target {} complete: {} samples in {} ms, {} kept, ratio ({:.4}, {:.4})",
            target.id,
            samples.len(),
            elapsed_ms,
            estimate.kept,
            estimate.gaze_h,
            estimate.gaze_v
        );

        self.records.push(TargetRecord {
            id: target.id,
            screen_x: target.screen_x,
            screen_y: target.screen_y,
            gaze_h: estimate.gaze_h,
            gaze_v: estimate.gaze_v,
            pupil: estimate.pupil,
            samples_collected: samples.len(),
            samples_kept: estimate.kept,
        });

        self.collector = self
            .targets
            .get(self.records.len())
            .map(|next| TargetCollector::new(*next, &self.config));
        Ok(())
    }

    /// Fit the mapping. Consumes the engine.
    ///
    /// `created_at` is the timestamp of the last sample pushed, so the same
    /// input always produces the same record.
    pub fn finish(self) -> Result<Mapping, ComputeError> {
        if let Some(target) = self.aborted {
            return Err(self.timeout_error(target));
        }
        if !self.is_complete() {
            return Err(ComputeError::CalibrationIncomplete {
                completed: self.records.len(),
                required: self.targets.len(),
            });
        }
        let created_at = self.last_timestamp.unwrap_or_default();
        Mapping::fit(
            self.screen,
            self.records,
            self.config.samples_per_target,
            created_at,
        )
    }

    /// Pull samples from `source` until every target completes, then fit.
    ///
    /// `on_progress` sees every progress event. A source that ends early
    /// yields `SourceExhausted` naming the target still waiting.
    pub fn run<S, F>(mut self, source: &mut S, mut on_progress: F) -> Result<Mapping, ComputeError>
    where
        S: SampleSource + ?Sized,
        F: FnMut(&CalibrationProgress),
    {
        while let Some(target) = self.current_target().map(|t| t.id) {
            let Some(sample) = source.next_sample() else {
                warn!("Sample source ended while collecting target {target}");
                return Err(ComputeError::SourceExhausted(target));
            };
            let progress = self.push(&sample)?;
            on_progress(&progress);
        }
        self.finish()
    }
}
