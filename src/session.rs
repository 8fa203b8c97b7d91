//! Session traces
//!
//! A trace is built append-only while the session runs and frozen into an
//! immutable [`SessionTrace`] at the end. [`SessionRecorder`] wires the live
//! path: sanitize, smooth, map, append.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::Mapping;
use crate::config::{GazeConfig, ScreenGeometry};
use crate::error::ComputeError;
use crate::mapper::{ScreenMapper, ScreenPoint};
use crate::schema::RawSample;
use crate::smoother::StreamingSmoother;

/// One mapped sample of a session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    pub point: ScreenPoint,
    pub blinking: bool,
}

/// Append-only builder enforcing strictly increasing timestamps
#[derive(Debug, Clone)]
pub struct TraceBuilder {
    session_id: Uuid,
    screen: ScreenGeometry,
    calibrated: bool,
    entries: Vec<TraceEntry>,
}

impl TraceBuilder {
    /// Start an uncalibrated trace; mark it with `calibrated(true)` when points
    /// come from a mapping
    pub fn new(screen: ScreenGeometry) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            screen,
            calibrated: false,
            entries: Vec::new(),
        }
    }

    /// Use a caller-supplied session id instead of a random one
    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Mark whether points were produced with a calibration mapping
    pub fn calibrated(mut self, calibrated: bool) -> Self {
        self.calibrated = calibrated;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an entry; its timestamp must exceed the previous one
    pub fn push(&mut self, entry: TraceEntry) -> Result<(), ComputeError> {
        if let Some(last) = self.entries.last() {
            if entry.timestamp <= last.timestamp {
                return Err(ComputeError::OutOfOrderSample(format!(
                    "{} does not follow {}",
                    entry.timestamp.to_rfc3339(),
                    last.timestamp.to_rfc3339()
                )));
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn push_point(
        &mut self,
        timestamp: DateTime<Utc>,
        point: ScreenPoint,
        blinking: bool,
    ) -> Result<(), ComputeError> {
        self.push(TraceEntry {
            timestamp,
            point,
            blinking,
        })
    }

    /// Freeze into an immutable trace
    pub fn freeze(self) -> SessionTrace {
        SessionTrace {
            session_id: self.session_id,
            screen: self.screen,
            calibrated: self.calibrated,
            entries: self.entries,
        }
    }
}

/// Immutable, time-ordered record of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTrace {
    session_id: Uuid,
    screen: ScreenGeometry,
    calibrated: bool,
    entries: Vec<TraceEntry>,
}

impl SessionTrace {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn screen(&self) -> &ScreenGeometry {
        &self.screen
    }

    /// Whether a calibration mapping produced the points
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| e.timestamp)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.timestamp)
    }

    /// Wall-clock span between the first and last entry, in seconds
    pub fn duration_secs(&self) -> f64 {
        match (self.started_at(), self.ended_at()) {
            (Some(start), Some(end)) => (end - start).num_microseconds().unwrap_or(0) as f64 / 1e6,
            _ => 0.0,
        }
    }

    /// Entries whose point is valid
    pub fn valid_entries(&self) -> impl Iterator<Item = &TraceEntry> {
        self.entries.iter().filter(|e| e.point.valid)
    }
}

/// Live session path: sanitize, smooth, map, append.
///
/// Smoothing holds back `window / 2` samples for look-ahead; `finish` flushes
/// them. Calling `finish` at any sample boundary yields a valid, shorter
/// trace.
#[derive(Debug)]
pub struct SessionRecorder<'m> {
    mapping: Option<&'m Mapping>,
    smoother: StreamingSmoother,
    builder: TraceBuilder,
    last_timestamp: Option<DateTime<Utc>>,
}

impl<'m> SessionRecorder<'m> {
    /// Start recording. A mapping fitted for another screen is rejected.
    pub fn new(config: &GazeConfig, mapping: Option<&'m Mapping>) -> Result<Self, ComputeError> {
        if let Some(mapping) = mapping {
            mapping.ensure_screen(&config.screen)?;
        }
        let builder = TraceBuilder::new(config.screen).calibrated(mapping.is_some());
        debug!(
            "Recording session {} (calibrated: {})",
            builder.session_id,
            mapping.is_some()
        );
        Ok(Self {
            mapping,
            smoother: StreamingSmoother::new(config.smoothing.window),
            builder,
            last_timestamp: None,
        })
    }

    pub fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.builder = self.builder.with_session_id(session_id);
        self
    }

    /// Samples accepted so far, including those still held by the smoother
    pub fn len(&self) -> usize {
        self.builder.len() + self.smoother.pending()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Feed one raw sample
    pub fn push(&mut self, sample: RawSample) -> Result<(), ComputeError> {
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

        if let Some(smoothed) = self.smoother.push(sample.sanitized()) {
            self.append(&smoothed)?;
        }
        Ok(())
    }

    /// Flush held-back samples and freeze the trace
    pub fn finish(self) -> Result<SessionTrace, ComputeError> {
        let Self {
            mapping,
            smoother,
            mut builder,
            ..
        } = self;
        for smoothed in smoother.finish() {
            let point = ScreenMapper::map(&smoothed, mapping);
            builder.push_point(smoothed.timestamp, point, smoothed.blinking)?;
        }
        Ok(builder.freeze())
    }

    fn append(&mut self, sample: &RawSample) -> Result<(), ComputeError> {
        let point = ScreenMapper::map(sample, self.mapping);
        self.builder
            .push_point(sample.timestamp, point, sample.blinking)
    }
}
