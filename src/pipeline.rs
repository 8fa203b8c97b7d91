//! Pipeline orchestration
//!
//! Public entry points that run the full path from raw sample payloads to a
//! calibration record or an encoded indicator report.

use log::info;

use crate::calibration::{CalibrationEngine, CalibrationProgress, Mapping};
use crate::config::GazeConfig;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::indicators::{IndicatorEngine, IndicatorReport};
use crate::schema::{RawSample, RawSampleAdapter};
use crate::session::{SessionRecorder, SessionTrace};

/// Parse a sample payload, accepting a JSON array or NDJSON.
///
/// The result is checked for strictly increasing timestamps and sanitized.
pub fn parse_samples(payload: &str) -> Result<Vec<RawSample>, ComputeError> {
    let samples = if payload.trim_start().starts_with('[') {
        RawSampleAdapter::parse_array(payload)?
    } else {
        RawSampleAdapter::parse_ndjson(payload)?
    };
    RawSampleAdapter::to_stream(samples)
}

/// Run a full calibration over recorded samples.
///
/// Samples are consumed in order until every target completes; any left over
/// are ignored.
pub fn calibrate_samples(
    samples: Vec<RawSample>,
    config: &GazeConfig,
) -> Result<Mapping, ComputeError> {
    calibrate_samples_with_progress(samples, config, |_| {})
}

/// [`calibrate_samples`] with a progress observer
pub fn calibrate_samples_with_progress<F>(
    samples: Vec<RawSample>,
    config: &GazeConfig,
    on_progress: F,
) -> Result<Mapping, ComputeError>
where
    F: FnMut(&CalibrationProgress),
{
    let engine = CalibrationEngine::new(config)?;
    let mut source = samples.into_iter();
    engine.run(&mut source, on_progress)
}

/// Record a session from samples: sanitize, smooth, map, freeze.
pub fn record_samples(
    samples: Vec<RawSample>,
    mapping: Option<&Mapping>,
    config: &GazeConfig,
) -> Result<SessionTrace, ComputeError> {
    let mut recorder = SessionRecorder::new(config, mapping)?;
    for sample in samples {
        recorder.push(sample)?;
    }
    recorder.finish()
}

/// Record and analyze a session in one step
pub fn analyze_samples(
    samples: Vec<RawSample>,
    mapping: Option<&Mapping>,
    config: &GazeConfig,
) -> Result<IndicatorReport, ComputeError> {
    config.validate()?;
    let engine = IndicatorEngine::new(config.indicators.clone())?;
    let trace = record_samples(samples, mapping, config)?;
    Ok(engine.analyze(&trace))
}

/// Convert a sample payload to an encoded report (stateless, one-shot).
///
/// # Arguments
/// * `samples_json` - JSON array or NDJSON of `gaze.raw_sample.v1` records
/// * `mapping_json` - Calibration record, if the session was calibrated
///
/// # Example
/// ```ignore
/// let report_json = samples_to_report(samples_json, Some(mapping_json))?;
/// ```
pub fn samples_to_report(
    samples_json: String,
    mapping_json: Option<String>,
) -> Result<String, ComputeError> {
    let config = GazeConfig::default();
    let mapping = mapping_json
        .as_deref()
        .map(Mapping::from_json)
        .transpose()?;
    let samples = parse_samples(&samples_json)?;
    let report = analyze_samples(samples, mapping.as_ref(), &config)?;
    ReportEncoder::new().encode_to_json(&report, mapping.as_ref())
}

/// Convert a calibration sample payload to a calibration record (stateless, one-shot)
pub fn samples_to_calibration(samples_json: String) -> Result<String, ComputeError> {
    let samples = parse_samples(&samples_json)?;
    calibrate_samples(samples, &GazeConfig::default())?.to_json()
}

/// Stateful processor holding the configuration and the current calibration.
///
/// Use this when one calibration serves several sessions.
pub struct GazeProcessor {
    config: GazeConfig,
    mapping: Option<Mapping>,
    engine: IndicatorEngine,
    encoder: ReportEncoder,
}

impl Default for GazeProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GazeProcessor {
    /// Create a processor with the default configuration
    pub fn new() -> Self {
        Self {
            engine: IndicatorEngine::default(),
            config: GazeConfig::default(),
            mapping: None,
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with a validated configuration
    pub fn with_config(config: GazeConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            engine: IndicatorEngine::new(config.indicators.clone())?,
            config,
            mapping: None,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &GazeConfig {
        &self.config
    }

    pub fn mapping(&self) -> Option<&Mapping> {
        self.mapping.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.mapping.is_some()
    }

    /// Calibrate from a sample payload and keep the result.
    ///
    /// Returns the calibration record JSON. A failed calibration leaves any
    /// previous mapping in place.
    pub fn calibrate(&mut self, samples_json: &str) -> Result<String, ComputeError> {
        let samples = parse_samples(samples_json)?;
        let mapping = calibrate_samples(samples, &self.config)?;
        let json = mapping.to_json()?;
        self.mapping = Some(mapping);
        Ok(json)
    }

    /// Start a live session against the current calibration
    pub fn recorder(&self) -> Result<SessionRecorder<'_>, ComputeError> {
        SessionRecorder::new(&self.config, self.mapping.as_ref())
    }

    /// Analyze a frozen trace
    pub fn analyze(&self, trace: &SessionTrace) -> IndicatorReport {
        self.engine.analyze(trace)
    }

    /// Record, analyze and encode a session payload
    pub fn process(&self, samples_json: &str) -> Result<String, ComputeError> {
        let samples = parse_samples(samples_json)?;
        let trace = record_samples(samples, self.mapping.as_ref(), &self.config)?;
        let report = self.engine.analyze(&trace);
        info!(
            "Session {} analyzed: score {:.3} ({:?})",
            report.session_id, report.composite_score, report.assessment
        );
        self.encoder.encode_to_json(&report, self.mapping.as_ref())
    }

    /// Save the current calibration record to JSON
    pub fn save_calibration(&self) -> Result<String, ComputeError> {
        match &self.mapping {
            Some(mapping) => mapping.to_json(),
            None => Err(ComputeError::CalibrationNotFound(
                "processor holds no calibration".to_string(),
            )),
        }
    }

    /// Load a calibration record; it must match the configured screen
    pub fn load_calibration(&mut self, json: &str) -> Result<(), ComputeError> {
        let mapping = Mapping::from_json(json)?;
        mapping.ensure_screen(&self.config.screen)?;
        self.mapping = Some(mapping);
        Ok(())
    }

    /// Forget the current calibration
    pub fn clear_calibration(&mut self) {
        self.mapping = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{standard_targets, TargetId};
    use crate::config::ScreenGeometry;
    use crate::indicators::ReportFlag;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn ratio_for(x: f64, y: f64) -> (f64, f64) {
        (0.30 + 0.40 * x / 1920.0, 0.35 + 0.30 * y / 1080.0)
    }

    fn calibration_samples() -> Vec<RawSample> {
        let mut out = Vec::new();
        let mut ms = 0;
        for target in standard_targets(&ScreenGeometry::default(), 150) {
            let (h, v) = ratio_for(target.screen_x, target.screen_y);
            for _ in 0..10 {
                out.push(RawSample::with_ratios(t(ms), h, v));
                ms += 33;
            }
        }
        out
    }

    fn to_ndjson(samples: &[RawSample]) -> String {
        samples
            .iter()
            .map(|s| serde_json::to_string(s).unwrap())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 30 s session looking at the center, with a glance to the corner every 3 s
    fn session_samples() -> Vec<RawSample> {
        (0..900)
            .map(|i| {
                let (h, v) = if i % 90 < 10 {
                    ratio_for(200.0, 200.0)
                } else {
                    ratio_for(960.0, 540.0)
                };
                RawSample::with_ratios(t(60_000 + i * 33), h, v).blinking(i % 100 == 50)
            })
            .collect()
    }

    #[test]
    fn test_calibrate_then_analyze() {
        let config = GazeConfig::default();
        let mapping = calibrate_samples(calibration_samples(), &config).unwrap();
        let center = mapping.target(TargetId::Center).unwrap();
        assert!((center.gaze_h - 0.5).abs() < 1e-9);

        let report = analyze_samples(session_samples(), Some(&mapping), &config).unwrap();

        assert!(report.valid);
        assert_eq!(report.summary.total_samples, 900);
        assert_eq!(report.look_away_count, 10);
        assert_eq!(report.blink_count, 9);
        assert!(report.center_focus_ratio > 0.85);
        assert!(!report.has_flag(ReportFlag::NoMapping));
    }

    #[test]
    fn test_analyze_without_mapping_is_degenerate() {
        let report = analyze_samples(session_samples(), None, &GazeConfig::default()).unwrap();
        assert!(!report.valid);
        assert!(report.has_flag(ReportFlag::DegenerateSession));
        assert!(report.has_flag(ReportFlag::NoMapping));
        assert_eq!(report.blink_count, 9);
    }

    #[test]
    fn test_parse_samples_accepts_both_layouts() {
        let samples = calibration_samples();
        let array = serde_json::to_string(&samples).unwrap();

        assert_eq!(parse_samples(&array).unwrap().len(), 50);
        assert_eq!(parse_samples(&to_ndjson(&samples)).unwrap().len(), 50);
    }

    #[test]
    fn test_one_shot_round_trip() {
        let mapping_json = samples_to_calibration(to_ndjson(&calibration_samples())).unwrap();
        let report_json =
            samples_to_report(to_ndjson(&session_samples()), Some(mapping_json)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&report_json).unwrap();
        assert_eq!(value["schema"], "gaze.report.v1");
        assert_eq!(value["report"]["valid"], true);
        assert!(value["calibration"].is_object());
    }

    #[test]
    fn test_processor_keeps_calibration() {
        let mut processor = GazeProcessor::new();
        assert!(!processor.is_calibrated());
        assert!(matches!(
            processor.save_calibration(),
            Err(ComputeError::CalibrationNotFound(_))
        ));

        processor
            .calibrate(&to_ndjson(&calibration_samples()))
            .unwrap();
        let saved = processor.save_calibration().unwrap();

        let mut other = GazeProcessor::new();
        other.load_calibration(&saved).unwrap();
        assert_eq!(other.mapping(), processor.mapping());

        let out = other.process(&to_ndjson(&session_samples())).unwrap();
        assert!(out.contains("\"center_focus_ratio\""));
    }

    #[test]
    fn test_processor_rejects_foreign_screen() {
        let mut processor = GazeProcessor::new();
        processor
            .calibrate(&to_ndjson(&calibration_samples()))
            .unwrap();
        let saved = processor.save_calibration().unwrap();

        let mut config = GazeConfig::default();
        config.screen = ScreenGeometry::new(2560, 1440);
        let mut other = GazeProcessor::with_config(config).unwrap();
        assert!(matches!(
            other.load_calibration(&saved),
            Err(ComputeError::CalibrationInvalid(_))
        ));
    }

    #[test]
    fn test_live_recorder_matches_batch() {
        let mut processor = GazeProcessor::new();
        processor
            .calibrate(&to_ndjson(&calibration_samples()))
            .unwrap();

        let mut recorder = processor.recorder().unwrap();
        for sample in session_samples() {
            recorder.push(sample).unwrap();
        }
        let live = processor.analyze(&recorder.finish().unwrap());
        let batch = analyze_samples(
            session_samples(),
            processor.mapping(),
            processor.config(),
        )
        .unwrap();

        assert_eq!(live.center_focus_ratio, batch.center_focus_ratio);
        assert_eq!(live.look_away_count, batch.look_away_count);
    }
}
