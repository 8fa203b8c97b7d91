//! Report encoding
//!
//! Wraps an [`IndicatorReport`] in an envelope carrying producer metadata and
//! the computation time for the presentation layer. The report itself is left
//! untouched, so re-encoding the same analysis only changes the envelope.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::{CalibrationSummary, Mapping};
use crate::error::ComputeError;
use crate::indicators::IndicatorReport;
use crate::{GAZEMETRY_VERSION, PRODUCER_NAME};

/// Current envelope schema version
pub const REPORT_SCHEMA_VERSION: &str = "gaze.report.v1";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Envelope-level quality summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeQuality {
    /// Share of samples with a valid gaze point
    pub coverage: f64,
    pub valid: bool,
    pub flags: Vec<String>,
}

/// Encoded report as delivered to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub schema: String,
    pub producer: Producer,
    pub computed_at_utc: String,
    pub quality: EnvelopeQuality,
    /// Calibration the session was mapped with, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationSummary>,
    pub report: IndicatorReport,
}

/// Encoder for report envelopes
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(&self, report: &IndicatorReport, mapping: Option<&Mapping>) -> ReportEnvelope {
        let flags = report
            .flags
            .iter()
            .filter_map(|f| serde_json::to_value(f).ok())
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        ReportEnvelope {
            schema: REPORT_SCHEMA_VERSION.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: GAZEMETRY_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            quality: EnvelopeQuality {
                coverage: report.summary.detection_rate,
                valid: report.valid,
                flags,
            },
            calibration: mapping.map(Mapping::summary),
            report: report.clone(),
        }
    }

    /// Encode to pretty JSON
    pub fn encode_to_json(
        &self,
        report: &IndicatorReport,
        mapping: Option<&Mapping>,
    ) -> Result<String, ComputeError> {
        let envelope = self.encode(report, mapping);
        serde_json::to_string_pretty(&envelope).map_err(ComputeError::JsonError)
    }
}
