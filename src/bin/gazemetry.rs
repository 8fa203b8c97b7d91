//! Gazemetry CLI - Command-line interface for Gazemetry
//!
//! Commands:
//! - calibrate: Fit a calibration record from recorded calibration samples
//! - analyze: Record a session and emit the indicator report
//! - validate: Validate raw sample schema
//! - doctor: Diagnose configuration and calibration health
//! - schema: Print schema information

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info, LevelFilter};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gazemetry::calibration::{
    load_mapping, save_mapping, CalibrationProgress, CollectionPhase, Mapping,
    CALIBRATION_SCHEMA_VERSION,
};
use gazemetry::config::GazeConfig;
use gazemetry::encoder::{ReportEncoder, REPORT_SCHEMA_VERSION};
use gazemetry::indicators::IndicatorEngine;
use gazemetry::pipeline::{calibrate_samples_with_progress, parse_samples};
use gazemetry::schema::{RawSample, RawSampleAdapter, ValidationError, SCHEMA_VERSION};
use gazemetry::session::SessionRecorder;
use gazemetry::{ComputeError, GAZEMETRY_VERSION, PRODUCER_NAME};

/// Gazemetry - Gaze calibration and behavioral indicator engine
#[derive(Parser)]
#[command(name = "gazemetry")]
#[command(version = GAZEMETRY_VERSION)]
#[command(about = "Calibrate eye-gaze ratios and score gaze sessions", long_about = None)]
struct Cli {
    /// Configuration file (JSON); missing sections take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit a calibration record from calibration samples
    Calibrate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Calibration record path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Print per-target progress to stderr
        #[arg(long)]
        progress: bool,
    },

    /// Record a session and emit its indicator report
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Calibration record to map gaze ratios with
        #[arg(short, long)]
        mapping: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Validate raw sample schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and calibration health
    Doctor {
        /// Check a calibration record
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON on one line
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (gaze.raw_sample.v1)
    Input,
    /// Calibration record (gaze.calibration.v1)
    Calibration,
    /// Report envelope (gaze.report.v1)
    Report,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GazemetryCliError> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Calibrate {
            input,
            output,
            input_format,
            progress,
        } => cmd_calibrate(&config, &input, &output, input_format, progress),

        Commands::Analyze {
            input,
            output,
            mapping,
            input_format,
            output_format,
        } => cmd_analyze(
            &config,
            &input,
            &output,
            mapping.as_deref(),
            input_format,
            output_format,
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { mapping, json } => {
            cmd_doctor(&config, cli.config.as_deref(), mapping.as_deref(), json)
        }

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn load_config(path: Option<&Path>) -> Result<GazeConfig, GazemetryCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            let config = GazeConfig::from_json(&json)?;
            debug!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(GazeConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<String, GazemetryCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_samples(input: &Path, input_format: InputFormat) -> Result<Vec<RawSample>, GazemetryCliError> {
    let input_data = read_input(input)?;
    let samples = match input_format {
        InputFormat::Ndjson => RawSampleAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawSampleAdapter::parse_array(&input_data)?,
    };
    if samples.is_empty() {
        return Err(GazemetryCliError::NoSamples);
    }
    Ok(samples)
}

fn write_output(output: &Path, data: &str) -> Result<(), GazemetryCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn cmd_calibrate(
    config: &GazeConfig,
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    progress: bool,
) -> Result<(), GazemetryCliError> {
    let samples = RawSampleAdapter::to_stream(read_samples(input, input_format)?)?;

    let mapping = calibrate_samples_with_progress(samples, config, |p: &CalibrationProgress| {
        if progress && p.phase == CollectionPhase::TargetComplete {
            eprintln!(
                "target {} complete: {} samples in {} ms",
                p.target_id, p.samples_collected, p.elapsed_ms
            );
        }
    })?;

    if output.to_string_lossy() == "-" {
        println!("{}", mapping.to_json()?);
    } else {
        save_mapping(&mapping, output)?;
    }

    Ok(())
}

fn cmd_analyze(
    config: &GazeConfig,
    input: &Path,
    output: &Path,
    mapping_path: Option<&Path>,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), GazemetryCliError> {
    let mapping = mapping_path.map(load_mapping).transpose()?;
    let mut recorder = SessionRecorder::new(config, mapping.as_ref())?;

    match input_format {
        // NDJSON is recorded line by line, the same way a live session is
        InputFormat::Ndjson => {
            let reader: Box<dyn BufRead> = if input.to_string_lossy() == "-" {
                Box::new(BufReader::new(io::stdin()))
            } else {
                Box::new(BufReader::new(fs::File::open(input)?))
            };

            for (line_num, line) in reader.lines().enumerate() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let sample: RawSample = serde_json::from_str(trimmed).map_err(|e| {
                    GazemetryCliError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    ))
                })?;
                if let Err(e @ ValidationError::InvalidSchemaVersion { .. }) = sample.validate() {
                    return Err(e.into());
                }
                recorder.push(sample)?;
            }
        }
        InputFormat::Json => {
            for sample in parse_samples(&read_input(input)?)? {
                recorder.push(sample)?;
            }
        }
    }

    if recorder.is_empty() {
        return Err(GazemetryCliError::NoSamples);
    }

    let trace = recorder.finish()?;
    info!("Recorded {} samples", trace.len());

    let report = IndicatorEngine::new(config.indicators.clone())?.analyze(&trace);
    let encoder = ReportEncoder::new();
    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&encoder.encode(&report, mapping.as_ref()))?,
        OutputFormat::JsonPretty => encoder.encode_to_json(&report, mapping.as_ref())?,
    };

    write_output(output, &output_data)
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), GazemetryCliError> {
    let input_data = read_input(input)?;

    let samples = match input_format {
        InputFormat::Ndjson => RawSampleAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => RawSampleAdapter::parse_array(&input_data)?,
    };

    let results = RawSampleAdapter::validate_samples(&samples);

    let report = ValidationReport {
        total_samples: samples.len(),
        valid_samples: samples.len() - results.len(),
        invalid_samples: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                timestamp: r.timestamp.clone(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total samples:   {}", report.total_samples);
        println!("Valid samples:   {}", report.valid_samples);
        println!("Invalid samples: {}", report.invalid_samples);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Sample {} at {}: {}", err.index, err.timestamp, err.error);
            }
        }
    }

    if report.invalid_samples > 0 {
        Err(GazemetryCliError::ValidationFailed(report.invalid_samples))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config: &GazeConfig,
    config_path: Option<&Path>,
    mapping: Option<&Path>,
    json: bool,
) -> Result<(), GazemetryCliError> {
    let mut checks: Vec<DoctorCheck> = vec![
        DoctorCheck::ok("version", format!("Gazemetry version {}", GAZEMETRY_VERSION)),
        DoctorCheck::ok(
            "schema_version",
            format!(
                "Input: {}, calibration: {}, report: {}",
                SCHEMA_VERSION, CALIBRATION_SCHEMA_VERSION, REPORT_SCHEMA_VERSION
            ),
        ),
    ];

    // Configuration was already validated on load
    checks.push(DoctorCheck::ok(
        "config",
        match config_path {
            Some(path) => format!(
                "{} valid ({}x{} screen)",
                path.display(),
                config.screen.width,
                config.screen.height
            ),
            None => format!(
                "Using defaults ({}x{} screen)",
                config.screen.width, config.screen.height
            ),
        },
    ));

    if let Some(mapping_path) = mapping {
        checks.push(check_mapping(config, mapping_path));
    }

    // Check stdin is available (for piped sessions)
    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::ok("stdin", "stdin is a TTY (interactive mode)".to_string())
    } else {
        DoctorCheck::ok("stdin", "stdin is a pipe (streaming mode ready)".to_string())
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GAZEMETRY_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Gazemetry Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GazemetryCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_mapping(config: &GazeConfig, path: &Path) -> DoctorCheck {
    let check = |status, message| DoctorCheck {
        name: "calibration".to_string(),
        status,
        message,
    };

    match load_mapping(path).and_then(|m: Mapping| m.ensure_screen(&config.screen).map(|_| m)) {
        Ok(mapping) => {
            let summary = mapping.summary();
            check(
                CheckStatus::Ok,
                format!(
                    "Calibration valid (created {}, {} of {} samples kept, fits {}/{})",
                    summary.created_at.to_rfc3339(),
                    summary.samples_kept,
                    summary.samples_collected,
                    summary.x_fit,
                    summary.y_fit
                ),
            )
        }
        Err(ComputeError::CalibrationNotFound(_)) => check(
            CheckStatus::Warning,
            "Calibration file does not exist".to_string(),
        ),
        Err(e) => check(CheckStatus::Error, e.to_string()),
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), GazemetryCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per camera frame, timestamps strictly increasing:");
                println!();
                println!("- timestamp: RFC 3339 UTC frame time (required)");
                println!("- gaze_h, gaze_v: gaze ratios in 0.0-1.0, absent when no face was found");
                println!("- pupil_left, pupil_right: {{ x, y }} pupil positions in camera pixels");
                println!("- blinking: eyes reported closed (default false)");
                println!("- schema_version: optional, must equal {} when present", SCHEMA_VERSION);
                println!();
                println!("Out-of-range or non-finite measurements are treated as absent.");
            }
        }
        SchemaType::Calibration => {
            if json_schema {
                println!("{}", get_calibration_json_schema());
            } else {
                println!("Calibration Schema: {}", CALIBRATION_SCHEMA_VERSION);
                println!();
                println!("- created_at: timestamp of the last calibration sample");
                println!("- screen: {{ width, height }} the record was made for");
                println!("- target_count, samples_per_target");
                println!("- targets: per target {{ id, screen_x, screen_y, gaze_h, gaze_v, pupil, samples_collected, samples_kept }}");
                println!("- x_fit, y_fit: piecewise_linear {{ knots }} or affine {{ slope, center, ratio_min, ratio_max }}");
            }
        }
        SchemaType::Report => {
            if json_schema {
                println!("{}", get_report_json_schema());
            } else {
                println!("Report Schema: {}", REPORT_SCHEMA_VERSION);
                println!();
                println!("- producer: {{ name, version, instance_id }}");
                println!("- computed_at_utc");
                println!("- quality: {{ coverage, valid, flags }}");
                println!("- calibration: summary of the mapping used, if any");
                println!("- report:");
                println!("  - summary: {{ started_at, ended_at, duration_secs, total_samples, valid_samples, ... }}");
                println!("  - focus: center_focus_ratio, center_accuracy, edge_gaze_ratio");
                println!("  - events: look_away_*, blink_*, saccade_*, mean_gaze_velocity");
                println!("  - composite_score, assessment, component_breakdown, indicators, flags");
            }
        }
    }

    Ok(())
}

// Helper functions

fn get_input_json_schema() -> String {
    let point = serde_json::json!({
        "type": ["object", "null"],
        "required": ["x", "y"],
        "properties": {
            "x": { "type": "number" },
            "y": { "type": "number" }
        }
    });
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Gazemetry per-frame gaze sample",
        "type": "object",
        "required": ["timestamp"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "timestamp": { "type": "string", "format": "date-time" },
            "pupil_left": point,
            "pupil_right": point,
            "gaze_h": { "type": ["number", "null"], "minimum": 0.0, "maximum": 1.0 },
            "gaze_v": { "type": ["number", "null"], "minimum": 0.0, "maximum": 1.0 },
            "blinking": { "type": "boolean", "default": false }
        }
    })
    .to_string()
}

fn get_calibration_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": CALIBRATION_SCHEMA_VERSION,
        "description": "Gazemetry calibration record",
        "type": "object",
        "required": ["schema_version", "created_at", "screen", "target_count", "samples_per_target", "targets", "x_fit", "y_fit"],
        "properties": {
            "schema_version": { "type": "string", "const": CALIBRATION_SCHEMA_VERSION },
            "created_at": { "type": "string", "format": "date-time" },
            "screen": {
                "type": "object",
                "properties": {
                    "width": { "type": "integer" },
                    "height": { "type": "integer" }
                }
            },
            "target_count": { "type": "integer", "const": 5 },
            "samples_per_target": { "type": "integer" },
            "targets": { "type": "array", "minItems": 5, "maxItems": 5, "items": { "type": "object" } },
            "x_fit": { "type": "object", "required": ["kind"] },
            "y_fit": { "type": "object", "required": ["kind"] }
        }
    })
    .to_string()
}

fn get_report_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": REPORT_SCHEMA_VERSION,
        "description": "Gazemetry session report envelope",
        "type": "object",
        "required": ["schema", "producer", "computed_at_utc", "quality", "report"],
        "properties": {
            "schema": { "type": "string", "const": REPORT_SCHEMA_VERSION },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string" },
            "quality": {
                "type": "object",
                "properties": {
                    "coverage": { "type": "number" },
                    "valid": { "type": "boolean" },
                    "flags": { "type": "array", "items": { "type": "string" } }
                }
            },
            "calibration": { "type": "object" },
            "report": { "type": "object" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum GazemetryCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    Validation(ValidationError),
    NoSamples,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for GazemetryCliError {
    fn from(e: io::Error) -> Self {
        GazemetryCliError::Io(e)
    }
}

impl From<ComputeError> for GazemetryCliError {
    fn from(e: ComputeError) -> Self {
        GazemetryCliError::Compute(e)
    }
}

impl From<serde_json::Error> for GazemetryCliError {
    fn from(e: serde_json::Error) -> Self {
        GazemetryCliError::Json(e)
    }
}

impl From<ValidationError> for GazemetryCliError {
    fn from(e: ValidationError) -> Self {
        GazemetryCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        CliError {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<GazemetryCliError> for CliError {
    fn from(e: GazemetryCliError) -> Self {
        match e {
            GazemetryCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            GazemetryCliError::Compute(e) => compute_error(e),
            GazemetryCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax"),
            GazemetryCliError::Validation(e) => CliError::new(
                "VALIDATION_ERROR",
                e.to_string(),
                "Run 'gazemetry validate' for details",
            ),
            GazemetryCliError::NoSamples => CliError::new(
                "NO_SAMPLES",
                "No samples found in input".to_string(),
                "Ensure input file is not empty",
            ),
            GazemetryCliError::ValidationFailed(count) => CliError::new(
                "VALIDATION_FAILED",
                format!("{} samples failed validation", count),
                "Fix validation errors and retry",
            ),
            GazemetryCliError::DoctorFailed => CliError::new(
                "DOCTOR_FAILED",
                "One or more health checks failed".to_string(),
                "Review the doctor report for details",
            ),
            GazemetryCliError::ParseError(msg) => CliError::new("PARSE_ERROR", msg, "Check input format"),
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let message = e.to_string();
    match e {
        ComputeError::InsufficientSamples { .. } | ComputeError::SourceExhausted(_) => CliError::new(
            "CALIBRATION_FAILED",
            message,
            "Record a longer calibration with the face visible at every target",
        ),
        ComputeError::CalibrationIncomplete { .. } | ComputeError::CalibrationInvalid(_) => {
            CliError::new("CALIBRATION_INVALID", message, "Run 'gazemetry calibrate' again")
        }
        ComputeError::CalibrationNotFound(_) => CliError::new(
            "CALIBRATION_NOT_FOUND",
            message,
            "Create one with 'gazemetry calibrate' or omit --mapping",
        ),
        ComputeError::OutOfOrderSample(_) => CliError::new(
            "OUT_OF_ORDER",
            message,
            "Sample timestamps must strictly increase",
        ),
        ComputeError::InvalidConfig(_) => CliError::new("CONFIG_ERROR", message, "Check the --config file"),
        ComputeError::Io(_) => CliError::new("IO_ERROR", message, "Check file paths and permissions"),
        _ => CliError::new(
            "PARSE_ERROR",
            message,
            "Ensure input matches gaze.raw_sample.v1 schema",
        ),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_samples: usize,
    valid_samples: usize,
    invalid_samples: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    timestamp: String,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

impl DoctorCheck {
    fn ok(name: &str, message: String) -> Self {
        DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message,
        }
    }
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
