//! Engage CLI - Command-line interface for the engagement tracker
//!
//! Commands:
//! - replay: Drive a recorded host event log through a tracker
//! - classify: Classify a single element snapshot
//! - validate: Validate host event log schema
//! - doctor: Diagnose configuration and fallback storage
//! - schema: Print the event log schema

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use engagement_tracker::engagement::capture::classify;
use engagement_tracker::reporting::{FallbackStore, FileStore, MemoryStore, RecordingSink};
use engagement_tracker::schema::{EventLogAdapter, HostEventRecord, ReplayPlan, ReplayStats, SCHEMA_VERSION};
use engagement_tracker::types::{AnalyticsSnapshot, ElementSnapshot};
use engagement_tracker::{
    AnalyticsEvent, EngagementTracker, RecordingHost, SinkStatus, TrackerConfig, TrackerError,
    UiCommand, PRODUCER_NAME, TRACKER_VERSION,
};

/// Engage - Page engagement analytics tracker
#[derive(Parser)]
#[command(name = "engage")]
#[command(version = TRACKER_VERSION)]
#[command(about = "Replay and inspect page engagement tracking", long_about = None)]
struct Cli {
    /// Log verbosity (error, warn, info, debug, trace); RUST_LOG overrides
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded host event log through a tracker
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Tracker configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Never attach an analytics sink (exercises the fallback path)
        #[arg(long, conflicts_with = "sink_at")]
        no_sink: bool,

        /// Attach the sink at this virtual time instead of at start
        #[arg(long)]
        sink_at: Option<u64>,

        /// Stop the clock here (defaults to the last record)
        #[arg(long)]
        until: Option<u64>,

        /// Persist the fallback snapshot into this directory
        #[arg(long)]
        fallback_dir: Option<PathBuf>,

        /// Wall-clock start used for click timestamps (RFC 3339)
        #[arg(long)]
        started_at: Option<DateTime<Utc>>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Classify one element snapshot
    Classify {
        /// Element snapshot JSON file (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Validate host event log schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and fallback storage
    Doctor {
        /// Tracker configuration to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fallback directory to check for writability
        #[arg(long)]
        fallback_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Detect from the first character
    Auto,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
    /// Sink events only, one per line
    Ndjson,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging (reads RUST_LOG env var)
    let level = cli.log_level.parse().unwrap_or(log::LevelFilter::Warn);
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
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

fn run(cli: Cli) -> Result<(), EngageCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            config,
            no_sink,
            sink_at,
            until,
            fallback_dir,
            started_at,
            output_format,
        } => {
            let options = ReplayOptions {
                no_sink,
                plan: ReplayPlan { sink_at, until },
                fallback_dir,
                started_at,
            };
            cmd_replay(&input, input_format, config.as_deref(), &options, output_format)
        }

        Commands::Classify { input } => cmd_classify(&input),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor {
            config,
            fallback_dir,
            json,
        } => cmd_doctor(config.as_deref(), fallback_dir.as_deref(), json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

struct ReplayOptions {
    no_sink: bool,
    plan: ReplayPlan,
    fallback_dir: Option<PathBuf>,
    started_at: Option<DateTime<Utc>>,
}

fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    config: Option<&Path>,
    options: &ReplayOptions,
    output_format: OutputFormat,
) -> Result<(), EngageCliError> {
    let records = read_records(input, &input_format)?;
    if records.is_empty() {
        return Err(EngageCliError::NoEvents);
    }

    let failures = EventLogAdapter::validate_records(&records);
    if let Some(first) = failures.first() {
        return Err(EngageCliError::InvalidRecord(format!(
            "record {} ({}): {}",
            first.index, first.event_type, first.error
        )));
    }

    let config = load_config(config)?;
    let fallback_key = config.fallback_key.clone();

    let memory = MemoryStore::shared();
    let fallback: Box<dyn FallbackStore> = match &options.fallback_dir {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => Box::new(memory.clone()),
    };

    let mut tracker = EngagementTracker::with_fallback(config, RecordingHost::new(), fallback)?;
    if let Some(started_at) = options.started_at {
        tracker = tracker.with_started_at(started_at);
    }

    let sink = if options.no_sink {
        None
    } else {
        Some(RecordingSink::shared())
    };

    let stats = EventLogAdapter::replay(&records, &mut tracker, sink.clone(), &options.plan)?;
    log::info!(
        "Replayed {} records, sink {:?}",
        stats.dispatched,
        tracker.sink_status()
    );

    let sink_events = sink
        .as_ref()
        .map(|s| s.borrow_mut().take_events())
        .unwrap_or_default();

    if let OutputFormat::Ndjson = output_format {
        for event in &sink_events {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }

    let fallback = if tracker.reporter().fallback_written() {
        let stored = match &options.fallback_dir {
            Some(dir) => FileStore::new(dir).get_item(&fallback_key),
            None => memory.borrow().get_item(&fallback_key),
        };
        match stored {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        }
    } else {
        None
    };

    let report = ReplayReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRACKER_VERSION.to_string(),
        stats,
        sink_status: tracker.sink_status(),
        dropped_events: tracker.reporter().dropped(),
        sink_events,
        ui_commands: tracker.host_mut().take_commands(),
        fallback,
        snapshot: tracker.snapshot(),
    };

    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        _ => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

fn cmd_classify(input: &Path) -> Result<(), EngageCliError> {
    let element: ElementSnapshot = serde_json::from_str(&read_input(input)?)?;
    println!("{}", serde_json::to_string_pretty(&classify(&element))?);
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), EngageCliError> {
    let records = read_records(input, &input_format)?;
    let results = EventLogAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - results.len(),
        invalid_records: results.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                event_type: r.event_type.to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} (index {}): {}", err.event_type, err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(EngageCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, fallback_dir: Option<&Path>, json: bool) -> Result<(), EngageCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "tracker_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Engagement tracker version {}", TRACKER_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Event log schema: {}", SCHEMA_VERSION),
    });

    match config {
        Some(path) => checks.push(check_config(path)),
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using default configuration".to_string(),
        }),
    }

    if let Some(dir) = fallback_dir {
        let probe = FileStore::new(dir).set_item("doctor_probe", "{}");
        checks.push(match probe {
            Ok(()) => DoctorCheck {
                name: "fallback_dir".to_string(),
                status: CheckStatus::Ok,
                message: format!("Fallback directory {} is writable", dir.display()),
            },
            Err(e) => DoctorCheck {
                name: "fallback_dir".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot write fallback data: {}", e),
            },
        });
    }

    // Check stdin is available (for piped event logs)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: TRACKER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Engage Doctor Report");
        println!("====================");
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
        Err(EngageCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn check_config(path: &Path) -> DoctorCheck {
    if !path.exists() {
        return DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist, defaults apply".to_string(),
        };
    }

    let loaded = fs::read_to_string(path)
        .map_err(TrackerError::from)
        .and_then(|content| TrackerConfig::from_json(&content));

    match loaded {
        Ok(config) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Config valid ({} scroll thresholds, sink timeout {}ms)",
                config.scroll_thresholds.len(),
                config.sink_timeout_ms
            ),
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), EngageCliError> {
    if json_schema {
        println!("{}", get_input_json_schema());
        return Ok(());
    }

    println!("Event Log Schema: {}", SCHEMA_VERSION);
    println!();
    println!("Each record is {{ schema_version, at_ms, event }} where at_ms is");
    println!("milliseconds since page load and records are in ascending order.");
    println!();
    println!("Event types:");
    println!("  - dom_ready      Start tracking");
    println!("  - click          {{ element, x, y, geometry? }}");
    println!("  - scroll         {{ geometry: {{ scroll_y, document_height, viewport_height }} }}");
    println!("  - mouse_leave    {{ y }} (exit intent when y <= 0)");
    println!("  - mouse_enter");
    println!("  - before_unload");
    println!("  - dialog_action  {{ choice: close | stay_on_site | continue_browsing | whatsapp }}");
    println!();
    println!("Element snapshots: {{ tag, classes, id, text, href?, type?, heading?, ancestors }}");

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, EngageCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_records(input: &Path, format: &InputFormat) -> Result<Vec<HostEventRecord>, EngageCliError> {
    let data = read_input(input)?;
    let records = match format {
        InputFormat::Auto => EventLogAdapter::parse(&data)?,
        InputFormat::Ndjson => EventLogAdapter::parse_ndjson(&data)?,
        InputFormat::Json => EventLogAdapter::parse_array(&data)?,
    };
    Ok(records)
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, EngageCliError> {
    match path {
        Some(path) => Ok(TrackerConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(TrackerConfig::default()),
    }
}

fn get_input_json_schema() -> String {
    let geometry = serde_json::json!({
        "type": "object",
        "required": ["scroll_y", "document_height", "viewport_height"],
        "properties": {
            "scroll_y": { "type": "number", "minimum": 0 },
            "document_height": { "type": "number", "minimum": 0 },
            "viewport_height": { "type": "number", "minimum": 0 }
        }
    });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Recorded page host event",
        "type": "object",
        "required": ["at_ms", "event"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "at_ms": { "type": "integer", "minimum": 0 },
            "event": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": {
                        "type": "string",
                        "enum": [
                            "dom_ready", "click", "scroll", "mouse_leave",
                            "mouse_enter", "before_unload", "dialog_action"
                        ]
                    },
                    "element": {
                        "type": "object",
                        "properties": {
                            "tag": { "type": "string" },
                            "classes": { "type": "array", "items": { "type": "string" } },
                            "id": { "type": "string" },
                            "text": { "type": "string" },
                            "href": { "type": "string" },
                            "type": { "type": "string" },
                            "heading": { "type": "string" },
                            "ancestors": { "type": "array", "items": { "type": "object" } }
                        }
                    },
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "geometry": geometry,
                    "choice": {
                        "type": "string",
                        "enum": ["close", "stay_on_site", "continue_browsing", "whatsapp"]
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum EngageCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoEvents,
    InvalidRecord(String),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for EngageCliError {
    fn from(e: io::Error) -> Self {
        EngageCliError::Io(e)
    }
}

impl From<TrackerError> for EngageCliError {
    fn from(e: TrackerError) -> Self {
        EngageCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for EngageCliError {
    fn from(e: serde_json::Error) -> Self {
        EngageCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<EngageCliError> for CliError {
    fn from(e: EngageCliError) -> Self {
        match e {
            EngageCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            EngageCliError::Tracker(TrackerError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'engage doctor --config <file>' for details".to_string()),
            },
            EngageCliError::Tracker(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches page.host_event.v1 schema".to_string()),
            },
            EngageCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            EngageCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            EngageCliError::InvalidRecord(msg) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'engage validate' for details".to_string()),
            },
            EngageCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            EngageCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ReplayReport {
    producer: String,
    version: String,
    stats: ReplayStats,
    sink_status: SinkStatus,
    dropped_events: u64,
    sink_events: Vec<AnalyticsEvent>,
    ui_commands: Vec<UiCommand>,
    fallback: Option<serde_json::Value>,
    snapshot: AnalyticsSnapshot,
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_type: String,
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

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
