//! heading-engine: replay sensor traces through the heading and proximity engine
//!
//! Reads newline-delimited JSON sensor events (from `--trace` or stdin),
//! feeds them to the engine on a consumer thread and prints every update
//! that passes change suppression. Pass `--epoch` to make declination, and so
//! the output, independent of when the replay runs.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use heading_engine::api::{event_channel, CsvFormatter, EngineDriver, EngineUpdate, JsonFormatter, TextFormatter};
use heading_engine::sensors::{pump, RecordedTrace, SensorSource};
use heading_engine::utils::ConfigurationManager;
use std::io::BufReader;
use std::path::PathBuf;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Compact,
    Json,
    Csv,
}

/// Compass heading and nearby-landmark engine
#[derive(Parser, Debug)]
#[command(name = "heading-engine", version, about)]
struct Args {
    /// Path to JSON engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Recorded sensor trace (JSON lines); reads stdin when omitted
    #[arg(short, long)]
    trace: Option<PathBuf>,

    /// Output format for updates
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// WMM coefficient file overriding the configured model
    #[arg(long)]
    cof: Option<PathBuf>,

    /// Omit the CSV header row
    #[arg(long)]
    no_header: bool,

    /// Instant (RFC 3339) of trace timestamp 0 for declination; wall clock when omitted
    #[arg(long)]
    epoch: Option<DateTime<Utc>>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    // RUST_LOG overrides the default level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut manager = match &args.config {
        Some(path) => ConfigurationManager::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ConfigurationManager::new(),
    };
    if let Some(cof) = &args.cof {
        manager.set_coefficient_file(Some(cof.clone()));
    }

    if args.dump_config {
        println!("{}", serde_json::to_string_pretty(manager.get_config())?);
        return Ok(());
    }

    let engine = manager.build_engine().context("building heading engine")?;
    let (sender, receiver) = event_channel();
    let mut driver = EngineDriver::new(engine, manager.known_points().to_vec(), receiver)
        .with_facing_tolerance(manager.get_facing_tolerance())
        .with_notifier(manager.notifier());
    if let Some(epoch) = args.epoch {
        driver = driver.with_replay_epoch(epoch);
    }

    let mut source: Box<dyn SensorSource + Send> = match &args.trace {
        Some(path) => Box::new(
            RecordedTrace::open(path).with_context(|| format!("opening trace {}", path.display()))?,
        ),
        None => Box::new(RecordedTrace::new(BufReader::new(std::io::stdin()))),
    };

    let producer = thread::spawn(move || pump(source.as_mut(), &sender));

    driver.register_callback(printer(args.format, !args.no_header));

    info!(
        points = driver.known_points().len(),
        format = ?args.format,
        epoch = ?args.epoch,
        "replay_started"
    );
    let stats = driver.run();

    let forwarded = producer
        .join()
        .map_err(|_| anyhow!("sensor source thread panicked"))?
        .context("reading sensor events")?;

    info!(
        forwarded,
        processed = stats.events_processed,
        headings = stats.headings_computed,
        degenerate = stats.degenerate_samples,
        rejected_locations = stats.rejected_locations,
        updates = stats.updates_emitted,
        "replay_finished"
    );
    Ok(())
}

fn printer(format: OutputFormat, csv_header: bool) -> Box<dyn FnMut(&EngineUpdate) + Send> {
    match format {
        OutputFormat::Text | OutputFormat::Compact => {
            let formatter = TextFormatter {
                compact: format == OutputFormat::Compact,
            };
            Box::new(move |update| println!("{}", formatter.format_text(update)))
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new();
            Box::new(move |update| match formatter.format_json(update) {
                Ok(line) => println!("{}", line),
                Err(e) => error!(error = %e, "update_serialization_failed"),
            })
        }
        OutputFormat::Csv => {
            let formatter = CsvFormatter { include_header: csv_header };
            if let Some(header) = formatter.preamble() {
                println!("{}", header);
            }
            Box::new(move |update| println!("{}", formatter.format_csv(update)))
        }
    }
}
