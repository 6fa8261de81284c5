//! Location Blocks Replay CLI
//!
//! Replays a recorded trace of location service events through the
//! location-blocks adapter and reports:
//! - Every raw batch the service delivered
//! - The fixes that passed the accuracy and age filters
//! - Service errors and other delegate events
//! - Start/stop requests the adapter issued

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

mod config;
mod replay;
mod report;
mod trace;

use config::{AppConfig, OutputFormat};
use replay::ReplayOptions;

/// Location Blocks - Replay location service traces through the filter
#[derive(Parser, Debug)]
#[command(name = "location-blocks-cli")]
#[command(about = "Replay location service traces through the callback adapter", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the JSON Lines trace file
    #[arg(short, long, value_name = "FILE")]
    trace: PathBuf,

    /// Path to configuration file (replay.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Accuracy filter distance threshold in meters (overrides config)
    #[arg(long, value_name = "METERS")]
    accuracy_filter: Option<f64>,

    /// Maximum fix age in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    max_age: Option<f64>,

    /// Request a stop after this many delivered fixes (overrides config)
    #[arg(long, value_name = "COUNT")]
    stop_after: Option<usize>,

    /// Emit the report as JSON
    #[arg(long)]
    json: bool,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Location Blocks CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using location-blocks library v{}", location_blocks::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let policy = config.filters.to_policy();
    policy.validate().context("Invalid filter settings")?;

    let records = trace::load_trace(&args.trace)?;
    log::info!("Replaying {} event(s) from {:?}", records.len(), args.trace);

    let options = ReplayOptions {
        policy,
        stop_after: config.replay.stop_after,
    };
    let report = replay::run(&records, &options);

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?,
        ),
        None => Box::new(io::stdout()),
    };

    match config.output.format {
        OutputFormat::Txt => report::write_text(&report, out.as_mut())?,
        OutputFormat::Json => report::write_json(&report, out.as_mut())?,
    }
    out.flush()?;

    Ok(())
}

/// Command line values take precedence over the config file
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(meters) = args.accuracy_filter {
        config.filters.accuracy_m = Some(meters);
    }
    if let Some(seconds) = args.max_age {
        config.filters.max_age_s = Some(seconds);
    }
    if let Some(count) = args.stop_after {
        config.replay.stop_after = Some(count);
    }
    if args.json {
        config.output.format = OutputFormat::Json;
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
