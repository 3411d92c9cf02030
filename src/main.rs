//! CLI entry point for the deciles charts tool.
//!
//! Reads measure tables written by the measures framework, drops
//! zero-denominator rows, aggregates values into deciles per period, and
//! writes one Vega-Lite chart per table.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use deciles_charts::config::Config;
use deciles_charts::error::PipelineError;
use deciles_charts::{loader, pipeline};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "deciles_charts")]
#[command(about = "Build deciles charts from measure tables", long_about = None)]
struct Cli {
    /// Directory containing measure_<id>.csv files
    #[arg(
        long,
        value_name = "DIR",
        conflicts_with = "input_files",
        required_unless_present = "input_files"
    )]
    input_dir: Option<PathBuf>,

    /// Glob pattern for matching one or more input files
    #[arg(long, value_name = "PATTERN", required_unless_present = "input_dir")]
    input_files: Option<String>,

    /// Path to the output directory
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// JSON-encoded configuration
    #[arg(long, value_name = "JSON", default_value = "{}", value_parser = parse_config)]
    config: Config,
}

/// Rejects a bad configuration at argument-parse time, before any table is
/// touched.
fn parse_config(json: &str) -> Result<Config, PipelineError> {
    Config::from_json(json)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/deciles_charts.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("deciles_charts.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let paths = match (&cli.input_dir, &cli.input_files) {
        (Some(input_dir), _) => loader::discover_paths(input_dir)?,
        (None, Some(pattern)) => {
            let matched = glob::glob(pattern).context("invalid glob pattern")?;
            let mut matched = matched.collect::<Result<Vec<PathBuf>, _>>()?;
            matched.sort();
            loader::select_measure_paths(matched)
        }
        (None, None) => bail!("one of --input-dir or --input-files is required"),
    };
    info!(count = paths.len(), "Discovered measure files");

    std::fs::create_dir_all(&cli.output_dir).with_context(|| {
        format!(
            "failed to create output directory `{}`",
            cli.output_dir.display()
        )
    })?;

    let written = pipeline::run(&paths, &cli.output_dir, &cli.config)?;
    info!(written, output_dir = %cli.output_dir.display(), "Done");

    Ok(())
}
