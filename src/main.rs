//! JSON2OPM - Exchange JSON to OPM Converter
//!
//! Batch converter for fiber-optic test results: maps Exchange JSON
//! exports to OPM documents, pairs A/Z end measurements per fiber link,
//! flags inconsistent pairs, and merges consistent ones into multi-fiber
//! results.
//!
//! # Usage
//!
//! ```bash
//! # Convert a folder of Exchange JSON exports
//! json2opm --input input_json --output output_opm
//!
//! # Override the A/Z length threshold and export the mismatch CSV
//! json2opm --input input_json --output output_opm \
//!     --length-threshold-m 0.5 --mismatch-csv az_mismatches.csv
//!
//! # Structurally compare a produced document against a known-good one
//! json2opm diff --source output_opm/Panel3_A01_Rack2.opm --reference good.opm
//! ```
//!
//! # Environment Variables
//!
//! - `JSON2OPM_CONFIG`: Path to a TOML config file (see json2opm.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use json2opm::analysis::fmt_compact;
use json2opm::config::ConvertConfig;
use json2opm::pipeline::{convert_directory, RunOptions};
use json2opm::schema;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "json2opm")]
#[command(about = "Exchange JSON to OPM converter with A/Z fiber link analysis")]
#[command(version)]
struct CliArgs {
    /// Directory containing Exchange .json exports
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory to write .opm results into (created if missing)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// A/Z length-delta threshold in meters (overrides the config file)
    #[arg(long, value_name = "METERS")]
    length_threshold_m: Option<f64>,

    /// Write a mismatch CSV to this path after the run
    #[arg(long, value_name = "FILE")]
    mismatch_csv: Option<PathBuf>,

    /// Path to a TOML config file
    /// (default search: $JSON2OPM_CONFIG, then ./json2opm.toml, then built-ins)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Compare the structure of a produced OPM document against a reference
    Diff {
        /// Document under test
        #[arg(long)]
        source: PathBuf,

        /// Known-working reference document
        #[arg(long)]
        reference: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Subcommand dispatch
    if let Some(SubCommand::Diff { source, reference }) = &args.command {
        return run_diff(source, reference);
    }

    let (input, output) = match (&args.input, &args.output) {
        (Some(input), Some(output)) => (input.clone(), output.clone()),
        _ => bail!("both --input and --output are required (or use the `diff` subcommand)"),
    };

    // Load configuration
    let config = match &args.config {
        Some(path) => ConvertConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConvertConfig::load(),
    };

    let mut length_threshold_m = config.compare.length_delta_threshold_m;
    if let Some(threshold) = args.length_threshold_m {
        ensure!(
            threshold.is_finite() && threshold >= 0.0,
            "--length-threshold-m must be a non-negative number, got {threshold}"
        );
        length_threshold_m = threshold;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  JSON2OPM - Exchange to OPM Converter");
    info!("  Input:  {}", input.display());
    info!("  Output: {}", output.display());
    info!("  A/Z length threshold: {} m", fmt_compact(length_threshold_m));
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let report = convert_directory(&RunOptions {
        input_dir: input,
        output_dir: output,
        length_threshold_m,
        mismatch_csv: args.mismatch_csv.clone(),
    })?;

    if report.summary.files_failed > 0 {
        error!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        error!(
            "  {} of {} file(s) failed to convert",
            report.summary.files_failed, report.summary.files_total
        );
        error!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        std::process::exit(1);
    }

    Ok(())
}

// ============================================================================
// Diff Subcommand
// ============================================================================

fn run_diff(source: &Path, reference: &Path) -> Result<()> {
    let source_doc = load_object(source)?;
    let reference_doc = load_object(reference)?;

    let diff = schema::diff_schemas(&source_doc, &reference_doc);
    if diff.is_empty() {
        info!("No structural differences");
        return Ok(());
    }

    for path in &diff.missing_in_source {
        warn!("missing in source: {path}");
    }
    for path in &diff.extra_in_source {
        warn!("extra in source: {path}");
    }
    for path in &diff.type_mismatches {
        warn!("type mismatch: {path}");
    }
    info!(
        "{} missing, {} extra, {} type mismatch(es)",
        diff.missing_in_source.len(),
        diff.extra_in_source.len(),
        diff.type_mismatches.len()
    );
    std::process::exit(1);
}

fn load_object(path: &Path) -> Result<serde_json::Map<String, serde_json::Value>> {
    let doc = json2opm::loader::load_json(path)
        .with_context(|| format!("loading {}", path.display()))?;
    match doc {
        serde_json::Value::Object(map) => Ok(map),
        other => bail!(
            "{} is not a JSON object (found {})",
            path.display(),
            schema::type_name(&other)
        ),
    }
}
