//! Directory conversion driver
//!
//! Converts every `.json` file in the input directory to OPM, then runs
//! the A/Z pairing, consistency analysis, and merge pass over the records
//! that qualify. Reading and mapping fan out across a rayon pool; every
//! downstream step is sequential and ordered, so two runs over the same
//! inputs produce byte-identical outputs.
//!
//! Per-file and per-fiber problems land in the run report and never stop
//! the batch. Only whole-run conditions abort: an unreadable input
//! directory, no inputs at all, an unusable output directory, or a CSV
//! export failure.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::analysis::analyze_pair;
use crate::loader::{self, Exclusion};
use crate::merge;
use crate::opm::{self, MapError, OpmDocument};
use crate::pairing::pair_records;
use crate::report::{self, FileOutcome, LinkOutcome, RunReport};
use crate::types::{FiberRecord, PairAnalysis, PairOutcome};

/// Options for one conversion run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// A/Z length-delta threshold in meters.
    pub length_threshold_m: f64,
    /// Mismatch CSV output path, written when set.
    pub mismatch_csv: Option<PathBuf>,
}

/// Whole-run failures. Everything else is captured in the report.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to read input directory {path}: {source}")]
    ReadInputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .json input files found in {0}")]
    NoInputFiles(PathBuf),

    #[error("Failed to create output directory {path}: {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write mismatch CSV {path}: {source}")]
    CsvExport {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outcome of the parallel read+map phase for one input file.
struct MappedFile {
    stem: String,
    outcome: Result<Mapped, String>,
}

struct Mapped {
    document: OpmDocument,
    record: Result<FiberRecord, Exclusion>,
}

/// Convert a directory of Exchange JSON exports.
pub fn convert_directory(options: &RunOptions) -> Result<RunReport, RunError> {
    let inputs = list_input_files(&options.input_dir)?;
    if inputs.is_empty() {
        return Err(RunError::NoInputFiles(options.input_dir.clone()));
    }
    std::fs::create_dir_all(&options.output_dir).map_err(|e| RunError::CreateOutputDir {
        path: options.output_dir.clone(),
        source: e,
    })?;

    info!(
        "Converting {} file(s) from {} into {}",
        inputs.len(),
        options.input_dir.display(),
        options.output_dir.display()
    );

    // Read and map in parallel; collect keeps input order, so everything
    // after this point sees files in sorted-name order.
    let mapped: Vec<MappedFile> = inputs
        .par_iter()
        .map(|path| {
            let stem = file_stem(path);
            let outcome = load_and_map(path, &stem);
            MappedFile { stem, outcome }
        })
        .collect();

    let mut files: Vec<FileOutcome> = Vec::with_capacity(mapped.len());
    let mut records: Vec<FiberRecord> = Vec::new();

    for file in mapped {
        match file.outcome {
            Err(error) => {
                error!("✗ failed: {}: {error}", file.stem);
                files.push(FileOutcome::Failed {
                    stem: file.stem,
                    error,
                });
            }
            Ok(mapped_file) => {
                let out_path = opm::side_output_path(&options.output_dir, &file.stem);
                match opm::write_opm(&mapped_file.document, &out_path) {
                    Err(e) => {
                        let error = e.to_string();
                        error!("✗ failed: {}: {error}", file.stem);
                        if matches!(e, MapError::OutputExists(_)) {
                            warn!("  fix: use an empty output directory, remove the existing file, or rename the input");
                        }
                        files.push(FileOutcome::Failed {
                            stem: file.stem,
                            error,
                        });
                    }
                    Ok(()) => {
                        info!("✓ converted: {}", file.stem);
                        match mapped_file.record {
                            Ok(record) => {
                                records.push(record);
                                files.push(FileOutcome::Converted { stem: file.stem });
                            }
                            Err(reason) => {
                                info!("  not compared: {} ({reason})", file.stem);
                                files.push(FileOutcome::ConvertedUncompared {
                                    stem: file.stem,
                                    reason,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    debug!(
        "{} of {} file(s) entered A/Z pairing",
        records.len(),
        files.len()
    );

    let mut links: Vec<LinkOutcome> = Vec::new();
    for outcome in pair_records(records) {
        match outcome {
            PairOutcome::Paired(pair) => {
                let analysis = analyze_pair(pair, options.length_threshold_m);
                if analysis.eligible {
                    links.push(merge_and_write(analysis, &options.output_dir));
                } else {
                    links.push(LinkOutcome::Mismatched { analysis });
                }
            }
            PairOutcome::UnmatchedSingleton(record) => {
                links.push(LinkOutcome::MissingCounterpart { record });
            }
            PairOutcome::AmbiguousDuplicate {
                fiber_id,
                a_count,
                z_count,
                records,
            } => {
                links.push(LinkOutcome::AmbiguousInput {
                    fiber_id,
                    a_count,
                    z_count,
                    stems: records.into_iter().map(|r| r.source_stem).collect(),
                });
            }
        }
    }

    let report = RunReport::new(files, links, options.length_threshold_m);
    report::log_report(&report);

    if let Some(csv_path) = &options.mismatch_csv {
        let rows = report::export_mismatch_csv(&report, csv_path).map_err(|e| {
            RunError::CsvExport {
                path: csv_path.clone(),
                source: e,
            }
        })?;
        info!("Mismatch CSV written: {} ({rows} row(s))", csv_path.display());
    }

    Ok(report)
}

fn load_and_map(path: &Path, stem: &str) -> Result<Mapped, String> {
    let source = loader::load_json(path).map_err(|e| e.to_string())?;
    let document = opm::map_exchange_to_opm(&source).map_err(|e| e.to_string())?;
    let record = loader::extract_record(stem, &document);
    Ok(Mapped { document, record })
}

/// Build and write the merged record for an eligible pair. Failures stay
/// scoped to this pair.
fn merge_and_write(analysis: PairAnalysis, output_dir: &Path) -> LinkOutcome {
    match merge::build_merged(&analysis) {
        Err(e) => LinkOutcome::MergeFailed {
            analysis,
            error: e.to_string(),
        },
        Ok(merged) => {
            let path = opm::merged_output_path(output_dir, &merged.fiber_id);
            match opm::write_opm(&merged.document, &path) {
                Ok(()) => {
                    info!("✓ merged: {}", merged.fiber_id);
                    LinkOutcome::Merged { analysis }
                }
                Err(e) => LinkOutcome::MergeFailed {
                    analysis,
                    error: e.to_string(),
                },
            }
        }
    }
}

/// `.json` files in the input directory, sorted by file name so runs are
/// reproducible regardless of directory iteration order.
fn list_input_files(dir: &Path) -> Result<Vec<PathBuf>, RunError> {
    let entries = std::fs::read_dir(dir).map_err(|e| RunError::ReadInputDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RunError::ReadInputDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json && path.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string()
}
