//! Run reporting: outcome model, summary, log blocks, and mismatch CSV
//!
//! Everything a run produced, folded into one serializable `RunReport`:
//! per-file conversion outcomes, per-link pairing/analysis outcomes, and
//! derived counters. The log rendering prints the summary before the
//! detail blocks so a long mismatch list never buries the totals. The
//! CSV export flattens the same outcomes into one row per issue.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::analysis::{fmt_compact, fmt_wavelengths};
use crate::loader::Exclusion;
use crate::types::{DiscrepancyKind, DiscrepancySeverity, FiberRecord, PairAnalysis, Side};

/// Presentation severity for log coloring and the CSV severity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ReportSeverity {
    Warning,
    Error,
}

impl std::fmt::Display for ReportSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportSeverity::Warning => write!(f, "WARNING"),
            ReportSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// What happened to one input file during conversion.
#[derive(Debug, Clone, Serialize)]
pub enum FileOutcome {
    /// Converted and entered into A/Z pairing.
    Converted { stem: String },
    /// Converted, but left out of the comparison.
    ConvertedUncompared { stem: String, reason: Exclusion },
    /// Nothing was written for this file.
    Failed { stem: String, error: String },
}

/// What happened to one fiber link (or would-be link).
#[derive(Debug, Clone, Serialize)]
pub enum LinkOutcome {
    /// Eligible pair, merged output written.
    Merged { analysis: PairAnalysis },
    /// Pair analyzed with discrepancies; sides remain individual files.
    Mismatched { analysis: PairAnalysis },
    /// Eligible pair whose merged document could not be built or written.
    MergeFailed { analysis: PairAnalysis, error: String },
    /// One side only; no counterpart record was found.
    MissingCounterpart { record: FiberRecord },
    /// The same side appeared more than once.
    AmbiguousInput {
        fiber_id: String,
        a_count: usize,
        z_count: usize,
        stems: Vec<String>,
    },
}

impl LinkOutcome {
    pub fn fiber_id(&self) -> &str {
        match self {
            LinkOutcome::Merged { analysis }
            | LinkOutcome::Mismatched { analysis }
            | LinkOutcome::MergeFailed { analysis, .. } => analysis.pair.fiber_id(),
            LinkOutcome::MissingCounterpart { record } => &record.fiber_id,
            LinkOutcome::AmbiguousInput { fiber_id, .. } => fiber_id,
        }
    }
}

/// Per-run counters, printed before the detail blocks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub files_total: usize,
    pub files_converted: usize,
    pub files_failed: usize,
    pub files_uncompared: usize,
    pub pairs_checked: usize,
    pub pairs_merged: usize,
    pub mismatched_pairs: usize,
    pub polarity_mismatches: usize,
    pub wavelength_mismatches: usize,
    pub length_missing: usize,
    pub length_mismatches: usize,
    pub missing_counterparts: usize,
    pub ambiguous_inputs: usize,
    pub merge_failures: usize,
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub files: Vec<FileOutcome>,
    pub links: Vec<LinkOutcome>,
    /// Threshold the analysis ran with, echoed into the CSV.
    pub length_threshold_m: f64,
}

impl RunReport {
    pub fn new(files: Vec<FileOutcome>, links: Vec<LinkOutcome>, length_threshold_m: f64) -> Self {
        let mut summary = RunSummary {
            files_total: files.len(),
            ..RunSummary::default()
        };

        for file in &files {
            match file {
                FileOutcome::Converted { .. } => summary.files_converted += 1,
                FileOutcome::ConvertedUncompared { .. } => {
                    summary.files_converted += 1;
                    summary.files_uncompared += 1;
                }
                FileOutcome::Failed { .. } => summary.files_failed += 1,
            }
        }

        for link in &links {
            match link {
                LinkOutcome::Merged { .. } => {
                    summary.pairs_checked += 1;
                    summary.pairs_merged += 1;
                }
                LinkOutcome::Mismatched { analysis } => {
                    summary.pairs_checked += 1;
                    summary.mismatched_pairs += 1;
                    for d in &analysis.discrepancies {
                        match (d.kind, d.severity) {
                            (DiscrepancyKind::Polarity, _) => summary.polarity_mismatches += 1,
                            (DiscrepancyKind::Wavelength, _) => summary.wavelength_mismatches += 1,
                            (DiscrepancyKind::Length, DiscrepancySeverity::MissingData) => {
                                summary.length_missing += 1;
                            }
                            (DiscrepancyKind::Length, DiscrepancySeverity::Mismatch) => {
                                summary.length_mismatches += 1;
                            }
                        }
                    }
                }
                LinkOutcome::MergeFailed { .. } => {
                    summary.pairs_checked += 1;
                    summary.merge_failures += 1;
                }
                LinkOutcome::MissingCounterpart { .. } => summary.missing_counterparts += 1,
                LinkOutcome::AmbiguousInput { .. } => summary.ambiguous_inputs += 1,
            }
        }

        RunReport {
            summary,
            files,
            links,
            length_threshold_m,
        }
    }
}

/// Severity of one link outcome, `None` for clean merges.
///
/// Polarity mismatches and pairing-integrity problems are errors; the
/// remaining comparison findings are warnings.
pub fn link_severity(link: &LinkOutcome) -> Option<ReportSeverity> {
    match link {
        LinkOutcome::Merged { .. } => None,
        LinkOutcome::Mismatched { analysis } => {
            let has_polarity = analysis
                .discrepancies
                .iter()
                .any(|d| d.kind == DiscrepancyKind::Polarity);
            Some(if has_polarity {
                ReportSeverity::Error
            } else {
                ReportSeverity::Warning
            })
        }
        LinkOutcome::MergeFailed { .. }
        | LinkOutcome::MissingCounterpart { .. }
        | LinkOutcome::AmbiguousInput { .. } => Some(ReportSeverity::Error),
    }
}

// ============================================================================
// Log Rendering
// ============================================================================

/// Emit the run summary, then one block per problem link.
pub fn log_report(report: &RunReport) {
    let s = &report.summary;

    info!("A/Z comparison summary");
    info!(
        "  Files converted: {}/{} ({} failed, {} not compared)",
        s.files_converted, s.files_total, s.files_failed, s.files_uncompared
    );
    info!("  Pairs checked: {}", s.pairs_checked);
    info!("  Pairs merged: {}", s.pairs_merged);
    info!("  Mismatched pairs: {}", s.mismatched_pairs);
    info!("    Polarity mismatches: {}", s.polarity_mismatches);
    info!("    Wavelength mismatches: {}", s.wavelength_mismatches);
    info!("    Length missing: {}", s.length_missing);
    info!("    Length mismatches: {}", s.length_mismatches);
    info!("  Missing counterparts: {}", s.missing_counterparts);
    info!("  Ambiguous inputs: {}", s.ambiguous_inputs);
    info!("  Merge failures: {}", s.merge_failures);

    for link in &report.links {
        if let Some(severity) = link_severity(link) {
            log_block(severity, link);
        }
    }
}

fn log_block(severity: ReportSeverity, link: &LinkOutcome) {
    let header = format!("{}: {}", severity, link.fiber_id());
    match severity {
        ReportSeverity::Error => {
            error!("{header}");
            for line in block_lines(link) {
                error!("  {line}");
            }
        }
        ReportSeverity::Warning => {
            warn!("{header}");
            for line in block_lines(link) {
                warn!("  {line}");
            }
        }
    }
}

/// Detail lines for one problem link, shared by the log renderer and by
/// assertions in tests.
pub fn block_lines(link: &LinkOutcome) -> Vec<String> {
    match link {
        LinkOutcome::Merged { .. } => Vec::new(),
        LinkOutcome::Mismatched { analysis } => {
            let mut lines = Vec::new();
            for d in &analysis.discrepancies {
                lines.push(d.detail.clone());
                if d.kind == DiscrepancyKind::Polarity {
                    let expected = analysis
                        .pair
                        .a
                        .expected_polarity
                        .as_deref()
                        .or(analysis.pair.z.expected_polarity.as_deref());
                    if let Some(expected) = expected {
                        lines.push(format!("expected polarity: {expected}"));
                    }
                }
            }
            lines
        }
        LinkOutcome::MergeFailed { error, .. } => vec![format!("merge failed: {error}")],
        LinkOutcome::MissingCounterpart { record } => vec![format!(
            "missing counterpart: only the {}-side record ({}) was found",
            record.side, record.source_stem
        )],
        LinkOutcome::AmbiguousInput {
            a_count,
            z_count,
            stems,
            ..
        } => vec![format!(
            "ambiguous input: {}x A-side, {}x Z-side ({})",
            a_count,
            z_count,
            stems.join(", ")
        )],
    }
}

// ============================================================================
// Mismatch CSV Export
// ============================================================================

/// Columns of the mismatch CSV, in order.
pub const CSV_FIELDS: [&str; 12] = [
    "pair_key",
    "severity",
    "issue_type",
    "expected_polarity",
    "a_polarity",
    "z_polarity",
    "a_wavelengths_nm",
    "z_wavelengths_nm",
    "a_length",
    "z_length",
    "length_delta",
    "length_threshold",
];

/// One mismatch CSV row. Cells default to empty; each issue type fills
/// only its own columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub pair_key: String,
    pub severity: String,
    pub issue_type: String,
    pub expected_polarity: String,
    pub a_polarity: String,
    pub z_polarity: String,
    pub a_wavelengths_nm: String,
    pub z_wavelengths_nm: String,
    pub a_length: String,
    pub z_length: String,
    pub length_delta: String,
    pub length_threshold: String,
}

impl CsvRow {
    fn to_line(&self) -> String {
        let cells = [
            &self.pair_key,
            &self.severity,
            &self.issue_type,
            &self.expected_polarity,
            &self.a_polarity,
            &self.z_polarity,
            &self.a_wavelengths_nm,
            &self.z_wavelengths_nm,
            &self.a_length,
            &self.z_length,
            &self.length_delta,
            &self.length_threshold,
        ];
        cells
            .iter()
            .map(|c| csv_escape(c))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(fmt_compact).unwrap_or_default()
}

/// Flatten the report into CSV rows: one row per issue, in link order.
pub fn csv_rows(report: &RunReport) -> Vec<CsvRow> {
    let threshold = fmt_compact(report.length_threshold_m);
    let mut rows = Vec::new();

    for link in &report.links {
        match link {
            LinkOutcome::Merged { .. } => {}
            LinkOutcome::Mismatched { analysis } => {
                rows.extend(mismatch_rows(analysis, &threshold));
            }
            LinkOutcome::MergeFailed { analysis, .. } => rows.push(CsvRow {
                pair_key: analysis.pair.fiber_id().to_string(),
                severity: ReportSeverity::Error.to_string(),
                issue_type: "MergeError".to_string(),
                length_threshold: threshold.clone(),
                ..CsvRow::default()
            }),
            LinkOutcome::MissingCounterpart { record } => {
                let mut row = CsvRow {
                    pair_key: record.fiber_id.clone(),
                    severity: ReportSeverity::Error.to_string(),
                    issue_type: "MissingCounterpart".to_string(),
                    expected_polarity: record.expected_polarity.clone().unwrap_or_default(),
                    length_threshold: threshold.clone(),
                    ..CsvRow::default()
                };
                match record.side {
                    Side::A => {
                        row.a_polarity = record.polarity.clone();
                        row.a_wavelengths_nm = fmt_wavelengths(&record.wavelengths_nm);
                        row.a_length = fmt_opt(record.length_m);
                    }
                    Side::Z => {
                        row.z_polarity = record.polarity.clone();
                        row.z_wavelengths_nm = fmt_wavelengths(&record.wavelengths_nm);
                        row.z_length = fmt_opt(record.length_m);
                    }
                }
                rows.push(row);
            }
            LinkOutcome::AmbiguousInput { fiber_id, .. } => rows.push(CsvRow {
                pair_key: fiber_id.clone(),
                severity: ReportSeverity::Error.to_string(),
                issue_type: "AmbiguousInput".to_string(),
                length_threshold: threshold.clone(),
                ..CsvRow::default()
            }),
        }
    }

    rows
}

fn mismatch_rows(analysis: &PairAnalysis, threshold: &str) -> Vec<CsvRow> {
    let pair = &analysis.pair;
    let expected = pair
        .a
        .expected_polarity
        .as_deref()
        .or(pair.z.expected_polarity.as_deref())
        .unwrap_or_default()
        .to_string();

    analysis
        .discrepancies
        .iter()
        .map(|d| {
            let mut row = CsvRow {
                pair_key: pair.fiber_id().to_string(),
                length_threshold: threshold.to_string(),
                ..CsvRow::default()
            };
            match (d.kind, d.severity) {
                (DiscrepancyKind::Polarity, _) => {
                    row.severity = ReportSeverity::Error.to_string();
                    row.issue_type = "Polarity".to_string();
                    row.expected_polarity = expected.clone();
                    row.a_polarity = pair.a.polarity.clone();
                    row.z_polarity = pair.z.polarity.clone();
                }
                (DiscrepancyKind::Wavelength, _) => {
                    row.severity = ReportSeverity::Warning.to_string();
                    row.issue_type = "Wavelengths".to_string();
                    row.a_wavelengths_nm = fmt_wavelengths(&pair.a.wavelengths_nm);
                    row.z_wavelengths_nm = fmt_wavelengths(&pair.z.wavelengths_nm);
                }
                (DiscrepancyKind::Length, DiscrepancySeverity::MissingData) => {
                    row.severity = ReportSeverity::Warning.to_string();
                    row.issue_type = "LengthMissing".to_string();
                    row.a_length = fmt_opt(pair.a.length_m);
                    row.z_length = fmt_opt(pair.z.length_m);
                }
                (DiscrepancyKind::Length, DiscrepancySeverity::Mismatch) => {
                    row.severity = ReportSeverity::Warning.to_string();
                    row.issue_type = "LengthMismatch".to_string();
                    row.a_length = fmt_opt(pair.a.length_m);
                    row.z_length = fmt_opt(pair.z.length_m);
                    if let (Some(a), Some(z)) = (pair.a.length_m, pair.z.length_m) {
                        row.length_delta = fmt_compact((a - z).abs());
                    }
                }
            }
            row
        })
        .collect()
}

/// Write the mismatch CSV. Returns the number of data rows written.
pub fn export_mismatch_csv(report: &RunReport, path: &Path) -> Result<usize, std::io::Error> {
    let rows = csv_rows(report);

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", CSV_FIELDS.join(","))?;
    for row in &rows {
        writeln!(writer, "{}", row.to_line())?;
    }
    writer.flush()?;

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_pair;
    use crate::opm::OpmDocument;
    use crate::types::FiberPair;

    fn make_record(
        side: Side,
        polarity: &str,
        wavelengths: &[f64],
        length: Option<f64>,
    ) -> FiberRecord {
        FiberRecord {
            fiber_id: "F001".to_string(),
            side,
            source_stem: format!("Link_{side}01_Test"),
            polarity: polarity.to_string(),
            expected_polarity: Some("Straight".to_string()),
            wavelengths_nm: wavelengths.to_vec(),
            length_m: length,
            payload: OpmDocument(serde_json::Map::new()),
        }
    }

    fn mismatched_link(a: FiberRecord, z: FiberRecord, threshold: f64) -> LinkOutcome {
        let analysis = analyze_pair(FiberPair { a, z }, threshold);
        assert!(!analysis.eligible);
        LinkOutcome::Mismatched { analysis }
    }

    #[test]
    fn summary_counts_add_up() {
        let merged = LinkOutcome::Merged {
            analysis: analyze_pair(
                FiberPair {
                    a: make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
                    z: make_record(Side::Z, "Straight", &[1310.0], Some(100.0)),
                },
                0.5,
            ),
        };
        let mismatched = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
            make_record(Side::Z, "Crossed", &[1550.0], None),
            0.5,
        );
        let missing = LinkOutcome::MissingCounterpart {
            record: make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
        };

        let report = RunReport::new(
            vec![
                FileOutcome::Converted {
                    stem: "a".to_string(),
                },
                FileOutcome::ConvertedUncompared {
                    stem: "b".to_string(),
                    reason: Exclusion::UnrecognizedStem,
                },
                FileOutcome::Failed {
                    stem: "c".to_string(),
                    error: "bad json".to_string(),
                },
            ],
            vec![merged, mismatched, missing],
            0.5,
        );

        let s = &report.summary;
        assert_eq!(s.files_total, 3);
        assert_eq!(s.files_converted, 2);
        assert_eq!(s.files_failed, 1);
        assert_eq!(s.files_uncompared, 1);
        assert_eq!(s.pairs_checked, 2);
        assert_eq!(s.pairs_merged, 1);
        assert_eq!(s.mismatched_pairs, 1);
        assert_eq!(s.polarity_mismatches, 1);
        assert_eq!(s.wavelength_mismatches, 1);
        assert_eq!(s.length_missing, 1);
        assert_eq!(s.length_mismatches, 0);
        assert_eq!(s.missing_counterparts, 1);
    }

    #[test]
    fn polarity_problem_is_an_error_block() {
        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
            make_record(Side::Z, "Crossed", &[1310.0], Some(100.0)),
            0.5,
        );
        assert_eq!(link_severity(&link), Some(ReportSeverity::Error));
    }

    #[test]
    fn wavelength_and_length_problems_are_warnings() {
        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
            make_record(Side::Z, "Straight", &[1550.0], None),
            0.5,
        );
        assert_eq!(link_severity(&link), Some(ReportSeverity::Warning));
    }

    #[test]
    fn merged_links_have_no_severity_and_no_rows() {
        let link = LinkOutcome::Merged {
            analysis: analyze_pair(
                FiberPair {
                    a: make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
                    z: make_record(Side::Z, "Straight", &[1310.0], Some(100.0)),
                },
                0.5,
            ),
        };
        assert_eq!(link_severity(&link), None);

        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        assert!(csv_rows(&report).is_empty());
    }

    #[test]
    fn csv_rows_fill_per_issue_columns() {
        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0, 1550.0], Some(100.0)),
            make_record(Side::Z, "Crossed", &[1310.0], Some(103.25)),
            0.5,
        );
        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        let rows = csv_rows(&report);

        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].issue_type, "Polarity");
        assert_eq!(rows[0].severity, "ERROR");
        assert_eq!(rows[0].expected_polarity, "Straight");
        assert_eq!(rows[0].a_polarity, "Straight");
        assert_eq!(rows[0].z_polarity, "Crossed");
        assert_eq!(rows[0].a_wavelengths_nm, "");

        assert_eq!(rows[1].issue_type, "Wavelengths");
        assert_eq!(rows[1].severity, "WARNING");
        assert_eq!(rows[1].a_wavelengths_nm, "1310;1550");
        assert_eq!(rows[1].z_wavelengths_nm, "1310");

        assert_eq!(rows[2].issue_type, "LengthMismatch");
        assert_eq!(rows[2].severity, "WARNING");
        assert_eq!(rows[2].a_length, "100");
        assert_eq!(rows[2].z_length, "103.25");
        assert_eq!(rows[2].length_delta, "3.25");
        assert_eq!(rows[2].length_threshold, "0.5");
    }

    #[test]
    fn missing_length_row_leaves_absent_cell_empty() {
        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(120.0)),
            make_record(Side::Z, "Straight", &[1310.0], None),
            0.5,
        );
        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        let rows = csv_rows(&report);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].issue_type, "LengthMissing");
        assert_eq!(rows[0].a_length, "120");
        assert_eq!(rows[0].z_length, "");
        assert_eq!(rows[0].length_delta, "");
    }

    #[test]
    fn missing_counterpart_row_fills_present_side_only() {
        let link = LinkOutcome::MissingCounterpart {
            record: make_record(Side::Z, "Straight", &[1310.0], Some(88.5)),
        };
        let report = RunReport::new(Vec::new(), vec![link], 0.25);
        let rows = csv_rows(&report);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].issue_type, "MissingCounterpart");
        assert_eq!(rows[0].severity, "ERROR");
        assert_eq!(rows[0].a_polarity, "");
        assert_eq!(rows[0].z_polarity, "Straight");
        assert_eq!(rows[0].z_wavelengths_nm, "1310");
        assert_eq!(rows[0].z_length, "88.5");
        assert_eq!(rows[0].length_threshold, "0.25");
    }

    #[test]
    fn ambiguous_input_yields_an_error_row_and_counter() {
        let link = LinkOutcome::AmbiguousInput {
            fiber_id: "F009".to_string(),
            a_count: 2,
            z_count: 1,
            stems: vec![
                "Link_A09_Test".to_string(),
                "Link_A09_Retest".to_string(),
                "Link_Z09_Test".to_string(),
            ],
        };
        assert_eq!(link_severity(&link), Some(ReportSeverity::Error));
        assert_eq!(
            block_lines(&link),
            vec!["ambiguous input: 2x A-side, 1x Z-side (Link_A09_Test, Link_A09_Retest, Link_Z09_Test)"]
        );

        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        assert_eq!(report.summary.ambiguous_inputs, 1);
        assert_eq!(report.summary.pairs_checked, 0);

        let rows = csv_rows(&report);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pair_key, "F009");
        assert_eq!(rows[0].severity, "ERROR");
        assert_eq!(rows[0].issue_type, "AmbiguousInput");
        assert_eq!(rows[0].length_threshold, "0.5");
        assert_eq!(rows[0].a_polarity, "");
        assert_eq!(rows[0].z_polarity, "");
    }

    #[test]
    fn merge_failure_yields_an_error_row_and_counter() {
        let analysis = analyze_pair(
            FiberPair {
                a: make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
                z: make_record(Side::Z, "Straight", &[1310.0], Some(100.0)),
            },
            0.5,
        );
        assert!(analysis.eligible);
        let link = LinkOutcome::MergeFailed {
            analysis,
            error: "Output file already exists: F001_MergeMF.opm".to_string(),
        };
        assert_eq!(link_severity(&link), Some(ReportSeverity::Error));
        assert_eq!(block_lines(&link).len(), 1);
        assert!(block_lines(&link)[0].starts_with("merge failed: "));

        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        assert_eq!(report.summary.merge_failures, 1);
        assert_eq!(report.summary.pairs_checked, 1);
        assert_eq!(report.summary.pairs_merged, 0);
        assert_eq!(report.summary.mismatched_pairs, 0);

        let rows = csv_rows(&report);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pair_key, "F001");
        assert_eq!(rows[0].severity, "ERROR");
        assert_eq!(rows[0].issue_type, "MergeError");
        assert_eq!(rows[0].length_threshold, "0.5");
    }

    #[test]
    fn csv_line_escapes_embedded_commas_and_quotes() {
        let row = CsvRow {
            pair_key: "F,001".to_string(),
            severity: "ERROR".to_string(),
            a_polarity: "Say \"what\"".to_string(),
            ..CsvRow::default()
        };
        let line = row.to_line();
        assert!(line.starts_with("\"F,001\",ERROR,"));
        assert!(line.contains("\"Say \"\"what\"\"\""));
    }

    #[test]
    fn exported_csv_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mismatches.csv");

        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
            make_record(Side::Z, "Crossed", &[1310.0], Some(100.0)),
            0.5,
        );
        let report = RunReport::new(Vec::new(), vec![link], 0.5);
        let written = export_mismatch_csv(&report, &path).unwrap();
        assert_eq!(written, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(CSV_FIELDS.join(",").as_str()));
        let row = lines.next().unwrap();
        assert!(row.starts_with("F001,ERROR,Polarity,Straight,Straight,Crossed"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn block_lines_carry_expected_polarity() {
        let link = mismatched_link(
            make_record(Side::A, "Straight", &[1310.0], Some(100.0)),
            make_record(Side::Z, "Crossed", &[1310.0], Some(100.0)),
            0.5,
        );
        let lines = block_lines(&link);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("polarity differs"));
        assert_eq!(lines[1], "expected polarity: Straight");
    }
}
