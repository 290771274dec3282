//! A/Z consistency analysis and merge eligibility
//!
//! Compares the two ends of a pair along three independent axes:
//! polarity, wavelength, and length. All three checks always run, so one
//! bad axis never hides another. The analyzer is a pure function of the
//! pair and the length threshold; nothing here touches the filesystem,
//! configuration, or clock.

use crate::types::{
    Discrepancy, DiscrepancyKind, DiscrepancySeverity, FiberPair, PairAnalysis,
};

/// Compare the two ends of a pair. Discrepancies come back in axis
/// order: polarity, wavelength, length.
pub fn compare_sides(pair: &FiberPair, length_threshold_m: f64) -> Vec<Discrepancy> {
    let mut out = Vec::new();
    let a = &pair.a;
    let z = &pair.z;

    // Polarity tokens come from instrument firmware with inconsistent
    // casing; compare case-insensitively, never trust formatting.
    if !a.polarity.eq_ignore_ascii_case(&z.polarity) {
        out.push(Discrepancy {
            kind: DiscrepancyKind::Polarity,
            severity: DiscrepancySeverity::Mismatch,
            detail: format!("polarity differs: A={} Z={}", a.polarity, z.polarity),
        });
    }

    // Nominal wavelengths are discrete configured values, not drifting
    // measurements. Exact equality of the sorted sets, no tolerance.
    if a.wavelengths_nm != z.wavelengths_nm {
        out.push(Discrepancy {
            kind: DiscrepancyKind::Wavelength,
            severity: DiscrepancySeverity::Mismatch,
            detail: format!(
                "wavelengths differ: A=[{}] Z=[{}]",
                fmt_wavelengths(&a.wavelengths_nm),
                fmt_wavelengths(&z.wavelengths_nm)
            ),
        });
    }

    // Length: a missing value on either side is its own condition. The
    // delta check applies only when both values exist, and flags strictly
    // above the threshold; a delta equal to the threshold passes.
    match (a.length_m, z.length_m) {
        (Some(a_len), Some(z_len)) => {
            let delta = (a_len - z_len).abs();
            if delta > length_threshold_m {
                out.push(Discrepancy {
                    kind: DiscrepancyKind::Length,
                    severity: DiscrepancySeverity::Mismatch,
                    detail: format!(
                        "length delta {} exceeds threshold {}: A={} Z={}",
                        fmt_compact(delta),
                        fmt_compact(length_threshold_m),
                        fmt_compact(a_len),
                        fmt_compact(z_len)
                    ),
                });
            }
        }
        (a_len, z_len) => {
            out.push(Discrepancy {
                kind: DiscrepancyKind::Length,
                severity: DiscrepancySeverity::MissingData,
                detail: format!(
                    "length missing: A={} Z={}",
                    fmt_opt_length(a_len),
                    fmt_opt_length(z_len)
                ),
            });
        }
    }

    out
}

/// A pair merges exactly when the analyzer found nothing.
pub fn merge_eligible(discrepancies: &[Discrepancy]) -> bool {
    discrepancies.is_empty()
}

/// Run the full analysis for one pair.
pub fn analyze_pair(pair: FiberPair, length_threshold_m: f64) -> PairAnalysis {
    let discrepancies = compare_sides(&pair, length_threshold_m);
    let eligible = merge_eligible(&discrepancies);
    PairAnalysis {
        pair,
        discrepancies,
        eligible,
    }
}

/// Compact float formatting: at most three decimals, trailing zeros
/// trimmed. `120.400` → `120.4`, `1310.000` → `1310`.
pub fn fmt_compact(value: f64) -> String {
    let s = format!("{value:.3}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Wavelength list rendered for logs and CSV cells: `1310;1550`.
pub fn fmt_wavelengths(wavelengths_nm: &[f64]) -> String {
    wavelengths_nm
        .iter()
        .map(|&w| fmt_compact(w))
        .collect::<Vec<_>>()
        .join(";")
}

fn fmt_opt_length(value: Option<f64>) -> String {
    match value {
        Some(v) => fmt_compact(v),
        None => "(missing)".to_string(),
    }
}
