//! Shared data structures for A/Z fiber link analysis
//!
//! Core model for the conversion pipeline:
//! - `FiberRecord`: one converted measurement, one side of one link
//! - `FiberPair` / `PairOutcome`: pairing engine results
//! - `Discrepancy` / `PairAnalysis`: consistency analysis results
//! - `MergedResult`: a combined multi-fiber document for one link

use serde::{Deserialize, Serialize};

use crate::opm::OpmDocument;

// ============================================================================
// Sides and Records
// ============================================================================

/// Which end of the fiber link a measurement was taken from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Side {
    A,
    Z,
}

impl Side {
    /// Parse the single-letter side token found in file stems.
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "A" => Some(Side::A),
            "Z" => Some(Side::Z),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::A => write!(f, "A"),
            Side::Z => write!(f, "Z"),
        }
    }
}

/// One measurement of one fiber, taken from one side.
///
/// Extracted from the mapped OPM document by the loader; immutable from
/// then on. The full document rides along in `payload` so merge and
/// output never have to re-read the input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiberRecord {
    /// Link identity shared by both ends: the file stem with the side
    /// letter removed, e.g. `Panel3_01_Rack2`.
    pub fiber_id: String,
    /// Which end this record was measured from.
    pub side: Side,
    /// Input file stem, kept for reporting and output naming.
    pub source_stem: String,
    /// Actual connector polarity reported by the instrument.
    pub polarity: String,
    /// Expected polarity configured for the test, when present.
    pub expected_polarity: Option<String>,
    /// Distinct nominal wavelengths in the result, sorted ascending (nm).
    pub wavelengths_nm: Vec<f64>,
    /// Fiber length in meters, when the document carries one.
    pub length_m: Option<f64>,
    /// The mapped OPM document this record was extracted from.
    pub payload: OpmDocument,
}

/// Exactly one A-side and one Z-side record for the same fiber id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiberPair {
    pub a: FiberRecord,
    pub z: FiberRecord,
}

impl FiberPair {
    pub fn fiber_id(&self) -> &str {
        &self.a.fiber_id
    }
}

/// Pairing engine classification of one fiber id's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PairOutcome {
    /// Both sides present exactly once.
    Paired(FiberPair),
    /// Only one record exists for this fiber id.
    UnmatchedSingleton(FiberRecord),
    /// The same side appears more than once. No pair is formed; which
    /// duplicate is authoritative cannot be decided from the data.
    AmbiguousDuplicate {
        fiber_id: String,
        a_count: usize,
        z_count: usize,
        /// The conflicting records, in input order.
        records: Vec<FiberRecord>,
    },
}

// ============================================================================
// Consistency Analysis
// ============================================================================

/// Comparison axis a discrepancy was found on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscrepancyKind {
    Polarity,
    Wavelength,
    Length,
}

impl std::fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscrepancyKind::Polarity => write!(f, "Polarity"),
            DiscrepancyKind::Wavelength => write!(f, "Wavelength"),
            DiscrepancyKind::Length => write!(f, "Length"),
        }
    }
}

/// How a comparison axis failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DiscrepancySeverity {
    /// Both sides reported a value and the values disagree.
    Mismatch,
    /// At least one side did not report the value at all.
    MissingData,
}

/// One detected inconsistency between the two ends of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub severity: DiscrepancySeverity,
    /// Human-readable description carrying both sides' values.
    pub detail: String,
}

/// Analyzer output for one pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairAnalysis {
    pub pair: FiberPair,
    /// In axis order: polarity, wavelength, length.
    pub discrepancies: Vec<Discrepancy>,
    /// True exactly when `discrepancies` is empty.
    pub eligible: bool,
}

// ============================================================================
// Merge Output
// ============================================================================

/// A merged multi-fiber result covering both ends of one link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedResult {
    pub fiber_id: String,
    pub document: OpmDocument,
}
