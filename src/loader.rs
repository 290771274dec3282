//! Input loading and fiber record extraction
//!
//! Reads one Exchange JSON document per input file and extracts the
//! comparison fields (pair identity, side, polarity, wavelengths, length)
//! from the mapped OPM document. Files whose stems do not follow the A/Z
//! naming scheme, or whose documents lack the required comparison fields,
//! are still converted individually but never enter the pairing engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::opm::OpmDocument;
use crate::types::{FiberRecord, Side};

/// Key names walked inside the mapped OPM document.
pub mod opm_paths {
    pub const MEASUREMENT: &str = "Measurement";
    pub const RESULT_DATA: &str = "OpmResultData";
    pub const CONNECTORS: &str = "Connectors";
    pub const ACTUAL_CONNECTORS: &str = "ActualConnectors";
    pub const EXPECTED_CONNECTORS: &str = "ExpectedConnectors";
    pub const POLARITY_TYPE: &str = "PolarityType";
    pub const MEASUREMENTS: &str = "Measurements";
    pub const WAVELENGTH: &str = "Wavelength";
    pub const NOMINAL: &str = "Nominal";
    pub const FIBER_LENGTH: &str = "FiberLength";
    pub const LENGTH_IN_METERS: &str = "LengthInMeters";
    pub const LENGTH_INFO: &str = "LengthInfo";
    pub const LENGTH: &str = "Length";
}

/// Errors reading one input file. Always scoped to that file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a converted file was left out of the A/Z comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Exclusion {
    /// Stem does not follow the `<prefix>_<A|Z><NN>_<rest>` scheme.
    UnrecognizedStem,
    /// No actual connector polarity in the document.
    MissingPolarity,
    /// No nominal wavelength in the document.
    MissingWavelength,
}

impl std::fmt::Display for Exclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Exclusion::UnrecognizedStem => {
                write!(f, "file name does not follow the A/Z naming scheme")
            }
            Exclusion::MissingPolarity => write!(f, "no actual polarity in result"),
            Exclusion::MissingWavelength => write!(f, "no nominal wavelength in result"),
        }
    }
}

/// Load one Exchange JSON document from disk.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    let contents = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| LoadError::Json {
        path: path.to_path_buf(),
        source: e,
    })
}

// Stems like `Panel3_A01_Rack2` carry the side letter and a two-digit
// fiber number. The pair key keeps everything except the side letter, so
// both ends of the same fiber collapse onto one key.
fn stem_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<prefix>.+)_(?P<side>[AZ])(?P<fiber>\d{2})_(?P<rest>.+)$")
            .expect("stem regex is valid")
    })
}

/// Split a file stem into `(pair_key, side)`.
///
/// Returns `None` when the stem does not follow the A/Z naming scheme;
/// such files are converted but cannot be paired.
pub fn extract_pair_key(stem: &str) -> Option<(String, Side)> {
    let caps = stem_regex().captures(stem)?;
    let side = Side::from_letter(&caps["side"])?;
    let key = format!("{}_{}_{}", &caps["prefix"], &caps["fiber"], &caps["rest"]);
    Some((key, side))
}

fn result_data(doc: &OpmDocument) -> Option<&Value> {
    doc.field(opm_paths::MEASUREMENT)?.get(opm_paths::RESULT_DATA)
}

fn connector_polarity(doc: &OpmDocument, connectors_key: &str) -> Option<String> {
    result_data(doc)?
        .get(opm_paths::CONNECTORS)?
        .get(connectors_key)?
        .get(opm_paths::POLARITY_TYPE)?
        .as_str()
        .map(str::to_string)
}

/// Actual connector polarity reported by the instrument.
pub fn actual_polarity(doc: &OpmDocument) -> Option<String> {
    connector_polarity(doc, opm_paths::ACTUAL_CONNECTORS)
}

/// Expected connector polarity configured for the test.
pub fn expected_polarity(doc: &OpmDocument) -> Option<String> {
    connector_polarity(doc, opm_paths::EXPECTED_CONNECTORS)
}

// Instruments disagree on whether numeric fields arrive as JSON numbers
// or as strings; accept both, reject everything non-finite.
fn numeric(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Distinct nominal wavelengths across all measurements, sorted ascending.
pub fn wavelengths_nm(doc: &OpmDocument) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    let measurements = result_data(doc)
        .and_then(|d| d.get(opm_paths::MEASUREMENTS))
        .and_then(Value::as_array);

    if let Some(measurements) = measurements {
        for entry in measurements {
            let nominal = entry
                .get(opm_paths::WAVELENGTH)
                .and_then(|w| w.get(opm_paths::NOMINAL))
                .and_then(numeric);
            if let Some(nm) = nominal {
                if !out.iter().any(|&w| w == nm) {
                    out.push(nm);
                }
            }
        }
    }

    out.sort_by(f64::total_cmp);
    out
}

/// Fiber length in meters, from the first `Measurements[]` entry that
/// carries a `FiberLength` object. `LengthInMeters` wins over
/// `LengthInfo.Length`. Values are taken raw, without unit conversion.
pub fn fiber_length_m(doc: &OpmDocument) -> Option<f64> {
    let measurements = result_data(doc)?
        .get(opm_paths::MEASUREMENTS)?
        .as_array()?;

    for entry in measurements {
        let fl = match entry.get(opm_paths::FIBER_LENGTH) {
            Some(Value::Object(fl)) => fl,
            _ => continue,
        };
        // First FiberLength entry decides, even when its value is unusable.
        let raw = if let Some(v) = fl.get(opm_paths::LENGTH_IN_METERS) {
            Some(v)
        } else {
            fl.get(opm_paths::LENGTH_INFO)
                .and_then(|info| info.get(opm_paths::LENGTH))
        };
        return raw.and_then(numeric);
    }

    None
}

/// Build the comparison record for a converted file.
///
/// Returns the exclusion reason when the file cannot participate in
/// pairing; its per-side OPM output is unaffected either way.
pub fn extract_record(stem: &str, payload: &OpmDocument) -> Result<FiberRecord, Exclusion> {
    let (fiber_id, side) = extract_pair_key(stem).ok_or(Exclusion::UnrecognizedStem)?;
    let polarity = actual_polarity(payload).ok_or(Exclusion::MissingPolarity)?;
    let wavelengths = wavelengths_nm(payload);
    if wavelengths.is_empty() {
        return Err(Exclusion::MissingWavelength);
    }

    Ok(FiberRecord {
        fiber_id,
        side,
        source_stem: stem.to_string(),
        polarity,
        expected_polarity: expected_polarity(payload),
        wavelengths_nm: wavelengths,
        length_m: fiber_length_m(payload),
        payload: payload.clone(),
    })
}
