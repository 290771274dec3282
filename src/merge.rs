//! Multi-fiber merge builder
//!
//! Combines the two ends of an eligible pair into one multi-fiber OPM
//! document. The merged record stands alone: fiber identity, the shared
//! polarity and wavelength set, both sides' lengths, and both sides' full
//! measurement payloads, so nobody has to dig out the per-side files.

use chrono::DateTime;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::opm::{OpmDocument, MERGE_SUFFIX, OPM_FIELD_ORDER};
use crate::schema::type_name;
use crate::types::{FiberPair, FiberRecord, MergedResult, PairAnalysis, Side};

/// Merge failures. Always scoped to one pair; the run carries on.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Fiber {fiber_id}: {side}-side payload cannot merge: {reason}")]
    IncompatiblePayload {
        fiber_id: String,
        side: Side,
        reason: String,
    },
}

/// Build the merged multi-fiber record for an eligible pair.
///
/// # Panics
///
/// Panics when the analysis is not merge-eligible. Callers gate on
/// `PairAnalysis::eligible`; reaching this function with discrepancies
/// present is a bug in the caller, not a data condition.
pub fn build_merged(analysis: &PairAnalysis) -> Result<MergedResult, MergeError> {
    assert!(
        analysis.eligible,
        "merge builder invoked on ineligible pair {}",
        analysis.pair.fiber_id()
    );

    let pair = &analysis.pair;
    let fiber_id = pair.fiber_id().to_string();

    let a_measurement = side_measurement(&pair.a, &fiber_id)?;
    let z_measurement = side_measurement(&pair.z, &fiber_id)?;

    let mut document = Map::with_capacity(OPM_FIELD_ORDER.len());
    for &field in &OPM_FIELD_ORDER {
        let value = match field {
            "MeasurementName" => Value::String(format!("{fiber_id}{MERGE_SUFFIX}")),
            "TestDateTime" => merged_test_datetime(pair),
            "Measurement" => multi_fiber_measurement(pair, &fiber_id, a_measurement, z_measurement),
            _ => pair.a.payload.field(field).cloned().unwrap_or(Value::Null),
        };
        document.insert(field.to_string(), value);
    }

    Ok(MergedResult {
        fiber_id,
        document: OpmDocument(document),
    })
}

/// A side's `Measurement` payload, which must be a JSON object to embed
/// in the merged record.
fn side_measurement<'a>(
    record: &'a FiberRecord,
    fiber_id: &str,
) -> Result<&'a Map<String, Value>, MergeError> {
    match record.payload.field("Measurement") {
        Some(Value::Object(m)) => Ok(m),
        other => Err(MergeError::IncompatiblePayload {
            fiber_id: fiber_id.to_string(),
            side: record.side,
            reason: format!(
                "Measurement is {}, expected an object",
                other.map_or("absent", type_name)
            ),
        }),
    }
}

/// The merged record carries the later of the two sides' timestamps, so
/// it reflects when the link was last measured. When either side's value
/// does not parse as RFC 3339, the A side's value passes through verbatim.
fn merged_test_datetime(pair: &FiberPair) -> Value {
    let a = pair.a.payload.field("TestDateTime");
    let z = pair.z.payload.field("TestDateTime");

    let parse = |v: Option<&Value>| {
        v.and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    };

    match (parse(a), parse(z)) {
        (Some(ta), Some(tz)) if tz > ta => z.cloned().unwrap_or(Value::Null),
        _ => a.cloned().unwrap_or(Value::Null),
    }
}

fn multi_fiber_measurement(
    pair: &FiberPair,
    fiber_id: &str,
    a_measurement: &Map<String, Value>,
    z_measurement: &Map<String, Value>,
) -> Value {
    let result_entry = |record: &FiberRecord, measurement: &Map<String, Value>| {
        json!({
            "Side": record.side.to_string(),
            "SourceMeasurementName": record.payload.field("MeasurementName").cloned().unwrap_or(Value::Null),
            "GlobalVerdict": record.payload.field("GlobalVerdict").cloned().unwrap_or(Value::Null),
            "Measurement": Value::Object(measurement.clone()),
        })
    };

    json!({
        "MultiFiberResultData": {
            "FiberId": fiber_id,
            "PolarityType": pair.a.polarity,
            "WavelengthsNm": pair.a.wavelengths_nm,
            "FiberLengthM": {
                "SideA": pair.a.length_m,
                "SideZ": pair.z.length_m,
            },
            "Results": [
                result_entry(&pair.a, a_measurement),
                result_entry(&pair.z, z_measurement),
            ],
        }
    })
}
