//! Exchange → OPM document mapping and output writing
//!
//! Converts a test result exported in the Exchange JSON schema into the
//! OPM document consumed by downstream reporting tools. The `brief`
//! section of the Exchange export is authoritative: every OPM field is
//! copied verbatim from it, in a fixed order, with a single normalization
//! step applied to `Identification`. Nothing is regenerated or invented.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Top-level OPM fields, in the exact order consumers expect.
///
/// Order matters: some OPM importers reject documents whose keys appear
/// in a different sequence, so the writer emits exactly this list.
pub const OPM_FIELD_ORDER: [&str; 11] = [
    "JsonVersion",
    "TestDateTime",
    "MeasurementId",
    "MeasurementName",
    "Identification",
    "Identifiers",
    "Hardware",
    "Reporting",
    "Context",
    "Measurement",
    "GlobalVerdict",
];

/// Extension of every output file.
pub const OPM_EXTENSION: &str = "opm";

/// Suffix appended to the fiber id for merged multi-fiber outputs.
pub const MERGE_SUFFIX: &str = "_MergeMF";

/// Mapping and output errors, scoped to a single document.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Source JSON has no 'brief' section")]
    MissingBrief,

    #[error("Missing required field in brief: {0}")]
    MissingField(&'static str),

    #[error("Output file already exists: {0}")]
    OutputExists(PathBuf),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A mapped OPM document: the eleven canonical fields, in order.
///
/// Wraps a `serde_json` object map; the `preserve_order` feature keeps
/// insertion order intact through serialization.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct OpmDocument(pub Map<String, Value>);

impl OpmDocument {
    /// Look up a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Render as 2-space-indented JSON, byte-identical to the file writer.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_default()
    }
}

/// Map an Exchange export into an OPM document.
///
/// Every canonical field must be present in `brief`; a missing field is
/// an error for this document only, never a reason to halt a batch run.
pub fn map_exchange_to_opm(source: &Value) -> Result<OpmDocument, MapError> {
    let brief = source
        .get("brief")
        .and_then(Value::as_object)
        .ok_or(MapError::MissingBrief)?;

    let mut opm = Map::with_capacity(OPM_FIELD_ORDER.len());
    for &field in &OPM_FIELD_ORDER {
        let value = brief.get(field).ok_or(MapError::MissingField(field))?;
        let mapped = if field == "Identification" {
            normalize_identification(value)
        } else {
            value.clone()
        };
        opm.insert(field.to_string(), mapped);
    }

    Ok(OpmDocument(opm))
}

/// Normalize `Identification` to the shape of known-working OPM files.
///
/// Drops `Geolocation` / `GeolocationDetails` (present only in files the
/// downstream importer rejects), and maps the Exchange lowercase keys
/// `company` / `customer` to `CompanyName` / `CustomerName` unless the
/// schema-cased key already exists. Everything else passes through as-is.
fn normalize_identification(ident: &Value) -> Value {
    let mut d = ident.as_object().cloned().unwrap_or_default();

    d.remove("Geolocation");
    d.remove("GeolocationDetails");

    if !d.contains_key("CompanyName") {
        if let Some(company) = d.get("company").cloned() {
            d.insert("CompanyName".to_string(), company);
        }
    }
    if !d.contains_key("CustomerName") {
        if let Some(customer) = d.get("customer").cloned() {
            d.insert("CustomerName".to_string(), customer);
        }
    }
    d.remove("company");
    d.remove("customer");

    Value::Object(d)
}

/// Output path for the per-side conversion of one input: `<stem>.opm`.
pub fn side_output_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}.{OPM_EXTENSION}"))
}

/// Output path for a merged pair: `<fiber_id>_MergeMF.opm`.
pub fn merged_output_path(output_dir: &Path, fiber_id: &str) -> PathBuf {
    output_dir.join(format!("{fiber_id}{MERGE_SUFFIX}.{OPM_EXTENSION}"))
}

/// Write a document as 2-space-indented JSON.
///
/// Refuses to overwrite: an existing file at `path` is reported as an
/// error so a re-run can never clobber earlier results. The caller
/// decides whether anything beyond this one file is affected.
pub fn write_opm(document: &OpmDocument, path: &Path) -> Result<(), MapError> {
    if path.exists() {
        return Err(MapError::OutputExists(path.to_path_buf()));
    }

    let file = File::create(path).map_err(|e| MapError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &document.0).map_err(|e| MapError::Io {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    writer.flush().map_err(|e| MapError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_exchange(identification: Value) -> Value {
        json!({
            "brief": {
                "JsonVersion": "1.1",
                "TestDateTime": "2024-03-01T10:15:00+00:00",
                "MeasurementId": "b2f1",
                "MeasurementName": "Panel3_A01_Rack2",
                "Identification": identification,
                "Identifiers": {"CableId": "C-12"},
                "Hardware": {"Model": "FTB-2"},
                "Reporting": {},
                "Context": {},
                "Measurement": {"OpmResultData": {}},
                "GlobalVerdict": "Pass"
            },
            "detail": {"ignored": true}
        })
    }

    #[test]
    fn maps_all_fields_in_canonical_order() {
        let source = make_exchange(json!({}));
        let doc = map_exchange_to_opm(&source).unwrap();

        let keys: Vec<&str> = doc.0.keys().map(String::as_str).collect();
        assert_eq!(keys, OPM_FIELD_ORDER.to_vec());
        assert_eq!(doc.field("GlobalVerdict"), Some(&json!("Pass")));
    }

    #[test]
    fn field_order_is_fixed_regardless_of_source_order() {
        // Build a brief with fields deliberately out of order.
        let mut brief = Map::new();
        brief.insert("GlobalVerdict".into(), json!("Fail"));
        brief.insert("Measurement".into(), json!({}));
        brief.insert("Context".into(), json!({}));
        brief.insert("Reporting".into(), json!({}));
        brief.insert("Hardware".into(), json!({}));
        brief.insert("Identifiers".into(), json!({}));
        brief.insert("Identification".into(), json!({}));
        brief.insert("MeasurementName".into(), json!("n"));
        brief.insert("MeasurementId".into(), json!("i"));
        brief.insert("TestDateTime".into(), json!("t"));
        brief.insert("JsonVersion".into(), json!("1.1"));
        let mut source = Map::new();
        source.insert("brief".into(), Value::Object(brief));

        let doc = map_exchange_to_opm(&Value::Object(source)).unwrap();
        let keys: Vec<&str> = doc.0.keys().map(String::as_str).collect();
        assert_eq!(keys, OPM_FIELD_ORDER.to_vec());
    }

    #[test]
    fn missing_brief_is_an_error() {
        let source = json!({"detail": {}});
        let err = map_exchange_to_opm(&source).unwrap_err();
        assert!(matches!(err, MapError::MissingBrief));
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut source = make_exchange(json!({}));
        source["brief"]
            .as_object_mut()
            .unwrap()
            .remove("GlobalVerdict");

        let err = map_exchange_to_opm(&source).unwrap_err();
        match err {
            MapError::MissingField(name) => assert_eq!(name, "GlobalVerdict"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn identification_drops_geolocation_and_maps_lowercase_keys() {
        let source = make_exchange(json!({
            "company": "Acme Fiber",
            "customer": "Metro DC",
            "JobId": "J-77",
            "Geolocation": {"lat": 48.1, "lon": 11.5},
            "GeolocationDetails": {"accuracy_m": 4}
        }));

        let doc = map_exchange_to_opm(&source).unwrap();
        let ident = doc.field("Identification").unwrap().as_object().unwrap();

        assert!(!ident.contains_key("Geolocation"));
        assert!(!ident.contains_key("GeolocationDetails"));
        assert!(!ident.contains_key("company"));
        assert!(!ident.contains_key("customer"));
        assert_eq!(ident.get("CompanyName"), Some(&json!("Acme Fiber")));
        assert_eq!(ident.get("CustomerName"), Some(&json!("Metro DC")));
        assert_eq!(ident.get("JobId"), Some(&json!("J-77")));
    }

    #[test]
    fn identification_keeps_existing_schema_cased_keys() {
        let source = make_exchange(json!({
            "CompanyName": "Kept Co",
            "company": "Discarded Co"
        }));

        let doc = map_exchange_to_opm(&source).unwrap();
        let ident = doc.field("Identification").unwrap().as_object().unwrap();

        assert_eq!(ident.get("CompanyName"), Some(&json!("Kept Co")));
        assert!(!ident.contains_key("company"));
    }

    #[test]
    fn write_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let doc = map_exchange_to_opm(&make_exchange(json!({}))).unwrap();
        let path = side_output_path(dir.path(), "Panel3_A01_Rack2");

        write_opm(&doc, &path).unwrap();
        let err = write_opm(&doc, &path).unwrap_err();
        assert!(matches!(err, MapError::OutputExists(_)));

        // First write is intact.
        let on_disk: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["GlobalVerdict"], json!("Pass"));
    }

    #[test]
    fn written_file_matches_pretty_string() {
        let dir = tempfile::tempdir().unwrap();
        let doc = map_exchange_to_opm(&make_exchange(json!({"JobId": "J-1"}))).unwrap();
        let path = side_output_path(dir.path(), "out");

        write_opm(&doc, &path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.to_pretty_string());
    }

    #[test]
    fn merged_path_uses_suffix() {
        let path = merged_output_path(Path::new("/tmp/out"), "Panel3_01_Rack2");
        assert_eq!(
            path,
            PathBuf::from("/tmp/out/Panel3_01_Rack2_MergeMF.opm")
        );
    }
}
