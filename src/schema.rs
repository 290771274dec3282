//! Structural JSON schema comparison
//!
//! Compares two JSON documents by shape rather than by value: which key
//! paths exist on one side only, and which shared paths carry different
//! value types. Used to vet a produced OPM document against a
//! known-working reference without caring about measurement values.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

/// JSON type name used in diff output. Integers and floats are reported
/// as distinct types; a field that flips between them is exactly the
/// kind of schema drift this comparison exists to catch.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "number"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Differences between two JSON object trees, as sorted `/`-joined paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SchemaDiff {
    /// Paths present in the reference but absent from the source.
    pub missing_in_source: BTreeSet<String>,
    /// Paths present in the source but absent from the reference.
    pub extra_in_source: BTreeSet<String>,
    /// Shared paths whose value types differ, as `path : src → ref`.
    pub type_mismatches: BTreeSet<String>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_in_source.is_empty()
            && self.extra_in_source.is_empty()
            && self.type_mismatches.is_empty()
    }
}

/// Compare two JSON objects structurally.
///
/// Recurses into objects present on both sides; arrays and scalars are
/// compared as leaf types only, so array element churn never floods the
/// diff.
pub fn diff_schemas(source: &Map<String, Value>, reference: &Map<String, Value>) -> SchemaDiff {
    let mut diff = SchemaDiff::default();
    walk(source, reference, "", &mut diff);
    diff
}

fn walk(source: &Map<String, Value>, reference: &Map<String, Value>, path: &str, diff: &mut SchemaDiff) {
    for key in reference.keys() {
        if !source.contains_key(key) {
            diff.missing_in_source.insert(format!("{path}/{key}"));
        }
    }
    for key in source.keys() {
        if !reference.contains_key(key) {
            diff.extra_in_source.insert(format!("{path}/{key}"));
        }
    }

    for (key, src_val) in source {
        if let Some(ref_val) = reference.get(key) {
            let current = format!("{path}/{key}");
            let src_type = type_name(src_val);
            let ref_type = type_name(ref_val);
            if src_type != ref_type {
                diff.type_mismatches
                    .insert(format!("{current} : {src_type} → {ref_type}"));
            } else if let (Value::Object(s), Value::Object(r)) = (src_val, ref_val) {
                walk(s, r, &current, diff);
            }
        }
    }
}
