//! Result records returned by a search endpoint.
//!
//! The field schema of a record is not known statically, so a record is kept
//! as a plain JSON object. Equality is structural: two records are equal when
//! they carry the same keys with equal values.

use serde_json::{Map, Value};

/// One opaque result item.
pub type Record = Map<String, Value>;

/// Ordered result list, in the order the server returned it.
pub type ResultSet = Vec<Record>;

/// Field used for the search box text after a selection.
pub const DEFAULT_DISPLAY_FIELD: &str = "display_name";

/// Text to put in the search field when `record` is chosen.
///
/// Strings are returned verbatim, other values use their JSON rendering and a
/// missing or null field yields an empty string.
pub fn display_text(record: &Record, field: &str) -> String {
    match record.get(field) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Build a record from `(field, value)` pairs.
pub fn record_from<K, V, I>(fields: I) -> Record
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    fields
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
