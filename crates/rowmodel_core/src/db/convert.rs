//! JSON <-> SQLite value conversion.
//!
//! # Invariants
//! - Primitive JSON values bind natively; objects and arrays bind as JSON text.
//! - Decoding never fails on content: non-finite reals decode to `null` and
//!   invalid UTF-8 text is replaced lossily.

use super::{Record, SqlValue};
use rusqlite::types::ValueRef;
use rusqlite::Row;
use serde_json::{Number, Value as JsonValue};

/// Converts one JSON value into a bind parameter.
pub fn json_to_sql(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        JsonValue::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => number.as_f64().map_or(SqlValue::Null, SqlValue::Real),
        },
        JsonValue::String(text) => SqlValue::Text(text.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Decodes the current row into a record keyed by `columns`.
pub fn row_to_record(row: &Row<'_>, columns: &[String]) -> rusqlite::Result<Record> {
    let mut record = Record::new();
    for (index, name) in columns.iter().enumerate() {
        let value = match row.get_ref(index)? {
            ValueRef::Null => JsonValue::Null,
            ValueRef::Integer(integer) => JsonValue::from(integer),
            ValueRef::Real(real) => Number::from_f64(real).map_or(JsonValue::Null, JsonValue::Number),
            ValueRef::Text(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => {
                JsonValue::Array(bytes.iter().map(|byte| JsonValue::from(*byte)).collect())
            }
        };
        record.insert(name.clone(), value);
    }
    Ok(record)
}
