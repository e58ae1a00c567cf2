//! Table mapping contract for model record types.
//!
//! # Invariants
//! - `TABLE` and every field name refer to existing identifiers in the
//!   caller's schema; they are quoted, not validated.
//! - The created/updated/deleted markers hold ISO-8601 UTC timestamps.

use super::error::ModelResult;
use crate::db::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Maps one record type onto one table.
///
/// Only `TABLE` is required. Field getters return `None` when the table has
/// no such column.
pub trait ModelSchema: DeserializeOwned {
    const TABLE: &'static str;

    fn id_field() -> Option<&'static str> {
        Some("id")
    }

    fn created_field() -> Option<&'static str> {
        None
    }

    fn updated_field() -> Option<&'static str> {
        None
    }

    fn deleted_field() -> Option<&'static str> {
        None
    }

    /// Turns a raw row into `Self`.
    ///
    /// Override when columns need decoding that serde cannot infer, such as
    /// JSON stored as text or integer-encoded booleans.
    fn parse(row: Record) -> ModelResult<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(row))?)
    }
}

/// Serializes a typed (possibly partial) record into a `Record`.
///
/// Fields skipped by serde are absent from the result, which is how partial
/// updates are expressed.
pub fn into_record<S: Serialize + ?Sized>(value: &S) -> ModelResult<Record> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(record) => Ok(record),
        other => Err(super::ModelError::InvalidData(format!(
            "record must serialize to an object, got `{other}`"
        ))),
    }
}
