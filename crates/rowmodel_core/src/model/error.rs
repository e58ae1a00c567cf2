//! Model-level error type.

use crate::db::{DbError, Record};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised by `Model` operations.
#[derive(Debug)]
pub enum ModelError {
    /// The record carries no keys besides the id.
    NothingToSave,
    /// The mapping declares no id field, so rows cannot be addressed.
    MissingIdField,
    /// `soft_delete` was called on a mapping without a deleted marker.
    MissingDeletedField,
    /// `fetch` was called with an empty filter.
    NoFilters,
    /// No row matched; carries the id from the filter when the mapping has one.
    NotFound { params: Option<Record> },
    /// A save requested the new row back but nothing could be read.
    SaveFailed,
    InvalidData(String),
    Db(DbError),
}

impl ModelError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NothingToSave => "NOTHING_TO_SAVE",
            Self::MissingIdField => "MISSING_ID_FIELD",
            Self::MissingDeletedField => "MISSING_DELETED_FIELD",
            Self::NoFilters => "NO_FILTERS",
            Self::NotFound { .. } => "RECORD_NOT_FOUND",
            Self::SaveFailed => "FAILED_TO_SAVE",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::Db(_) => "DB_ERROR",
        }
    }

    /// HTTP status a service layer should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NothingToSave | Self::NoFilters => 400,
            Self::NotFound { .. } => 404,
            Self::MissingIdField
            | Self::MissingDeletedField
            | Self::SaveFailed
            | Self::InvalidData(_)
            | Self::Db(_) => 500,
        }
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingToSave => write!(f, "record has nothing to save"),
            Self::MissingIdField => write!(f, "model has no id field"),
            Self::MissingDeletedField => write!(f, "model has no deleted field"),
            Self::NoFilters => write!(f, "no filters supplied to fetch"),
            Self::NotFound { params: None } => write!(f, "record not found"),
            Self::NotFound {
                params: Some(params),
            } => write!(f, "record not found: {}", serde_json::Value::Object(params.clone())),
            Self::SaveFailed => write!(f, "failed to save record"),
            Self::InvalidData(message) => write!(f, "invalid row data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ModelError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ModelError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidData(value.to_string())
    }
}
