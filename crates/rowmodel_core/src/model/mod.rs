//! Active-record style model layer.
//!
//! # Responsibility
//! - Describe per-table mappings (`ModelSchema`).
//! - Provide fetch/save/delete on top of any `Executor`.
//!
//! # Invariants
//! - Record values are always bound as parameters; only mapped identifiers
//!   are written into SQL text.
//! - Non-primitive values are stored as JSON text.

pub mod base;
pub mod error;
pub mod schema;
mod statement;

pub use base::{FetchOptions, Model, QueryOptions, SaveOptions};
pub use error::{ModelError, ModelResult};
pub use schema::{into_record, ModelSchema};
