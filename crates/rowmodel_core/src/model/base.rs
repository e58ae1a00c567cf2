//! Generic active-record operations over one mapped table.
//!
//! # Responsibility
//! - Decide insert vs update from the id field and row existence.
//! - Stamp created/updated/deleted markers with the current UTC time.
//! - Build filters, run them through the caller's executor or the shared
//!   `Db`, and parse rows through `ModelSchema::parse`.
//!
//! # Invariants
//! - A record is never saved without at least one non-id key.
//! - Stamping only fills markers whose current value is missing or falsy.
//! - Every statement of one call goes through the same executor.

use super::error::{ModelError, ModelResult};
use super::schema::ModelSchema;
use super::statement;
use crate::db::{Db, Executor, Record};
use chrono::{SecondsFormat, Utc};
use log::{debug, info};
use serde_json::Value as JsonValue;
use std::marker::PhantomData;
use std::time::Instant;

/// Executor routing shared by every operation without extra flags.
#[derive(Clone, Copy, Default)]
pub struct QueryOptions<'q> {
    /// Executor to use instead of the model's `Db`, typically a `TxQuery`.
    pub query: Option<&'q dyn Executor>,
}

/// Options accepted by read operations.
pub type FetchOptions<'q> = QueryOptions<'q>;

impl<'q> QueryOptions<'q> {
    pub fn with_query(query: &'q dyn Executor) -> Self {
        Self { query: Some(query) }
    }
}

/// Options accepted by `Model::save`.
#[derive(Clone, Copy, Default)]
pub struct SaveOptions<'q> {
    /// Read the saved row back and return it.
    pub return_new: bool,
    pub query: Option<&'q dyn Executor>,
}

impl<'q> SaveOptions<'q> {
    pub fn with_query(query: &'q dyn Executor) -> Self {
        Self {
            return_new: false,
            query: Some(query),
        }
    }

    pub fn returning_new(self) -> Self {
        Self {
            return_new: true,
            ..self
        }
    }
}

/// Table-bound CRUD helper for records of type `T`.
pub struct Model<'db, T> {
    db: &'db Db,
    _record: PhantomData<fn() -> T>,
}

impl<'db, T: ModelSchema> Model<'db, T> {
    pub fn new(db: &'db Db) -> Self {
        Self {
            db,
            _record: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        T::TABLE
    }

    /// Returns the first row matching every key of `filter`.
    ///
    /// # Errors
    /// - `ModelError::NoFilters` when `filter` is empty.
    pub fn fetch(&self, filter: &Record, opts: FetchOptions<'_>) -> ModelResult<Option<T>> {
        let rows = self.select_rows(filter, Some(1), opts.query)?;
        rows.into_iter().next().map(T::parse).transpose()
    }

    /// Returns every row matching `filter`, in storage order.
    pub fn fetch_all(&self, filter: &Record, opts: FetchOptions<'_>) -> ModelResult<Vec<T>> {
        let rows = self.select_rows(filter, None, opts.query)?;
        rows.into_iter().map(T::parse).collect()
    }

    /// Like `fetch`, but a missing row is an error.
    ///
    /// # Errors
    /// - `ModelError::NotFound` carrying `{id_field: filter[id_field]}` when
    ///   the mapping has an id field.
    pub fn fetch_or_throw(&self, filter: &Record, opts: FetchOptions<'_>) -> ModelResult<T> {
        if let Some(found) = self.fetch(filter, opts)? {
            return Ok(found);
        }

        let params = T::id_field().map(|id_field| {
            let mut params = Record::new();
            if let Some(id) = filter.get(id_field) {
                params.insert(id_field.to_string(), id.clone());
            }
            params
        });
        Err(ModelError::NotFound { params })
    }

    /// Inserts or updates `record`.
    ///
    /// A record whose id key is present and matches an existing row is
    /// updated; anything else is inserted and the generated id is read back
    /// with `RETURNING`. Returns the stored row when `opts.return_new` is set.
    ///
    /// # Errors
    /// - `ModelError::NothingToSave` when the record has no non-id keys.
    /// - `ModelError::MissingIdField` when the mapping has no id field.
    pub fn save(&self, mut record: Record, opts: SaveOptions<'_>) -> ModelResult<Option<T>> {
        let started_at = Instant::now();
        let executor = self.executor(opts.query);
        let id_field = T::id_field();

        let mut keys: Vec<String> = record.keys().cloned().collect();
        let mut keys_without_id: Vec<String> = keys
            .iter()
            .filter(|key| Some(key.as_str()) != id_field)
            .cloned()
            .collect();

        if keys_without_id.is_empty() {
            return Err(ModelError::NothingToSave);
        }
        let Some(id_field) = id_field else {
            return Err(ModelError::MissingIdField);
        };

        let mut id = record.get(id_field).cloned();
        let exists = match &id {
            Some(value) => !self
                .select_rows(&single_filter(id_field, value.clone()), Some(1), opts.query)?
                .is_empty(),
            None => false,
        };

        if exists {
            if let Some(updated_field) = T::updated_field() {
                stamp_if_falsy(&mut record, &mut keys_without_id, updated_field);
            }
            let id_value = id.clone().unwrap_or(JsonValue::Null);
            let stmt =
                statement::update(T::TABLE, &record, &keys_without_id, id_field, &id_value);
            executor.query(&stmt.sql, &stmt.params)?;
        } else {
            if let Some(created_field) = T::created_field() {
                stamp_if_falsy(&mut record, &mut keys, created_field);
            }
            let stmt = statement::insert(T::TABLE, &record, &keys, id_field);
            let result = executor.query(&stmt.sql, &stmt.params)?;
            id = result
                .rows
                .into_iter()
                .next()
                .and_then(|mut row| row.remove(id_field));
        }

        info!(
            "event=model_save module=model status=ok table={} op={} duration_ms={}",
            T::TABLE,
            if exists { "update" } else { "insert" },
            started_at.elapsed().as_millis()
        );

        match id {
            Some(id) if opts.return_new => self.fetch(
                &single_filter(id_field, id),
                QueryOptions { query: opts.query },
            ),
            _ => Ok(None),
        }
    }

    /// Saves `record` and returns the stored row.
    ///
    /// # Errors
    /// - `ModelError::SaveFailed` when the saved row cannot be read back.
    pub fn save_and_fetch(&self, record: Record, opts: QueryOptions<'_>) -> ModelResult<T> {
        self.save(
            record,
            SaveOptions {
                return_new: true,
                query: opts.query,
            },
        )?
        .ok_or(ModelError::SaveFailed)
    }

    /// Deletes the first row matching `filter`.
    ///
    /// Returns `false` without touching storage when nothing matches or the
    /// mapping has no id field.
    pub fn hard_delete(&self, filter: &Record, opts: QueryOptions<'_>) -> ModelResult<bool> {
        let Some(found) = self.select_rows(filter, Some(1), opts.query)?.into_iter().next()
        else {
            return Ok(false);
        };
        let Some(id_field) = T::id_field() else {
            return Ok(false);
        };

        let id_value = found.get(id_field).cloned().unwrap_or(JsonValue::Null);
        let stmt = statement::delete(T::TABLE, id_field, &id_value);
        self.executor(opts.query).query(&stmt.sql, &stmt.params)?;
        info!(
            "event=model_hard_delete module=model status=ok table={}",
            T::TABLE
        );
        Ok(true)
    }

    /// Stamps the deleted marker of the first row matching `filter`.
    ///
    /// The row stays in storage; the updated marker is refreshed too when
    /// configured. Returns whether a row was marked; a matching row without
    /// an id cannot be addressed and is left untouched.
    ///
    /// # Errors
    /// - `ModelError::MissingDeletedField` when the mapping has no deleted field.
    /// - `ModelError::MissingIdField` when the mapping has no id field.
    pub fn soft_delete(&self, filter: &Record, opts: QueryOptions<'_>) -> ModelResult<bool> {
        let deleted_field = T::deleted_field().ok_or(ModelError::MissingDeletedField)?;
        let id_field = T::id_field().ok_or(ModelError::MissingIdField)?;

        let Some(mut found) = self.select_rows(filter, Some(1), opts.query)?.into_iter().next()
        else {
            return Ok(false);
        };
        let id = match found.remove(id_field) {
            Some(JsonValue::Null) | None => return Ok(false),
            Some(id) => id,
        };

        let mut marker = Record::new();
        marker.insert(id_field.to_string(), id);
        marker.insert(deleted_field.to_string(), JsonValue::String(now_timestamp()));
        self.save(
            marker,
            SaveOptions {
                return_new: false,
                query: opts.query,
            },
        )?;
        Ok(true)
    }

    fn executor<'a>(&'a self, query: Option<&'a dyn Executor>) -> &'a dyn Executor {
        match query {
            Some(query) => query,
            None => self.db,
        }
    }

    fn select_rows(
        &self,
        filter: &Record,
        limit: Option<u32>,
        query: Option<&dyn Executor>,
    ) -> ModelResult<Vec<Record>> {
        if filter.is_empty() {
            return Err(ModelError::NoFilters);
        }

        let stmt = statement::select(T::TABLE, filter, limit);
        let result = self.executor(query).query(&stmt.sql, &stmt.params)?;
        debug!(
            "event=model_select module=model status=ok table={} filters={} rows={}",
            T::TABLE,
            filter.len(),
            result.rows.len()
        );
        Ok(result.rows)
    }
}

fn single_filter(field: &str, value: JsonValue) -> Record {
    let mut filter = Record::new();
    filter.insert(field.to_string(), value);
    filter
}

/// Sets `field` to now unless it already holds a truthy value.
fn stamp_if_falsy(record: &mut Record, keys: &mut Vec<String>, field: &str) {
    if !record.get(field).map_or(true, is_falsy) {
        return;
    }

    // Why: the record map already holds the key when it was present but
    // falsy; listing it again would name the column twice in the statement.
    record.insert(field.to_string(), JsonValue::String(now_timestamp()));
    if !keys.iter().any(|key| key == field) {
        keys.push(field.to_string());
    }
}

fn is_falsy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => true,
        JsonValue::Bool(flag) => !flag,
        JsonValue::Number(number) => number.as_f64().map_or(false, |n| n == 0.0),
        JsonValue::String(text) => text.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
