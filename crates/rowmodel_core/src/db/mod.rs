//! SQLite connection wrapper, query execution and transaction scoping.
//!
//! # Responsibility
//! - Hold at most one active SQLite handle for model operations.
//! - Run parameterized statements and decode produced rows into records.
//! - Scope a callback inside a single transaction (commit on `Ok`, roll back
//!   on `Err`).
//!
//! # Invariants
//! - Every query path fails with `DbError::NotConnected` before `connect`.
//! - The handle cannot be swapped while a transaction is borrowing it.
//! - Query logging carries metadata only, never bound values.

use log::{debug, error, info, warn};
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::cell::RefCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

mod convert;
mod open;

pub use convert::{json_to_sql, row_to_record};
pub use open::{open_db, open_db_in_memory, OpenOptions};

/// Ordered JSON object used for both row results and partial records.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Positional bind value for `?` placeholders.
pub type SqlValue = rusqlite::types::Value;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    /// No handle has been installed with `Db::connect`.
    NotConnected,
    /// The handle is borrowed by an open transaction.
    Busy,
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "cannot query database before connected"),
            Self::Busy => write!(f, "database handle is in use by an open transaction"),
            Self::Sqlite(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotConnected | Self::Busy => None,
            Self::Sqlite(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Rows produced by one statement, in result order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Record>,
}

/// Anything that can run a parameterized statement.
///
/// Model operations accept an optional `&dyn Executor` so callers can route
/// them through a transaction-scoped handle instead of the shared `Db`.
pub trait Executor {
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult>;
}

impl Executor for Connection {
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        run_query(self, sql, params)
    }
}

/// Executor handed to `Db::transaction` callbacks.
pub struct TxQuery<'conn> {
    tx: Transaction<'conn>,
}

impl Executor for TxQuery<'_> {
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        run_query(&self.tx, sql, params)
    }
}

/// Connection wrapper holding at most one SQLite handle.
///
/// The wrapper is single-threaded: share it by reference within one thread
/// and open one `Db` per worker thread.
#[derive(Default)]
pub struct Db {
    conn: RefCell<Option<Connection>>,
}

impl Db {
    /// Creates a wrapper with no active handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a wrapper already connected to `conn`.
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn: RefCell::new(Some(conn)),
        }
    }

    /// Installs `conn` as the active handle, closing any previous one.
    ///
    /// # Errors
    /// - `DbError::Busy` when called from inside a transaction callback.
    pub fn connect(&self, conn: Connection) -> DbResult<()> {
        let mut slot = self.conn.try_borrow_mut().map_err(|_| DbError::Busy)?;
        let replaced = slot.take().map(close_quietly).is_some();
        *slot = Some(conn);
        info!("event=db_connect module=db status=ok replaced={replaced}");
        Ok(())
    }

    /// Closes and clears the active handle. No-op when not connected.
    pub fn disconnect(&self) -> DbResult<()> {
        let mut slot = self.conn.try_borrow_mut().map_err(|_| DbError::Busy)?;
        if let Some(conn) = slot.take() {
            conn.close().map_err(|(_, err)| {
                error!("event=db_disconnect module=db status=error error={err}");
                DbError::Sqlite(err)
            })?;
            info!("event=db_disconnect module=db status=ok");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.try_borrow().map_or(true, |slot| slot.is_some())
    }

    /// Runs `callback` inside one IMMEDIATE transaction.
    ///
    /// The transaction commits when the callback returns `Ok` and rolls back
    /// when it returns `Err` or unwinds.
    ///
    /// # Errors
    /// - `DbError::NotConnected` before `connect`.
    /// - SQLite errors from `BEGIN`/`COMMIT`, converted into `E`.
    /// - Whatever the callback returns.
    pub fn transaction<T, E, F>(&self, callback: F) -> Result<T, E>
    where
        F: FnOnce(&TxQuery<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        // Why: a shared borrow keeps `Db::query` usable from inside the callback
        // on the same handle, while `connect`/`disconnect` see `Busy`.
        let slot = self.conn.try_borrow().map_err(|_| DbError::Busy)?;
        let conn = slot.as_ref().ok_or(DbError::NotConnected)?;
        let started_at = Instant::now();

        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(DbError::from)?;
        let scoped = TxQuery { tx };

        match callback(&scoped) {
            Ok(value) => {
                scoped.tx.commit().map_err(DbError::from)?;
                info!(
                    "event=db_transaction module=db status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = scoped.tx.rollback() {
                    warn!(
                        "event=db_transaction module=db status=error error_code=rollback_failed error={rollback_err}"
                    );
                }
                info!(
                    "event=db_transaction module=db status=rolled_back duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}

impl Executor for Db {
    fn query(&self, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
        let slot = self.conn.try_borrow().map_err(|_| DbError::Busy)?;
        let conn = slot.as_ref().ok_or(DbError::NotConnected)?;
        run_query(conn, sql, params)
    }
}

fn close_quietly(conn: Connection) {
    if let Err((_, err)) = conn.close() {
        warn!("event=db_connect module=db status=error error_code=close_previous_failed error={err}");
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
    let started_at = Instant::now();
    match collect_rows(conn, sql, params) {
        Ok(result) => {
            debug!(
                "event=db_query module=db status=ok params={} rows={} duration_ms={}",
                params.len(),
                result.rows.len(),
                started_at.elapsed().as_millis()
            );
            Ok(result)
        }
        Err(err) => {
            error!(
                "event=db_query module=db status=error params={} duration_ms={} error={}",
                params.len(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn collect_rows(conn: &Connection, sql: &str, params: &[SqlValue]) -> DbResult<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(row_to_record(row, &columns)?);
    }

    Ok(QueryResult { rows: records })
}
