//! Active-record style persistence over SQLite.
//! A `Model` maps one record type onto one table; `Db` owns the connection.

pub mod db;
pub mod logging;
pub mod model;

pub use db::{
    open_db, open_db_in_memory, Db, DbError, DbResult, Executor, OpenOptions, QueryResult, Record,
    SqlValue, TxQuery,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{
    into_record, FetchOptions, Model, ModelError, ModelResult, ModelSchema, QueryOptions,
    SaveOptions,
};

/// Minimal health-check API for embedding hosts.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
