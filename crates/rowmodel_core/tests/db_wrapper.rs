use rowmodel_core::{open_db, open_db_in_memory, Db, DbError, DbResult, Executor, OpenOptions, SqlValue};
use rusqlite::Connection;
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

fn connected_db() -> Db {
    let conn = open_db_in_memory(&OpenOptions::default()).unwrap();
    conn.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER NOT NULL);")
        .unwrap();
    Db::with_connection(conn)
}

fn count_rows(db: &Db) -> i64 {
    let result = db.query("SELECT COUNT(*) AS n FROM kv;", &[]).unwrap();
    result.rows[0]["n"].as_i64().unwrap()
}

#[test]
fn query_before_connect_returns_not_connected() {
    let db = Db::new();
    assert!(!db.is_connected());

    let err = db.query("SELECT 1;", &[]).unwrap_err();
    assert!(matches!(err, DbError::NotConnected));

    let err = db
        .transaction(|_tx| Ok::<_, DbError>(()))
        .unwrap_err();
    assert!(matches!(err, DbError::NotConnected));
}

#[test]
fn query_binds_positional_parameters_and_returns_rows() {
    let db = connected_db();
    db.query(
        "INSERT INTO kv (k, v) VALUES (?, ?), (?, ?);",
        &[
            SqlValue::Text("a".to_string()),
            SqlValue::Integer(1),
            SqlValue::Text("b".to_string()),
            SqlValue::Integer(2),
        ],
    )
    .unwrap();

    let result = db
        .query(
            "SELECT k, v FROM kv WHERE v >= ? ORDER BY k;",
            &[SqlValue::Integer(1)],
        )
        .unwrap();
    assert_eq!(result.rows.len(), 2);
    assert_eq!(result.rows[0]["k"], json!("a"));
    assert_eq!(result.rows[1]["v"], json!(2));
}

#[test]
fn statements_without_result_columns_return_no_rows() {
    let db = connected_db();
    let result = db
        .query(
            "INSERT INTO kv (k, v) VALUES (?, ?);",
            &[SqlValue::Text("a".to_string()), SqlValue::Integer(1)],
        )
        .unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(count_rows(&db), 1);
}

#[test]
fn sqlite_errors_surface_as_db_errors() {
    let db = connected_db();
    let err = db.query("SELECT * FROM missing_table;", &[]).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}

#[test]
fn disconnect_clears_handle_and_is_idempotent() {
    let db = connected_db();
    assert!(db.is_connected());

    db.disconnect().unwrap();
    assert!(!db.is_connected());
    db.disconnect().unwrap();

    let err = db.query("SELECT 1;", &[]).unwrap_err();
    assert!(matches!(err, DbError::NotConnected));
}

#[test]
fn connect_replaces_previous_handle() {
    let db = connected_db();
    db.connect(Connection::open_in_memory().unwrap()).unwrap();

    let err = db.query("SELECT * FROM kv;", &[]).unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}

#[test]
fn transaction_commits_on_ok() {
    let db = connected_db();

    let inserted = db
        .transaction(|tx| {
            tx.query(
                "INSERT INTO kv (k, v) VALUES ('a', 1);",
                &[],
            )?;
            tx.query(
                "INSERT INTO kv (k, v) VALUES ('b', 2);",
                &[],
            )?;
            Ok::<_, DbError>(2)
        })
        .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(count_rows(&db), 2);
}

#[test]
fn transaction_rolls_back_on_err() {
    let db = connected_db();

    let err = db
        .transaction(|tx| {
            tx.query("INSERT INTO kv (k, v) VALUES ('a', 1);", &[])?;
            // Duplicate primary key fails the second statement.
            tx.query("INSERT INTO kv (k, v) VALUES ('a', 2);", &[])?;
            Ok::<_, DbError>(())
        })
        .unwrap_err();

    assert!(matches!(err, DbError::Sqlite(_)));
    assert_eq!(count_rows(&db), 0);
}

#[test]
fn transaction_rolls_back_when_callback_panics() {
    let db = connected_db();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        db.transaction(|tx| -> DbResult<()> {
            tx.query("INSERT INTO kv (k, v) VALUES ('a', 1);", &[])?;
            panic!("callback failed mid-transaction");
        })
    }));
    assert!(outcome.is_err());
    assert_eq!(count_rows(&db), 0);

    db.transaction(|tx| {
        tx.query("INSERT INTO kv (k, v) VALUES ('b', 2);", &[])?;
        Ok::<_, DbError>(())
    })
    .unwrap();
    assert_eq!(count_rows(&db), 1);
}

#[test]
fn connection_swap_inside_transaction_is_busy() {
    let db = connected_db();

    db.transaction(|_tx| {
        let err = db
            .connect(Connection::open_in_memory().unwrap())
            .unwrap_err();
        assert!(matches!(err, DbError::Busy));
        let err = db.disconnect().unwrap_err();
        assert!(matches!(err, DbError::Busy));
        Ok::<_, DbError>(())
    })
    .unwrap();

    assert!(db.is_connected());
    assert_eq!(count_rows(&db), 0);
}

#[test]
fn nested_transaction_is_rejected_by_sqlite() {
    let db = connected_db();

    let err = db
        .transaction(|_outer| db.transaction(|_inner| Ok::<_, DbError>(())))
        .unwrap_err();
    assert!(matches!(err, DbError::Sqlite(_)));
}

#[test]
fn open_db_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rowmodel.db");

    let db = Db::with_connection(open_db(&path, &OpenOptions::default()).unwrap());
    db.query("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER NOT NULL);", &[])
        .unwrap();
    db.query("INSERT INTO kv (k, v) VALUES ('a', 1);", &[])
        .unwrap();
    db.disconnect().unwrap();

    db.connect(open_db(&path, &OpenOptions::default()).unwrap())
        .unwrap();
    assert_eq!(count_rows(&db), 1);
}

#[test]
fn open_options_control_foreign_keys() {
    let enabled = open_db_in_memory(&OpenOptions::default()).unwrap();
    let result = enabled.query("PRAGMA foreign_keys;", &[]).unwrap();
    assert_eq!(result.rows[0]["foreign_keys"], json!(1));

    let options = OpenOptions {
        foreign_keys: false,
        ..OpenOptions::default()
    };
    let disabled = open_db_in_memory(&options).unwrap();
    let result = disabled.query("PRAGMA foreign_keys;", &[]).unwrap();
    assert_eq!(result.rows[0]["foreign_keys"], json!(0));
}

#[test]
fn open_options_apply_busy_timeout() {
    let options = OpenOptions {
        busy_timeout: Duration::from_millis(250),
        ..OpenOptions::default()
    };
    let conn = open_db_in_memory(&options).unwrap();
    let result = conn.query("PRAGMA busy_timeout;", &[]).unwrap();
    let timeout = result.rows[0].values().next().unwrap();
    assert_eq!(timeout, &json!(250));

    let default_conn = open_db_in_memory(&OpenOptions::default()).unwrap();
    let result = default_conn.query("PRAGMA busy_timeout;", &[]).unwrap();
    assert_eq!(result.rows[0].values().next().unwrap(), &json!(5000));
}
