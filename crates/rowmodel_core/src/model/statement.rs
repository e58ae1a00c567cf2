//! SQL text builders for model operations.
//!
//! Identifiers are emitted double-quoted; every record value is bound as a
//! positional parameter, never spliced into SQL text.

use crate::db::{json_to_sql, Record, SqlValue};
use serde_json::Value as JsonValue;

/// SQL text plus its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Quotes a table or column name as a SQLite identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `select * from <table> where <filter> [limit n]`.
pub(crate) fn select(table: &str, filter: &Record, limit: Option<u32>) -> Statement {
    let (conditions, params) = where_clause(filter);
    let mut sql = format!("select * from {} where {conditions}", quote_ident(table));
    if let Some(limit) = limit {
        sql.push_str(&format!(" limit {limit}"));
    }
    Statement { sql, params }
}

/// `insert into <table> (<keys>) values (...) returning <id_field>`.
pub(crate) fn insert(table: &str, record: &Record, keys: &[String], id_field: &str) -> Statement {
    let columns = keys
        .iter()
        .map(|key| quote_ident(key))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; keys.len()].join(", ");
    let params = keys.iter().map(|key| bound_value(record, key)).collect();

    Statement {
        sql: format!(
            "insert into {} ({columns}) values ({placeholders}) returning {}",
            quote_ident(table),
            quote_ident(id_field)
        ),
        params,
    }
}

/// `update <table> set <key> = ?, ... where <id_field> = ?`.
pub(crate) fn update(
    table: &str,
    record: &Record,
    keys: &[String],
    id_field: &str,
    id_value: &JsonValue,
) -> Statement {
    let assignments = keys
        .iter()
        .map(|key| format!("{} = ?", quote_ident(key)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params: Vec<SqlValue> = keys.iter().map(|key| bound_value(record, key)).collect();
    params.push(json_to_sql(id_value));

    Statement {
        sql: format!(
            "update {} set {assignments} where {} = ?",
            quote_ident(table),
            quote_ident(id_field)
        ),
        params,
    }
}

/// `delete from <table> where <id_field> = ?`.
pub(crate) fn delete(table: &str, id_field: &str, id_value: &JsonValue) -> Statement {
    Statement {
        sql: format!(
            "delete from {} where {} = ?",
            quote_ident(table),
            quote_ident(id_field)
        ),
        params: vec![json_to_sql(id_value)],
    }
}

/// Builds the `and`-joined condition list for a filter record.
///
/// `null` matches with `IS NULL`, arrays expand to `IN (...)`, anything else
/// compares with `=`.
fn where_clause(filter: &Record) -> (String, Vec<SqlValue>) {
    let mut params = Vec::new();
    let conditions = filter
        .iter()
        .map(|(key, value)| {
            let column = quote_ident(key);
            match value {
                JsonValue::Null => format!("{column} IS NULL"),
                JsonValue::Array(items) => {
                    params.extend(items.iter().map(json_to_sql));
                    format!("{column} IN ({})", vec!["?"; items.len()].join(","))
                }
                other => {
                    params.push(json_to_sql(other));
                    format!("{column} = ?")
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" and ");

    (conditions, params)
}

fn bound_value(record: &Record, key: &str) -> SqlValue {
    record.get(key).map_or(SqlValue::Null, json_to_sql)
}
