//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `rowmodel_core` linkage with one in-memory save/fetch round trip.
//! - Keep output deterministic apart from generated ids and timestamps.

use rowmodel_core::{
    into_record, open_db_in_memory, Db, Model, ModelResult, ModelSchema, OpenOptions,
    QueryOptions,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct Probe {
    id: String,
    label: String,
    created_at: String,
}

impl ModelSchema for Probe {
    const TABLE: &'static str = "probes";

    fn created_field() -> Option<&'static str> {
        Some("created_at")
    }
}

fn run_probe() -> ModelResult<Probe> {
    let conn = open_db_in_memory(&OpenOptions::default())?;
    conn.execute_batch(
        "CREATE TABLE probes (id TEXT PRIMARY KEY, label TEXT NOT NULL, created_at TEXT);",
    )?;
    let db = Db::with_connection(conn);

    let probes = Model::<Probe>::new(&db);
    let record = into_record(&serde_json::json!({
        "id": Uuid::new_v4().to_string(),
        "label": "smoke",
    }))?;
    probes.save_and_fetch(record, QueryOptions::default())
}

fn main() {
    println!("rowmodel_core ping={}", rowmodel_core::ping());
    println!("rowmodel_core version={}", rowmodel_core::core_version());

    match run_probe() {
        Ok(probe) => println!(
            "rowmodel_core probe=ok id={} label={} created_at={}",
            probe.id, probe.label, probe.created_at
        ),
        Err(err) => {
            eprintln!("rowmodel_core probe=error code={} error={err}", err.code());
            std::process::exit(1);
        }
    }
}
