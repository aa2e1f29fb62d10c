//! Benchmark utilities.

use rand::Rng;
use rekord_codec::{FieldType, Value};
use rekord_core::{Config, Database, TableSchema};
use std::path::Path;

/// Schema used by every benchmark: a unique name and a payload.
pub fn bench_schema() -> TableSchema {
    TableSchema::builder("bench")
        .unique("name", FieldType::Text)
        .field("score", FieldType::Integer)
        .field("payload", FieldType::Bytes)
        .build()
        .expect("valid schema")
}

/// Opens an in-memory database with the bench table.
pub fn open_in_memory() -> Database {
    Database::builder()
        .table(bench_schema())
        .open_in_memory()
        .expect("open in-memory database")
}

/// Opens a directory database with the bench table, without fsync on
/// commit.
pub fn open_directory(path: &Path) -> Database {
    Database::builder()
        .config(Config::default().sync_on_commit(false))
        .table(bench_schema())
        .open_directory(path)
        .expect("open directory database")
}

/// Generate random payload bytes of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a row whose unique name is derived from `n`.
pub fn row(n: u64, payload_size: usize) -> Vec<Value> {
    vec![
        Value::from(format!("row-{n}")),
        Value::Integer(n as i64),
        Value::Bytes(random_data(payload_size)),
    ]
}

/// Fills the bench table with `count` committed rows.
pub fn populate(db: &Database, count: u64, payload_size: usize) {
    let table = db.table("bench").expect("bench table");
    db.transaction(|_| {
        for n in 0..count {
            table.insert(row(n, payload_size))?;
        }
        Ok(())
    })
    .expect("populate bench table");
}
