// src/db/mod.rs

//! SQLite-backed persistence: schema/migrations, path derivation, and the
//! per-entity model types the rest of the crate reads and writes through.

pub mod models;
pub mod paths;
pub mod schema;

use crate::error::Result;
use rusqlite::Connection;

/// Open (creating if absent) the record-store database and bring its schema
/// up to date.
pub fn open_and_migrate(db_path: &str) -> Result<Connection> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    schema::migrate(&conn)?;
    Ok(conn)
}
