//! # wrb-db
//!
//! Event journal for the request board node.
//! Manages the single SQLite database at `$WRB_DATA_DIR/wrb.db`.
//!
//! ## Schema
//!
//! - `events`: the append-only board event log, one row per [`EventRecord`]
//! - `query_index`: per-query summary derived purely from `events`
//! - `settings`: node bookkeeping (indexer cursor, chain height)
//!
//! WAL mode and foreign keys are enabled. Amounts are stored as decimal
//! TEXT since they exceed SQLite's 64-bit integers. The schema version is
//! kept in `PRAGMA user_version`.
//!
//! [`EventRecord`]: wrb_types::EventRecord

pub mod journal;
pub mod migrations;
pub mod queries;
pub mod schema;

pub use journal::Journal;

use rusqlite::Connection;
use std::path::Path;

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("journal out of order: expected seq {expected}, got {actual}")]
    OutOfOrder { expected: u64, actual: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

/// Open or create the journal database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}
