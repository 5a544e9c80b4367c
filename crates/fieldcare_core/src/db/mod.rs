//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Open and configure (optionally keyed) SQLite connections.
//! - Apply schema migrations in deterministic order.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write patient data before migrations succeed.

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory, open_encrypted_db, DbHandle};

pub type DbResult<T> = Result<T, StorageError>;

/// Failure of the underlying store (I/O, corruption, lock timeout, schema).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}
