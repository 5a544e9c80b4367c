//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file, keyed-file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - The decryption key is applied before any other statement.
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use crate::config::CoreConfig;
use log::{error, info};
use rusqlite::Connection;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shareable description of where the store lives and how to unlock it.
///
/// Connections are not shared between threads; every consumer (for example
/// one background search) opens its own connection from this handle.
#[derive(Clone)]
pub struct DbHandle {
    path: PathBuf,
    key: Option<String>,
    busy_timeout: Duration,
}

impl DbHandle {
    /// Handle for an unencrypted database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Handle for a database file unlocked by `key`.
    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::new(path)
        }
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Applies the connection settings carried by `config`.
    pub fn configured(self, config: &CoreConfig) -> Self {
        self.busy_timeout(config.busy_timeout())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh, migrated connection.
    pub fn open(&self) -> DbResult<Connection> {
        open_with(
            &self.path,
            self.key.as_deref(),
            self.busy_timeout,
            if self.key.is_some() { "keyed" } else { "file" },
        )
    }
}

impl Debug for DbHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandle")
            .field("path", &self.path)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_with(path.as_ref(), None, DEFAULT_BUSY_TIMEOUT, "file")
}

/// Opens a database file unlocked by `key` and applies pending migrations.
///
/// The key only takes effect when the crate is built with the `sqlcipher`
/// feature; plain SQLite ignores the pragma.
pub fn open_encrypted_db(path: impl AsRef<Path>, key: &str) -> DbResult<Connection> {
    open_with(path.as_ref(), Some(key), DEFAULT_BUSY_TIMEOUT, "keyed")
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let mut conn = match Connection::open_in_memory() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(&mut conn, None, DEFAULT_BUSY_TIMEOUT, "memory", started_at)?;
    Ok(conn)
}

fn open_with(
    path: &Path,
    key: Option<&str>,
    busy_timeout: Duration,
    mode: &'static str,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    finish_open(&mut conn, key, busy_timeout, mode, started_at)?;
    Ok(conn)
}

fn finish_open(
    conn: &mut Connection,
    key: Option<&str>,
    busy_timeout: Duration,
    mode: &'static str,
    started_at: Instant,
) -> DbResult<()> {
    match bootstrap_connection(conn, key, busy_timeout) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(())
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    key: Option<&str>,
    busy_timeout: Duration,
) -> DbResult<()> {
    if let Some(key) = key {
        conn.pragma_update(None, "key", key)?;
    }
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
