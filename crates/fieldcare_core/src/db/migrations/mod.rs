//! Schema migrations for the patient store.
//!
//! Each step is a plain SQL script; the highest applied step is recorded in
//! `PRAGMA user_version`. A store written by a newer build is refused rather
//! than guessed at.

use crate::db::{DbResult, StorageError};
use log::{error, info};
use rusqlite::Connection;

/// `(version, script)` pairs in ascending version order.
const STEPS: [(u32, &str); 2] = [
    (1, include_str!("0001_init.sql")),
    (2, include_str!("0002_attributes.sql")),
];

/// Highest schema version this build can write.
pub fn latest_version() -> u32 {
    STEPS.iter().map(|(version, _)| *version).max().unwrap_or(0)
}

/// Brings `conn` up to [`latest_version`] in a single transaction.
///
/// # Errors
/// - [`StorageError::UnsupportedSchemaVersion`] when the store is newer.
/// - SQLite failures from any step; nothing is applied in that case.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let stored: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();

    if stored > latest {
        error!(
            "event=db_migrate module=db status=error error_code=unsupported_schema db_version={} latest_supported={}",
            stored, latest
        );
        return Err(StorageError::UnsupportedSchemaVersion {
            db_version: stored,
            latest_supported: latest,
        });
    }

    let pending: Vec<&(u32, &str)> = STEPS
        .iter()
        .filter(|(version, _)| *version > stored)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, script) in &pending {
        tx.execute_batch(script)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={} steps={}",
        stored,
        latest,
        pending.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, STEPS};
    use rusqlite::Connection;

    #[test]
    fn steps_are_strictly_increasing() {
        assert!(STEPS.windows(2).all(|pair| pair[0].0 < pair[1].0));
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn partially_migrated_store_only_runs_missing_steps() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(STEPS[0].1).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();

        apply_migrations(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, latest_version());
    }
}
