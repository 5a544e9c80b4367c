//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for patients, preferred
//!   addresses and EAV attributes.
//! - Isolate SQLite query details from service/search orchestration.
//!
//! # Invariants
//! - Write paths validate records before SQL mutations.
//! - Multi-statement writes run inside one write transaction; when the
//!   caller already holds one, they join it instead of nesting.

use crate::db::StorageError;
use crate::model::patient::PatientId;
use crate::model::ModelValidationError;
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub mod address_repo;
pub mod attribute_repo;
pub mod patient_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for patient/address/attribute persistence.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Validation(#[from] ModelValidationError),
    #[error(transparent)]
    Db(#[from] StorageError),
    #[error("patient not found: {0}")]
    NotFound(PatientId),
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(StorageError::Sqlite(value))
    }
}

/// Runs `body` inside an immediate write transaction.
///
/// The transaction rolls back when `body` fails or unwinds, so the write
/// lock is released on every exit path. If `conn` is already inside a
/// transaction the body joins it and the owner decides commit/rollback.
pub(crate) fn write_scope<T, E>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return body(conn);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let value = body(&*tx)?;
    tx.commit()?;
    Ok(value)
}
