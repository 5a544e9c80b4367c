//! Patient repository contracts and SQLite implementation.
//!
//! # Invariants
//! - The identity key is immutable; updates only touch demographic fields.
//! - Deleting a patient cascades to its address fields and attribute values.

use crate::model::patient::{Patient, PatientId};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const PATIENT_SELECT_SQL: &str = "SELECT
    uuid,
    identifier,
    given_name,
    family_name
FROM patient";

/// Repository interface for fixed-schema patient rows.
pub trait PatientRepository {
    fn create_patient(&self, patient: &Patient) -> RepoResult<PatientId>;
    fn update_patient(&self, patient: &Patient) -> RepoResult<()>;
    fn get_patient(&self, id: &str) -> RepoResult<Option<Patient>>;
    fn patient_exists(&self, id: &str) -> RepoResult<bool>;
    fn delete_patient(&self, id: &str) -> RepoResult<()>;
}

/// SQLite-backed patient repository.
pub struct SqlitePatientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePatientRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl PatientRepository for SqlitePatientRepository<'_> {
    fn create_patient(&self, patient: &Patient) -> RepoResult<PatientId> {
        patient.validate()?;

        self.conn.execute(
            "INSERT INTO patient (uuid, identifier, given_name, family_name)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                patient.uuid.as_str(),
                patient.identifier.as_str(),
                patient.given_name.as_str(),
                patient.family_name.as_str(),
            ],
        )?;

        Ok(patient.uuid.clone())
    }

    fn update_patient(&self, patient: &Patient) -> RepoResult<()> {
        patient.validate()?;

        let changed = self.conn.execute(
            "UPDATE patient
             SET
                identifier = ?1,
                given_name = ?2,
                family_name = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?4;",
            params![
                patient.identifier.as_str(),
                patient.given_name.as_str(),
                patient.family_name.as_str(),
                patient.uuid.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(patient.uuid.clone()));
        }

        Ok(())
    }

    fn get_patient(&self, id: &str) -> RepoResult<Option<Patient>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PATIENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_patient_row(row)?));
        }

        Ok(None)
    }

    fn patient_exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM patient WHERE uuid = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn delete_patient(&self, id: &str) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM patient WHERE uuid = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn parse_patient_row(row: &Row<'_>) -> RepoResult<Patient> {
    let patient = Patient {
        uuid: row.get("uuid")?,
        identifier: row.get("identifier")?,
        given_name: row.get("given_name")?,
        family_name: row.get("family_name")?,
    };
    patient
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("patient row `{}`: {err}", patient.uuid)))?;
    Ok(patient)
}
