//! Preferred-address repository.
//!
//! # Invariants
//! - A patient has at most one preferred address; setting one replaces the
//!   whole field set atomically.
//! - Field order is preserved through `position`.

use crate::model::patient::{AddressField, PreferredAddress};
use crate::repo::patient_repo::{PatientRepository, SqlitePatientRepository};
use crate::repo::{write_scope, RepoError, RepoResult};
use rusqlite::{params, Connection};

pub trait AddressRepository {
    fn set_preferred_address(&self, patient_id: &str, address: &PreferredAddress)
        -> RepoResult<()>;
    fn get_preferred_address(&self, patient_id: &str) -> RepoResult<Option<PreferredAddress>>;
}

pub struct SqliteAddressRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAddressRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AddressRepository for SqliteAddressRepository<'_> {
    fn set_preferred_address(
        &self,
        patient_id: &str,
        address: &PreferredAddress,
    ) -> RepoResult<()> {
        address.validate()?;

        write_scope(self.conn, |conn| -> RepoResult<()> {
            if !SqlitePatientRepository::new(conn).patient_exists(patient_id)? {
                return Err(RepoError::NotFound(patient_id.to_string()));
            }

            conn.execute(
                "DELETE FROM patient_address_field WHERE patient_uuid = ?1;",
                [patient_id],
            )?;

            let mut insert = conn.prepare(
                "INSERT INTO patient_address_field (patient_uuid, field_name, field_value, position)
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for (position, field) in address.fields.iter().enumerate() {
                insert.execute(params![
                    patient_id,
                    field.name.as_str(),
                    field.value.as_str(),
                    position as i64,
                ])?;
            }

            Ok(())
        })
    }

    fn get_preferred_address(&self, patient_id: &str) -> RepoResult<Option<PreferredAddress>> {
        let mut stmt = self.conn.prepare(
            "SELECT field_name, field_value
             FROM patient_address_field
             WHERE patient_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([patient_id])?;
        let mut fields = Vec::new();
        while let Some(row) = rows.next()? {
            fields.push(AddressField {
                name: row.get(0)?,
                value: row.get(1)?,
            });
        }

        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(PreferredAddress { fields }))
    }
}
