//! Registration-document import.
//!
//! # Responsibility
//! - Turn a patient document from the registration service into a patient
//!   row, its preferred address and its attribute values.
//!
//! # Invariants
//! - One document imports atomically: a failing attribute leaves no patient.
//! - Voided attributes are ignored.

use crate::catalog::AttributeCatalog;
use crate::model::patient::{Patient, PatientId, PreferredAddress};
use crate::repo::address_repo::{AddressRepository, SqliteAddressRepository};
use crate::repo::patient_repo::{PatientRepository, SqlitePatientRepository};
use crate::repo::{write_scope, RepoError};
use crate::service::ingest_service::{AttributeIngestor, IngestionError, RawAttribute};
use log::info;
use rusqlite::Connection;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("patient document is missing `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Parsed registration document.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientDocument {
    pub patient: Patient,
    pub address: Option<PreferredAddress>,
    pub attributes: Vec<RawAttribute>,
}

impl PatientDocument {
    /// Reads `patient.uuid`, the first identifier, the first name, the
    /// preferred address and the non-voided attributes.
    ///
    /// Accepts either the `{"patient": {...}}` envelope or the bare patient.
    pub fn from_json(document: &Value) -> Result<Self, ImportError> {
        let patient = document.get("patient").unwrap_or(document);
        let person = patient
            .get("person")
            .ok_or(ImportError::MissingField("patient.person"))?;

        let uuid = patient
            .get("uuid")
            .and_then(Value::as_str)
            .ok_or(ImportError::MissingField("patient.uuid"))?;
        let identifier = patient
            .pointer("/identifiers/0/identifier")
            .and_then(Value::as_str)
            .ok_or(ImportError::MissingField("patient.identifiers[0].identifier"))?;

        let name = person
            .pointer("/names/0")
            .or_else(|| person.get("preferredName"));
        let name_part = |key: &str| {
            name.and_then(|name| name.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let address = person
            .get("preferredAddress")
            .and_then(Value::as_object)
            .map(PreferredAddress::from_json_object)
            .filter(|address| !address.is_empty());

        let attributes = person
            .get("attributes")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_attribute).collect())
            .unwrap_or_default();

        Ok(Self {
            patient: Patient::with_id(
                uuid,
                identifier,
                name_part("givenName"),
                name_part("familyName"),
            ),
            address,
            attributes,
        })
    }
}

fn parse_attribute(item: &Value) -> Option<RawAttribute> {
    if item.get("voided").and_then(Value::as_bool) == Some(true) {
        return None;
    }
    let attribute_type = item.get("attributeType")?;
    let name = attribute_type
        .get("display")
        .or_else(|| attribute_type.get("name"))
        .and_then(Value::as_str)?;
    Some(RawAttribute::new(name, item.get("value")?.clone()))
}

/// Imports registration documents into the local store.
pub struct PatientImporter<'a> {
    catalog: &'a AttributeCatalog,
    ingestor: &'a AttributeIngestor,
}

impl<'a> PatientImporter<'a> {
    pub fn new(catalog: &'a AttributeCatalog, ingestor: &'a AttributeIngestor) -> Self {
        Self { catalog, ingestor }
    }

    pub fn import_json(&self, conn: &Connection, document: &Value) -> Result<PatientId, ImportError> {
        let document = PatientDocument::from_json(document)?;
        self.import(conn, &document)
    }

    /// Stores patient, address and attributes in one write transaction.
    pub fn import(
        &self,
        conn: &Connection,
        document: &PatientDocument,
    ) -> Result<PatientId, ImportError> {
        let stored = write_scope(conn, |conn| -> Result<usize, ImportError> {
            SqlitePatientRepository::new(conn).create_patient(&document.patient)?;
            if let Some(address) = &document.address {
                SqliteAddressRepository::new(conn)
                    .set_preferred_address(&document.patient.uuid, address)?;
            }
            let stored = self.ingestor.ingest(
                conn,
                &document.patient.uuid,
                &document.attributes,
                self.catalog,
            )?;
            Ok(stored)
        })?;

        info!(
            "event=patient_import module=service status=ok address={} attributes={}",
            document.address.is_some(),
            stored
        );
        Ok(document.patient.uuid.clone())
    }
}
