//! Attribute ingestion use-case.
//!
//! # Responsibility
//! - Resolve attribute names through the catalog and persist typed values.
//!
//! # Invariants
//! - A value's kind comes from its own literal, never from the catalog.
//! - Under [`IngestionPolicy::AbortAll`] a batch stores everything or nothing.
//! - Each batch commits in one write transaction.
//! - Re-ingesting an attribute appends a new value; nothing is upserted.

use crate::catalog::AttributeCatalog;
use crate::config::{CoreConfig, IngestionPolicy};
use crate::model::attribute::{AttributeScalar, AttributeTypeId, AttributeValue};
use crate::model::patient::PatientId;
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::patient_repo::{PatientRepository, SqlitePatientRepository};
use crate::repo::{write_scope, RepoError};
use log::{info, warn};
use rusqlite::Connection;
use serde_json::Value;

pub type IngestionResult<T> = Result<T, IngestionError>;

#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    #[error("unknown attribute type `{0}`")]
    UnknownAttributeType(String),
    #[error("unknown patient `{0}`")]
    UnknownPatient(PatientId),
    #[error("attribute `{0}` does not hold a text, boolean or number value")]
    UnsupportedValue(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<rusqlite::Error> for IngestionError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// One attribute as received from the registration document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAttribute {
    pub name: String,
    pub value: Value,
}

impl RawAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Result of one batch under the skip-and-collect policy.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub stored: usize,
    /// Item-level failures that were skipped, in input order.
    pub skipped: Vec<IngestionError>,
}

pub struct AttributeIngestor {
    policy: IngestionPolicy,
}

impl Default for AttributeIngestor {
    fn default() -> Self {
        Self::new(IngestionPolicy::AbortAll)
    }
}

impl AttributeIngestor {
    pub fn new(policy: IngestionPolicy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        Self::new(config.ingestion_policy)
    }

    pub fn policy(&self) -> IngestionPolicy {
        self.policy
    }

    /// Stores `attributes` for `patient_id` and returns how many were stored.
    ///
    /// # Errors
    /// - [`IngestionError::UnknownAttributeType`] for the first unresolved
    ///   name under the abort-all policy; nothing from the batch is stored.
    /// - [`IngestionError::UnknownPatient`] when the patient does not exist.
    pub fn ingest(
        &self,
        conn: &Connection,
        patient_id: &str,
        attributes: &[RawAttribute],
        catalog: &AttributeCatalog,
    ) -> IngestionResult<usize> {
        self.ingest_with_report(conn, patient_id, attributes, catalog)
            .map(|report| report.stored)
    }

    /// Same as [`Self::ingest`] but also returns the skipped items.
    pub fn ingest_with_report(
        &self,
        conn: &Connection,
        patient_id: &str,
        attributes: &[RawAttribute],
        catalog: &AttributeCatalog,
    ) -> IngestionResult<IngestionReport> {
        let mut report = IngestionReport::default();
        let mut resolved: Vec<(AttributeTypeId, AttributeScalar)> =
            Vec::with_capacity(attributes.len());

        for attribute in attributes {
            match resolve(attribute, catalog) {
                Ok(item) => resolved.push(item),
                Err(err) => match self.policy {
                    IngestionPolicy::AbortAll => {
                        warn!(
                            "event=attribute_ingest module=service status=error error_code=batch_aborted items={}",
                            attributes.len()
                        );
                        return Err(err);
                    }
                    IngestionPolicy::SkipAndCollect => report.skipped.push(err),
                },
            }
        }

        report.stored = write_scope(conn, |conn| -> IngestionResult<usize> {
            if !SqlitePatientRepository::new(conn).patient_exists(patient_id)? {
                return Err(IngestionError::UnknownPatient(patient_id.to_string()));
            }

            let repo = SqliteAttributeRepository::new(conn);
            for (attribute_type_id, value) in &resolved {
                repo.insert_value(&AttributeValue {
                    patient_id: patient_id.to_string(),
                    attribute_type_id: *attribute_type_id,
                    value: value.clone(),
                })?;
                repo.record_first_kind(*attribute_type_id, value.kind())?;
            }
            Ok(resolved.len())
        })?;

        info!(
            "event=attribute_ingest module=service status=ok stored={} skipped={}",
            report.stored,
            report.skipped.len()
        );
        Ok(report)
    }
}

fn resolve(
    attribute: &RawAttribute,
    catalog: &AttributeCatalog,
) -> IngestionResult<(AttributeTypeId, AttributeScalar)> {
    let attribute_type_id = catalog
        .lookup(attribute.name.as_str())
        .ok_or_else(|| IngestionError::UnknownAttributeType(attribute.name.clone()))?;
    let value = classify(&attribute.value)
        .ok_or_else(|| IngestionError::UnsupportedValue(attribute.name.clone()))?;
    Ok((attribute_type_id, value))
}

/// Classifies a raw value; coded answers (`{"display": ...}`) ingest as text.
fn classify(value: &Value) -> Option<AttributeScalar> {
    if let Some(scalar) = AttributeScalar::from_json(value) {
        return Some(scalar);
    }
    value
        .get("display")
        .and_then(Value::as_str)
        .map(|display| AttributeScalar::Text(display.to_string()))
}
