//! Patient identity and preferred address records.

use super::ModelValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Opaque, unique identity key of a patient.
pub type PatientId = String;

/// Fixed-schema patient identity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Immutable identity key.
    pub uuid: PatientId,
    /// External identifier such as a medical record number.
    pub identifier: String,
    pub given_name: String,
    pub family_name: String,
}

impl Patient {
    /// Creates a patient with a generated identity key.
    pub fn new(
        identifier: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            identifier,
            given_name,
            family_name,
        )
    }

    /// Creates a patient whose identity already exists externally.
    ///
    /// Used by import paths where the registration service assigned the key.
    pub fn with_id(
        uuid: impl Into<PatientId>,
        identifier: impl Into<String>,
        given_name: impl Into<String>,
        family_name: impl Into<String>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            identifier: identifier.into(),
            given_name: given_name.into(),
            family_name: family_name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.uuid.trim().is_empty() {
            return Err(ModelValidationError::BlankPatientId);
        }
        if self.identifier.trim().is_empty() {
            return Err(ModelValidationError::BlankIdentifier);
        }
        Ok(())
    }
}

/// One named text field of an address, e.g. `stateProvince`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressField {
    pub name: String,
    pub value: String,
}

/// The single preferred address of a patient as an ordered field set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferredAddress {
    pub fields: Vec<AddressField>,
}

impl PreferredAddress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one field, keeping insertion order.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(AddressField {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Returns the value of a named field.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds an address from a JSON object, keeping only text fields.
    ///
    /// Non-text members (numbers, nulls, nested objects) are not address
    /// fields in the registration document and are skipped.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = object
            .iter()
            .filter_map(|(name, value)| {
                value.as_str().map(|text| AddressField {
                    name: name.clone(),
                    value: text.to_string(),
                })
            })
            .collect();
        Self { fields }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ModelValidationError::BlankAddressField);
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ModelValidationError::DuplicateAddressField(
                    field.name.clone(),
                ));
            }
        }
        Ok(())
    }
}
