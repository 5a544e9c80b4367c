//! Result rows and their caller-facing projection.

use crate::model::attribute::AttributeScalar;
use crate::model::patient::PatientId;
use crate::search::compose::Predicate;
use serde::Serialize;
use serde_json::{Map, Value};

/// Which free-text clause matched a row, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedField {
    Identifier,
    GivenName,
    FamilyName,
}

impl MatchedField {
    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value {
            "identifier" => Some(Self::Identifier),
            "givenName" => Some(Self::GivenName),
            "familyName" => Some(Self::FamilyName),
            _ => None,
        }
    }
}

/// One matched patient as read from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub patient_id: PatientId,
    pub identifier: String,
    pub given_name: String,
    pub family_name: String,
    /// Set when a free-text query was active.
    pub matched_on: Option<MatchedField>,
    /// Value of the requested address field, if the patient has it.
    pub address_field_value: Option<String>,
    /// Name and value of the attribute that satisfied the attribute filter.
    pub matched_attribute: Option<(String, AttributeScalar)>,
}

/// Caller-facing search result.
///
/// `addressFieldValue` is present whenever an address field was requested
/// (null if the patient lacks it) and omitted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub given_name: String,
    pub family_name: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_field_value: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_attribute: Option<Map<String, Value>>,
}

/// Projects a storage row into the fixed output schema.
pub fn project(row: ResultRow, predicate: &Predicate) -> ResultRecord {
    let address_field_value = predicate
        .address()
        .field()
        .map(|_| row.address_field_value);

    let custom_attribute = match (predicate.attribute(), row.matched_attribute) {
        (Some(_), Some((name, value))) => {
            let mut object = Map::new();
            object.insert(name, value.to_json());
            Some(object)
        }
        _ => None,
    };

    ResultRecord {
        given_name: row.given_name,
        family_name: row.family_name,
        identifier: row.identifier,
        address_field_value,
        custom_attribute,
    }
}

/// Renders records as the response array.
pub fn records_to_json(records: &[ResultRecord]) -> Result<Value, serde_json::Error> {
    serde_json::to_value(records)
}
