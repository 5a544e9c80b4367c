//! Wire-level search request parsing.
//!
//! Field names are fixed by the calling application:
//! `q`, `s`, `startIndex`, `address_field_name`, `address_field_value`,
//! `custom_attribute`, `patientAttributes`.

use crate::model::attribute::AttributeScalar;
use crate::search::compose::{SearchMode, SearchParams};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("malformed search request: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown search mode `{0}`")]
    UnknownMode(String),
    #[error("startIndex must not be negative, got {0}")]
    NegativeStartIndex(i64),
    #[error("startIndex {0} is out of range")]
    StartIndexOutOfRange(i64),
    #[error("custom_attribute must be a string, boolean or number")]
    UnsupportedAttributeValue,
}

/// Search request exactly as received on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub q: String,
    pub s: String,
    #[serde(rename = "startIndex", default)]
    pub start_index: i64,
    #[serde(default)]
    pub address_field_name: Option<String>,
    #[serde(default)]
    pub address_field_value: Option<String>,
    #[serde(default)]
    pub custom_attribute: Option<Value>,
    #[serde(rename = "patientAttributes", default)]
    pub patient_attributes: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn from_json(raw: &str) -> Result<Self, RequestError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Converts the wire shape into typed parameters.
    ///
    /// Only shape problems are reported here; combinations of fields are
    /// checked by the composer.
    pub fn into_params(self) -> Result<SearchParams, RequestError> {
        let mode =
            SearchMode::from_tag(&self.s).ok_or_else(|| RequestError::UnknownMode(self.s.clone()))?;

        if self.start_index < 0 {
            return Err(RequestError::NegativeStartIndex(self.start_index));
        }
        let start_index = u32::try_from(self.start_index)
            .map_err(|_| RequestError::StartIndexOutOfRange(self.start_index))?;

        let custom_attribute_value = match self.custom_attribute {
            None => None,
            Some(value) => Some(
                AttributeScalar::from_json(&value)
                    .ok_or(RequestError::UnsupportedAttributeValue)?,
            ),
        };

        Ok(SearchParams {
            mode,
            query: Some(self.q),
            address_field_name: self.address_field_name,
            address_field_value: self.address_field_value,
            custom_attribute_value,
            candidate_attribute_names: self.patient_attributes.unwrap_or_default(),
            start_index,
        })
    }
}

impl SearchParams {
    /// Parses a wire request straight into typed parameters.
    pub fn from_json(raw: &str) -> Result<Self, RequestError> {
        SearchRequest::from_json(raw)?.into_params()
    }
}
