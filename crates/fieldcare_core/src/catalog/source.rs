//! External attribute-type source boundary.
//!
//! The remote registration service publishes the attribute-type catalog as
//! `{"results": [{"name": ..., "uuid": ..., "format": ...}]}`. Fetching it
//! over the network is the caller's concern; the core only sees this trait.

use serde::Deserialize;

/// One catalog entry as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AttributeTypeDescriptor {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("attribute type source unreachable: {0}")]
    Unreachable(String),
    #[error("malformed attribute type payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Supplier of the ordered attribute-type catalog.
pub trait AttributeTypeSource {
    fn fetch(&self, base_url: &str) -> Result<Vec<AttributeTypeDescriptor>, SourceError>;
}

impl<F> AttributeTypeSource for F
where
    F: Fn(&str) -> Result<Vec<AttributeTypeDescriptor>, SourceError>,
{
    fn fetch(&self, base_url: &str) -> Result<Vec<AttributeTypeDescriptor>, SourceError> {
        self(base_url)
    }
}

/// Parses a catalog document, wrapped in `results` or as a bare array.
pub fn parse_attribute_type_payload(raw: &str) -> Result<Vec<AttributeTypeDescriptor>, SourceError> {
    let items = match serde_json::from_str::<serde_json::Value>(raw)? {
        serde_json::Value::Object(mut object) => object
            .remove("results")
            .unwrap_or(serde_json::Value::Null),
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

/// Source backed by an in-memory payload, e.g. a bundled or cached document.
#[derive(Debug, Clone)]
pub struct StaticAttributeTypeSource {
    payload: Result<String, String>,
}

impl StaticAttributeTypeSource {
    pub fn from_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: Ok(payload.into()),
        }
    }

    /// A source that always fails, as if the remote service were offline.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            payload: Err(reason.into()),
        }
    }
}

impl AttributeTypeSource for StaticAttributeTypeSource {
    fn fetch(&self, _base_url: &str) -> Result<Vec<AttributeTypeDescriptor>, SourceError> {
        match &self.payload {
            Ok(payload) => parse_attribute_type_payload(payload),
            Err(reason) => Err(SourceError::Unreachable(reason.clone())),
        }
    }
}
