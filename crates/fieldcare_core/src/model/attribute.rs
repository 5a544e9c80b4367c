//! Attribute catalog entries and typed EAV values.
//!
//! # Invariants
//! - A value's kind is derived from its own literal, never from the catalog.
//! - Kinds are never coerced: `"23"` is text, `23` is a number.
//! - `raw` serialization round-trips to the identical JSON scalar.

use super::patient::PatientId;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt::{Display, Formatter};

/// Stable local id of a catalog entry.
pub type AttributeTypeId = i64;

/// Scalar tag carried with every attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Boolean,
    Number,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Number => "number",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "boolean" => Some(Self::Boolean),
            "number" => Some(Self::Number),
            _ => None,
        }
    }
}

impl Display for ScalarKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed tagged union for schema-less attribute values.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeScalar {
    Text(String),
    Bool(bool),
    Number(Number),
}

impl AttributeScalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Self::Text(_) => ScalarKind::Text,
            Self::Bool(_) => ScalarKind::Boolean,
            Self::Number(_) => ScalarKind::Number,
        }
    }

    /// Classifies a JSON literal. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(Self::Text(text.clone())),
            Value::Bool(flag) => Some(Self::Bool(*flag)),
            Value::Number(number) => Some(Self::Number(number.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Number(number) => Value::Number(number.clone()),
        }
    }

    /// Textual serialization persisted next to the kind tag.
    pub fn to_raw(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Bool(flag) => flag.to_string(),
            Self::Number(number) => number.to_string(),
        }
    }

    /// Rebuilds a scalar from its persisted kind tag and serialization.
    pub fn from_raw(kind: ScalarKind, raw: &str) -> Option<Self> {
        match kind {
            ScalarKind::Text => Some(Self::Text(raw.to_string())),
            ScalarKind::Boolean => match raw {
                "true" => Some(Self::Bool(true)),
                "false" => Some(Self::Bool(false)),
                _ => None,
            },
            ScalarKind::Number => serde_json::from_str::<Number>(raw).ok().map(Self::Number),
        }
    }

    /// Numeric shadow stored for number values so comparisons ignore
    /// representation (`23` equals `23.0`).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => number.as_f64(),
            Self::Text(_) | Self::Bool(_) => None,
        }
    }
}

impl Serialize for AttributeScalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(text) => serializer.serialize_str(text),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Number(number) => number.serialize(serializer),
        }
    }
}

/// Catalog entry for a named clinical attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeType {
    pub id: AttributeTypeId,
    /// Unique human-readable name, e.g. `caste`.
    pub name: String,
    /// Identifier assigned by the remote attribute-type service, if any.
    pub uuid: Option<String>,
    /// Declared format reported by the remote service, if any.
    pub format: Option<String>,
    /// Kind of the first value ingested for this type.
    pub kind: Option<ScalarKind>,
}

/// One (patient, attribute type, value) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    pub patient_id: PatientId,
    pub attribute_type_id: AttributeTypeId,
    pub value: AttributeScalar,
}
