//! Query composition from sparse search parameters.
//!
//! # Responsibility
//! - Validate parameter combinations before anything reaches storage.
//! - Build one SQL predicate over patient, address and attribute tables.
//!
//! # Invariants
//! - Filter families (free text, address, attribute) combine with AND.
//! - Free text is an OR over identifier prefix, given name, family name.
//! - Attribute matching is an OR over candidate names with kind-matched
//!   equality; text never matches numbers or booleans.
//! - Blank free text or blank address value constrain nothing.
//! - Ordering is by patient identity key ascending.

use crate::config::CoreConfig;
use crate::model::attribute::{AttributeScalar, ScalarKind};
use rusqlite::types::Value;
use std::collections::BTreeSet;

/// Predicate family selected by the `s` request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Identifier, name, address and attribute search.
    ByIdOrNameOrVillage,
}

impl SearchMode {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "byIdOrNameOrVillage" => Some(Self::ByIdOrNameOrVillage),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::ByIdOrNameOrVillage => "byIdOrNameOrVillage",
        }
    }
}

/// Typed, possibly sparse, search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub mode: SearchMode,
    /// Free text matched against identifier, given name and family name.
    pub query: Option<String>,
    pub address_field_name: Option<String>,
    pub address_field_value: Option<String>,
    pub custom_attribute_value: Option<AttributeScalar>,
    /// Attribute names the custom value may match, in preference order.
    pub candidate_attribute_names: Vec<String>,
    pub start_index: u32,
}

impl SearchParams {
    pub fn new(mode: SearchMode) -> Self {
        Self {
            mode,
            query: None,
            address_field_name: None,
            address_field_value: None,
            custom_attribute_value: None,
            candidate_attribute_names: Vec::new(),
            start_index: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error("invalid search parameters: {0}")]
    InvalidParams(&'static str),
}

/// How the address family participates in a predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressClause {
    None,
    /// Field value is projected into results but does not filter.
    Project { field: String },
    Filter { field: String, value: String },
}

impl AddressClause {
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::None => None,
            Self::Project { field } | Self::Filter { field, .. } => Some(field.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeClause {
    pub candidates: Vec<String>,
    pub value: AttributeScalar,
}

/// A validated, executable search predicate.
///
/// Only [`QueryComposer::compose`] builds predicates, so every instance
/// satisfies the parameter-combination rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    mode: SearchMode,
    text: Option<String>,
    address: AddressClause,
    attribute: Option<AttributeClause>,
    offset: u32,
    limit: u32,
}

impl Predicate {
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn address(&self) -> &AddressClause {
        &self.address
    }

    pub fn attribute(&self) -> Option<&AttributeClause> {
        self.attribute.as_ref()
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Renders the predicate as SQL with named parameters.
    pub(crate) fn to_sql(&self) -> CompiledQuery {
        let mut params: Vec<(String, Value)> = Vec::new();
        let mut bind = |name: &str, value: Value| {
            params.push((name.to_string(), value));
        };

        let mut inner_where = String::new();
        let matched_on = match &self.text {
            Some(text) => {
                bind(":q", Value::Text(text.clone()));
                inner_where.push_str(
                    " AND (substr(p.identifier, 1, length(:q)) = :q
                       OR p.given_name = :q
                       OR p.family_name = :q)",
                );
                "CASE
                    WHEN substr(p.identifier, 1, length(:q)) = :q THEN 'identifier'
                    WHEN p.given_name = :q THEN 'givenName'
                    WHEN p.family_name = :q THEN 'familyName'
                 END"
            }
            None => "NULL",
        };

        let address_value = match &self.address {
            AddressClause::None => "NULL",
            AddressClause::Project { field } => {
                bind(":address_field", Value::Text(field.clone()));
                ADDRESS_VALUE_SQL
            }
            AddressClause::Filter { field, value } => {
                bind(":address_field", Value::Text(field.clone()));
                bind(":address_value", Value::Text(value.clone()));
                inner_where.push_str(
                    " AND EXISTS (
                        SELECT 1
                        FROM patient_address_field f
                        WHERE f.patient_uuid = p.uuid
                          AND f.field_name = :address_field
                          AND f.field_value = :address_value
                    )",
                );
                ADDRESS_VALUE_SQL
            }
        };

        let (matched_attribute, outer_where) = match &self.attribute {
            Some(clause) => {
                let mut placeholders = Vec::with_capacity(clause.candidates.len());
                for (index, name) in clause.candidates.iter().enumerate() {
                    let placeholder = format!(":candidate{index}");
                    bind(&placeholder, Value::Text(name.clone()));
                    placeholders.push(placeholder);
                }

                let kind = clause.value.kind();
                bind(":attribute_kind", Value::Text(kind.as_str().to_string()));
                let comparison = match kind {
                    ScalarKind::Number => {
                        bind(
                            ":attribute_value",
                            Value::Real(clause.value.as_f64().unwrap_or(f64::NAN)),
                        );
                        "pa.value_number = :attribute_value"
                    }
                    ScalarKind::Text | ScalarKind::Boolean => {
                        bind(":attribute_value", Value::Text(clause.value.to_raw()));
                        "pa.value_raw = :attribute_value"
                    }
                };

                (
                    format!(
                        "(SELECT pa.id
                          FROM patient_attribute pa
                          INNER JOIN patient_attribute_type pat
                             ON pat.attribute_type_id = pa.attribute_type_id
                          WHERE pa.patient_uuid = p.uuid
                            AND pat.name IN ({})
                            AND pa.value_kind = :attribute_kind
                            AND {comparison}
                          ORDER BY pa.id ASC
                          LIMIT 1)",
                        placeholders.join(", ")
                    ),
                    "WHERE m.matched_attribute_id IS NOT NULL",
                )
            }
            None => ("NULL".to_string(), ""),
        };

        bind(":limit", Value::Integer(i64::from(self.limit)));
        bind(":offset", Value::Integer(i64::from(self.offset)));

        let sql = format!(
            "SELECT
                m.uuid AS uuid,
                m.identifier AS identifier,
                m.given_name AS given_name,
                m.family_name AS family_name,
                m.matched_on AS matched_on,
                m.address_field_value AS address_field_value,
                pat.name AS attribute_name,
                pa.value_kind AS attribute_kind,
                pa.value_raw AS attribute_raw
             FROM (
                SELECT
                    p.uuid,
                    p.identifier,
                    p.given_name,
                    p.family_name,
                    {matched_on} AS matched_on,
                    {address_value} AS address_field_value,
                    {matched_attribute} AS matched_attribute_id
                FROM patient p
                WHERE 1 = 1{inner_where}
             ) m
             LEFT JOIN patient_attribute pa ON pa.id = m.matched_attribute_id
             LEFT JOIN patient_attribute_type pat ON pat.attribute_type_id = pa.attribute_type_id
             {outer_where}
             ORDER BY m.uuid ASC
             LIMIT :limit OFFSET :offset;"
        );

        CompiledQuery { sql, params }
    }
}

const ADDRESS_VALUE_SQL: &str = "(SELECT f.field_value
    FROM patient_address_field f
    WHERE f.patient_uuid = p.uuid
      AND f.field_name = :address_field)";

/// SQL text plus its named parameter bindings.
#[derive(Debug, Clone)]
pub(crate) struct CompiledQuery {
    pub sql: String,
    pub params: Vec<(String, Value)>,
}

/// Translates [`SearchParams`] into a [`Predicate`].
#[derive(Debug, Clone)]
pub struct QueryComposer {
    page_size: u32,
}

impl Default for QueryComposer {
    fn default() -> Self {
        Self::from_config(&CoreConfig::default())
    }
}

impl QueryComposer {
    pub fn from_config(config: &CoreConfig) -> Self {
        Self {
            page_size: config.effective_page_size(),
        }
    }

    /// Validates parameter combinations and builds the predicate.
    ///
    /// # Errors
    /// - Address value without an address field name.
    /// - Custom attribute value without candidate attribute names.
    pub fn compose(&self, params: &SearchParams) -> Result<Predicate, CompositionError> {
        let address_field = non_blank(params.address_field_name.as_deref());

        let address = match (address_field, params.address_field_value.as_deref()) {
            (None, Some(_)) => {
                return Err(CompositionError::InvalidParams(
                    "address_field_value requires address_field_name",
                ));
            }
            (None, None) => AddressClause::None,
            (Some(field), Some(value)) if non_blank(Some(value)).is_some() => {
                AddressClause::Filter {
                    field: field.to_string(),
                    value: value.to_string(),
                }
            }
            (Some(field), _) => AddressClause::Project {
                field: field.to_string(),
            },
        };

        let attribute = match &params.custom_attribute_value {
            Some(value) => {
                let candidates = ordered_unique(&params.candidate_attribute_names);
                if candidates.is_empty() {
                    return Err(CompositionError::InvalidParams(
                        "custom_attribute requires at least one patient attribute name",
                    ));
                }
                if matches!(value, AttributeScalar::Number(number) if number.as_f64().is_none()) {
                    return Err(CompositionError::InvalidParams(
                        "custom_attribute number is not representable",
                    ));
                }
                Some(AttributeClause {
                    candidates,
                    value: value.clone(),
                })
            }
            None => None,
        };

        let text = non_blank(params.query.as_deref()).map(str::to_string);

        Ok(Predicate {
            mode: params.mode,
            text,
            address,
            attribute,
            offset: params.start_index,
            limit: self.page_size,
        })
    }
}

/// Blank input means "no constraint"; anything else is compared verbatim.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

fn ordered_unique(names: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty() && seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}
