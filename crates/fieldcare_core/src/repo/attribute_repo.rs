//! Attribute catalog persistence and EAV value storage.
//!
//! # Responsibility
//! - Persist catalog entries with stable integer ids.
//! - Persist (patient, attribute type, value) triples with their kind tag,
//!   original serialization and a numeric shadow column.
//!
//! # Invariants
//! - Values reference existing catalog entries (foreign key).
//! - Persisted rows are decoded strictly; unknown kinds or malformed raw
//!   values are reported instead of masked.

use crate::model::attribute::{
    AttributeScalar, AttributeType, AttributeTypeId, AttributeValue, ScalarKind,
};
use crate::model::ModelValidationError;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, Row};

const ATTRIBUTE_TYPE_SELECT_SQL: &str = "SELECT
    attribute_type_id,
    name,
    uuid,
    format,
    value_kind
FROM patient_attribute_type";

/// Stored attribute value joined with its type name.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttributeValue {
    pub name: String,
    pub value: AttributeValue,
}

pub trait AttributeRepository {
    /// Inserts or refreshes a catalog entry by name; returns its stable id.
    fn upsert_type(
        &self,
        name: &str,
        uuid: Option<&str>,
        format: Option<&str>,
    ) -> RepoResult<AttributeTypeId>;
    fn list_types(&self) -> RepoResult<Vec<AttributeType>>;
    fn count_types(&self) -> RepoResult<u64>;
    /// Records the kind of the first value seen for a type; later calls are no-ops.
    fn record_first_kind(&self, id: AttributeTypeId, kind: ScalarKind) -> RepoResult<()>;
    fn insert_value(&self, value: &AttributeValue) -> RepoResult<i64>;
    fn list_values_for_patient(&self, patient_id: &str) -> RepoResult<Vec<NamedAttributeValue>>;
}

pub struct SqliteAttributeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAttributeRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AttributeRepository for SqliteAttributeRepository<'_> {
    fn upsert_type(
        &self,
        name: &str,
        uuid: Option<&str>,
        format: Option<&str>,
    ) -> RepoResult<AttributeTypeId> {
        if name.trim().is_empty() {
            return Err(ModelValidationError::BlankAttributeTypeName.into());
        }

        self.conn.execute(
            "INSERT INTO patient_attribute_type (name, uuid, format)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (name) DO UPDATE SET
                uuid = excluded.uuid,
                format = excluded.format;",
            params![name, uuid, format],
        )?;

        let id = self.conn.query_row(
            "SELECT attribute_type_id FROM patient_attribute_type WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn list_types(&self) -> RepoResult<Vec<AttributeType>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ATTRIBUTE_TYPE_SELECT_SQL} ORDER BY attribute_type_id ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut types = Vec::new();
        while let Some(row) = rows.next()? {
            types.push(parse_attribute_type_row(row)?);
        }
        Ok(types)
    }

    fn count_types(&self) -> RepoResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM patient_attribute_type;", [], |row| {
                    row.get(0)
                })?;
        Ok(count.max(0) as u64)
    }

    fn record_first_kind(&self, id: AttributeTypeId, kind: ScalarKind) -> RepoResult<()> {
        self.conn.execute(
            "UPDATE patient_attribute_type
             SET value_kind = ?2
             WHERE attribute_type_id = ?1
               AND value_kind IS NULL;",
            params![id, kind.as_str()],
        )?;
        Ok(())
    }

    fn insert_value(&self, value: &AttributeValue) -> RepoResult<i64> {
        self.conn.execute(
            "INSERT INTO patient_attribute (
                patient_uuid,
                attribute_type_id,
                value_kind,
                value_raw,
                value_number
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                value.patient_id.as_str(),
                value.attribute_type_id,
                value.value.kind().as_str(),
                value.value.to_raw(),
                value.value.as_f64(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_values_for_patient(&self, patient_id: &str) -> RepoResult<Vec<NamedAttributeValue>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                pa.attribute_type_id,
                pat.name,
                pa.value_kind,
                pa.value_raw
             FROM patient_attribute pa
             INNER JOIN patient_attribute_type pat
                ON pat.attribute_type_id = pa.attribute_type_id
             WHERE pa.patient_uuid = ?1
             ORDER BY pa.id ASC;",
        )?;
        let mut rows = stmt.query([patient_id])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let kind_text: String = row.get("value_kind")?;
            let raw: String = row.get("value_raw")?;
            values.push(NamedAttributeValue {
                name: row.get("name")?,
                value: AttributeValue {
                    patient_id: patient_id.to_string(),
                    attribute_type_id: row.get("attribute_type_id")?,
                    value: decode_scalar(&kind_text, &raw)?,
                },
            });
        }
        Ok(values)
    }
}

/// Decodes a persisted (kind, raw) pair into a scalar.
pub(crate) fn decode_scalar(kind_text: &str, raw: &str) -> RepoResult<AttributeScalar> {
    let kind = ScalarKind::parse(kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid value kind `{kind_text}` in patient_attribute.value_kind"
        ))
    })?;
    AttributeScalar::from_raw(kind, raw).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "value does not parse as {kind} in patient_attribute.value_raw"
        ))
    })
}

fn parse_attribute_type_row(row: &Row<'_>) -> RepoResult<AttributeType> {
    Ok(AttributeType {
        id: row.get("attribute_type_id")?,
        name: row.get("name")?,
        uuid: row.get("uuid")?,
        format: row.get("format")?,
        kind: decode_kind_column(row.get("value_kind")?)?,
    })
}

fn decode_kind_column(value: Option<String>) -> RepoResult<Option<ScalarKind>> {
    match value {
        Some(text) => ScalarKind::parse(&text).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid value kind `{text}` in patient_attribute_type.value_kind"
            ))
        }),
        None => Ok(None),
    }
}
