//! Domain model for offline patient search.
//!
//! # Responsibility
//! - Define patient, preferred-address and attribute records shared by
//!   the stores, ingestion and search layers.
//! - Keep the closed scalar union used for schema-less clinical attributes.
//!
//! # Invariants
//! - Every patient is identified by a stable, non-blank `PatientId`.
//! - Attribute values carry the scalar kind observed in their literal.

pub mod attribute;
pub mod patient;

use thiserror::Error;

/// Validation failure for a domain record before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    #[error("patient identity key cannot be blank")]
    BlankPatientId,
    #[error("patient external identifier cannot be blank")]
    BlankIdentifier,
    #[error("address field name cannot be blank")]
    BlankAddressField,
    #[error("address field `{0}` appears more than once")]
    DuplicateAddressField(String),
    #[error("attribute type name cannot be blank")]
    BlankAttributeTypeName,
}
