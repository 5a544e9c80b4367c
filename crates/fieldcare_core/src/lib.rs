//! Offline patient search core.
//!
//! Holds patients, their preferred address and schema-less clinical
//! attributes in a local (optionally encrypted) SQLite store, and answers
//! identifier/name/address/attribute searches without network access.

pub mod catalog;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use catalog::{
    AttributeCatalog, AttributeTypeDescriptor, AttributeTypeSource, CatalogError, CatalogStatus,
    SourceError, StaticAttributeTypeSource,
};
pub use config::{CoreConfig, IngestionPolicy};
pub use db::{DbHandle, StorageError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::attribute::{AttributeScalar, AttributeType, AttributeTypeId, ScalarKind};
pub use model::patient::{Patient, PatientId, PreferredAddress};
pub use repo::{RepoError, RepoResult};
pub use search::compose::{CompositionError, Predicate, QueryComposer, SearchMode, SearchParams};
pub use search::executor::{CancelToken, SearchError, SearchExecutor, SearchTask, SubmitError};
pub use search::request::{RequestError, SearchRequest};
pub use search::result::{records_to_json, ResultRecord, ResultRow};
pub use service::import_service::{ImportError, PatientDocument, PatientImporter};
pub use service::ingest_service::{
    AttributeIngestor, IngestionError, IngestionReport, RawAttribute,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
