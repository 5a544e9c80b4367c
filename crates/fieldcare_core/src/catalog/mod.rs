//! Attribute-type catalog.
//!
//! # Responsibility
//! - Refresh the local name -> id mapping from an [`AttributeTypeSource`].
//! - Answer `lookup(name)` from the in-memory snapshot without I/O.
//!
//! # Invariants
//! - Refresh is idempotent: ids are stable and names never duplicate.
//! - A failed refresh with a non-empty cache keeps the stale cache.
//! - Refresh writes commit atomically.

mod source;

pub use source::{
    parse_attribute_type_payload, AttributeTypeDescriptor, AttributeTypeSource, SourceError,
    StaticAttributeTypeSource,
};

use crate::model::attribute::{AttributeType, AttributeTypeId};
use crate::repo::attribute_repo::{AttributeRepository, SqliteAttributeRepository};
use crate::repo::{write_scope, RepoError};
use log::{error, info, warn};
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The source failed and there is no cached catalog to fall back on.
    #[error("attribute type source unavailable and no cached catalog exists")]
    SourceUnavailable(#[source] SourceError),
    #[error("attribute type `{0}` appears more than once in the catalog snapshot")]
    DuplicateAttributeType(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Outcome of [`AttributeCatalog::ensure_loaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogStatus {
    /// The source answered and the local catalog now mirrors it.
    Refreshed { entries: usize },
    /// The source failed; the previously cached catalog is in use.
    StaleCache { entries: usize },
}

/// In-memory snapshot of the persisted attribute-type catalog.
#[derive(Debug, Clone, Default)]
pub struct AttributeCatalog {
    by_name: BTreeMap<String, AttributeType>,
}

impl AttributeCatalog {
    /// Reads the persisted catalog without contacting any source.
    pub fn load(conn: &Connection) -> CatalogResult<Self> {
        let types = SqliteAttributeRepository::new(conn).list_types()?;
        Ok(Self {
            by_name: types
                .into_iter()
                .map(|entry| (entry.name.clone(), entry))
                .collect(),
        })
    }

    /// Fetches the catalog from `source`, persists it and reloads the snapshot.
    ///
    /// # Errors
    /// - [`CatalogError::SourceUnavailable`] when the source fails and the
    ///   local catalog is empty.
    /// - [`CatalogError::DuplicateAttributeType`] when the snapshot repeats a name.
    pub fn ensure_loaded(
        &mut self,
        conn: &Connection,
        source: &dyn AttributeTypeSource,
        base_url: &str,
    ) -> CatalogResult<CatalogStatus> {
        let started_at = Instant::now();
        info!("event=catalog_refresh module=catalog status=start");

        let descriptors = match source.fetch(base_url) {
            Ok(descriptors) => descriptors,
            Err(err) => {
                let cached = SqliteAttributeRepository::new(conn).count_types()?;
                if cached == 0 {
                    error!(
                        "event=catalog_refresh module=catalog status=error duration_ms={} error_code=source_unavailable error={}",
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(CatalogError::SourceUnavailable(err));
                }

                warn!(
                    "event=catalog_refresh module=catalog status=fallback duration_ms={} cached_entries={} error={}",
                    started_at.elapsed().as_millis(),
                    cached,
                    err
                );
                *self = Self::load(conn)?;
                return Ok(CatalogStatus::StaleCache {
                    entries: self.len(),
                });
            }
        };

        let mut seen = BTreeSet::new();
        for descriptor in &descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(CatalogError::DuplicateAttributeType(
                    descriptor.name.clone(),
                ));
            }
        }

        write_scope(conn, |conn| -> CatalogResult<()> {
            let repo = SqliteAttributeRepository::new(conn);
            for descriptor in &descriptors {
                repo.upsert_type(
                    descriptor.name.as_str(),
                    descriptor.uuid.as_deref(),
                    descriptor.format.as_deref(),
                )?;
            }
            Ok(())
        })?;

        *self = Self::load(conn)?;
        info!(
            "event=catalog_refresh module=catalog status=ok duration_ms={} fetched_entries={} entries={}",
            started_at.elapsed().as_millis(),
            descriptors.len(),
            self.len()
        );
        Ok(CatalogStatus::Refreshed {
            entries: self.len(),
        })
    }

    /// Resolves an attribute name to its stable id.
    pub fn lookup(&self, name: &str) -> Option<AttributeTypeId> {
        self.by_name.get(name).map(|entry| entry.id)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeType> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
