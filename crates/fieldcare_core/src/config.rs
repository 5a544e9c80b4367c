//! Runtime configuration for the search core.
//!
//! Every field has a default so callers may pass a partial document, or
//! nothing at all.

use serde::Deserialize;
use std::time::Duration;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 500;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// What ingestion does with an attribute whose type is not in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionPolicy {
    /// Fail the whole batch on the first unresolved item; nothing is stored.
    #[default]
    AbortAll,
    /// Store resolvable items and report the rest.
    SkipAndCollect,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Rows per search page. Clamped to `1..=500`.
    pub page_size: u32,
    pub busy_timeout_ms: u64,
    pub ingestion_policy: IngestionPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            ingestion_policy: IngestionPolicy::AbortAll,
        }
    }
}

impl CoreConfig {
    /// Parses a JSON config document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}
