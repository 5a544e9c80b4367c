//! Background search execution.
//!
//! # Responsibility
//! - Run a composed predicate off the caller's context on the blocking pool.
//! - Resolve exactly once with either the projected records or an error.
//!
//! # Invariants
//! - Each search opens its own read connection; nothing is cached.
//! - Zero matches resolve to `Ok(vec![])`.
//! - Worker failures resolve the task with an error, never panic the caller.

use crate::db::{DbHandle, StorageError};
use crate::repo::attribute_repo::decode_scalar;
use crate::search::compose::{CompositionError, Predicate, QueryComposer, SearchParams};
use crate::search::request::RequestError;
use crate::search::result::{project, MatchedField, ResultRecord, ResultRow};
use log::{error, info};
use rusqlite::types::ToSql;
use rusqlite::{Connection, Row};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid search row: {0}")]
    InvalidData(String),
    #[error("search was cancelled")]
    Cancelled,
    #[error("search worker stopped before resolving")]
    WorkerFailed,
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(value))
    }
}

/// Failure before a search could be scheduled.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
}

/// Cooperative cancellation flag shared between a task and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Single-shot handle to a running search.
///
/// Await it from async code, or call [`SearchTask::wait`] from a thread that
/// is not driving the runtime.
#[derive(Debug)]
pub struct SearchTask {
    receiver: oneshot::Receiver<SearchResult<Vec<ResultRecord>>>,
    token: CancelToken,
}

impl SearchTask {
    /// Requests cancellation; the task then resolves to
    /// [`SearchError::Cancelled`] unless it already finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Blocks the current thread until the search resolves.
    ///
    /// Must not be called from within an async context.
    pub fn wait(self) -> SearchResult<Vec<ResultRecord>> {
        self.receiver
            .blocking_recv()
            .unwrap_or(Err(SearchError::WorkerFailed))
    }
}

impl Future for SearchTask {
    type Output = SearchResult<Vec<ResultRecord>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SearchError::WorkerFailed)))
    }
}

/// Schedules searches against one store on a tokio runtime.
#[derive(Debug, Clone)]
pub struct SearchExecutor {
    db: DbHandle,
    runtime: Handle,
}

impl SearchExecutor {
    pub fn new(db: DbHandle, runtime: Handle) -> Self {
        Self { db, runtime }
    }

    /// Uses the runtime the caller is currently running on.
    pub fn on_current_runtime(db: DbHandle) -> Result<Self, tokio::runtime::TryCurrentError> {
        Ok(Self::new(db, Handle::try_current()?))
    }

    /// Starts executing `predicate` in the background.
    pub fn execute(&self, predicate: Predicate) -> SearchTask {
        let (sender, receiver) = oneshot::channel();
        let token = CancelToken::new();
        let worker_token = token.clone();
        let db = self.db.clone();

        self.runtime.spawn_blocking(move || {
            if sender.is_closed() {
                return;
            }
            let result = run_and_project(&db, &predicate, &worker_token);
            let _ = sender.send(result);
        });

        SearchTask { receiver, token }
    }

    /// Parses a wire request, composes it and starts the search.
    ///
    /// Request and composition errors are returned before storage is touched.
    pub fn submit_json(
        &self,
        raw_request: &str,
        composer: &QueryComposer,
    ) -> Result<SearchTask, SubmitError> {
        let params = SearchParams::from_json(raw_request)?;
        let predicate = composer.compose(&params)?;
        Ok(self.execute(predicate))
    }
}

fn run_and_project(
    db: &DbHandle,
    predicate: &Predicate,
    token: &CancelToken,
) -> SearchResult<Vec<ResultRecord>> {
    let started_at = Instant::now();
    let outcome = db
        .open()
        .map_err(SearchError::from)
        .and_then(|conn| run_search(&conn, predicate, token));

    match outcome {
        Ok(rows) => {
            info!(
                "event=search_execute module=search status=ok mode={} duration_ms={} rows={}",
                predicate.mode().tag(),
                started_at.elapsed().as_millis(),
                rows.len()
            );
            Ok(rows
                .into_iter()
                .map(|row| project(row, predicate))
                .collect())
        }
        Err(SearchError::Cancelled) => {
            info!(
                "event=search_execute module=search status=cancelled duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Err(SearchError::Cancelled)
        }
        Err(err) => {
            error!(
                "event=search_execute module=search status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Runs `predicate` synchronously on `conn`, checking `token` between rows.
pub fn run_search(
    conn: &Connection,
    predicate: &Predicate,
    token: &CancelToken,
) -> SearchResult<Vec<ResultRow>> {
    if token.is_cancelled() {
        return Err(SearchError::Cancelled);
    }

    let compiled = predicate.to_sql();
    let named: Vec<(&str, &dyn ToSql)> = compiled
        .params
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect();

    let mut stmt = conn.prepare(&compiled.sql)?;
    let mut rows = stmt.query(named.as_slice())?;
    let mut results = Vec::new();
    while let Some(row) = rows.next()? {
        if token.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        results.push(parse_result_row(row)?);
    }

    Ok(results)
}

fn parse_result_row(row: &Row<'_>) -> SearchResult<ResultRow> {
    let matched_on = match row.get::<_, Option<String>>("matched_on")? {
        Some(text) => Some(MatchedField::parse(&text).ok_or_else(|| {
            SearchError::InvalidData(format!("invalid matched field `{text}`"))
        })?),
        None => None,
    };

    let matched_attribute = match (
        row.get::<_, Option<String>>("attribute_name")?,
        row.get::<_, Option<String>>("attribute_kind")?,
        row.get::<_, Option<String>>("attribute_raw")?,
    ) {
        (Some(name), Some(kind), Some(raw)) => {
            let value = decode_scalar(&kind, &raw)
                .map_err(|err| SearchError::InvalidData(err.to_string()))?;
            Some((name, value))
        }
        _ => None,
    };

    Ok(ResultRow {
        patient_id: row.get("uuid")?,
        identifier: row.get("identifier")?,
        given_name: row.get("given_name")?,
        family_name: row.get("family_name")?,
        matched_on,
        address_field_value: row.get("address_field_value")?,
        matched_attribute,
    })
}
