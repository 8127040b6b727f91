use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    DeleteOutcome, EditOutcome, EditScope, EventUpdates, ExceptionEvent, NewSeriesData, Occurrence,
    SeriesMaster,
};
use crate::projection::OccurrenceProjector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

pub mod editor;
pub mod exceptions;
pub mod projection;
pub mod series;

// Traits are defined in this module and implemented in respective domain modules

/// Storage of series master rows
#[async_trait]
pub trait SeriesRepository {
    async fn create_series(&self, data: NewSeriesData) -> Result<SeriesMaster, CoreError>;
    /// Loads the master with its excluded timestamps.
    async fn load_master(&self, id: Uuid) -> Result<Option<SeriesMaster>, CoreError>;
    /// Masters of `calendar_id` whose anchor is not after `end`, minus
    /// one-off events that ended before `start`. Rules decide whether a
    /// recurring master actually has anything in the window.
    async fn find_series_in_range(
        &self,
        calendar_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesMaster>, CoreError>;
}

/// Per-occurrence bookkeeping of a series: excluded timestamps and override
/// rows. Nothing here touches the master's rule.
#[async_trait]
pub trait ExceptionRepository {
    async fn excluded_timestamps(&self, series_id: Uuid) -> Result<BTreeSet<DateTime<Utc>>, CoreError>;
    /// Returns `false` when the timestamp was already excluded.
    async fn mark_excluded(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<bool, CoreError>;
    /// Restores a hidden occurrence. Fails while an override row still
    /// replaces it.
    async fn unmark_excluded(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<bool, CoreError>;
    async fn exceptions_for(
        &self,
        series_id: Uuid,
    ) -> Result<BTreeMap<DateTime<Utc>, ExceptionEvent>, CoreError>;
    async fn list_exceptions(&self, series_id: Uuid) -> Result<Vec<ExceptionEvent>, CoreError>;
    /// Inserts or replaces the override of the occurrence at `at` and
    /// excludes `at` from the raw rule, atomically.
    async fn create_exception(
        &self,
        series_id: Uuid,
        at: DateTime<Utc>,
        updates: EventUpdates,
    ) -> Result<ExceptionEvent, CoreError>;
    async fn delete_exceptions_at_or_after(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<u64, CoreError>;
    async fn delete_all_exceptions(&self, series_id: Uuid) -> Result<u64, CoreError>;
}

/// Read side: what occurrences exist in a window
#[async_trait]
pub trait OccurrenceRepository {
    /// Projects one series. A missing series projects to nothing.
    async fn expand(
        &self,
        series_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError>;
    /// Projects every series of a calendar, ordered by displayed start.
    async fn expand_calendar(
        &self,
        calendar_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError>;
}

/// Scope-aware mutations. Every call is a single transaction.
#[async_trait]
pub trait SeriesEditor {
    /// `anchor` is the occurrence being edited; required unless `scope` is
    /// [`EditScope::All`].
    async fn apply_edit(
        &self,
        series_id: Uuid,
        scope: EditScope,
        anchor: Option<DateTime<Utc>>,
        updates: EventUpdates,
    ) -> Result<EditOutcome, CoreError>;
    async fn apply_delete(
        &self,
        series_id: Uuid,
        scope: EditScope,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<DeleteOutcome, CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    SeriesRepository + ExceptionRepository + OccurrenceRepository + SeriesEditor + Send + Sync
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    projector: OccurrenceProjector,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, projector: OccurrenceProjector) -> Self {
        Self { pool, projector }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn projector(&self) -> &OccurrenceProjector {
        &self.projector
    }
}

impl Repository for SqliteRepository {}

/// Rejects an event ending before it starts.
pub(crate) fn validate_times(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), CoreError> {
    if end < start {
        return Err(CoreError::InvalidInput(format!(
            "End time {} is before start time {}",
            end, start
        )));
    }
    Ok(())
}
