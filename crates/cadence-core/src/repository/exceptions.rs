use crate::error::CoreError;
use crate::models::{EventUpdates, ExceptionEvent, SeriesMaster};
use crate::recurrence::Rule;
use crate::repository::series::require_master;
use crate::repository::{validate_times, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::ExceptionRepository for SqliteRepository {
    async fn excluded_timestamps(&self, series_id: Uuid) -> Result<BTreeSet<DateTime<Utc>>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        Ok(require_master(&mut conn, series_id).await?.excluded)
    }

    async fn mark_excluded(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<bool, CoreError> {
        let mut tx = self.pool().begin().await?;
        require_master(&mut tx, series_id).await?;
        let inserted = insert_exclusion(&mut tx, series_id, at).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        debug!(%series_id, %at, inserted, "marked occurrence excluded");
        Ok(inserted)
    }

    async fn unmark_excluded(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<bool, CoreError> {
        let at = at.trunc_subsecs(0);
        let mut tx = self.pool().begin().await?;
        require_master(&mut tx, series_id).await?;

        if find_exception(&mut tx, series_id, at).await?.is_some() {
            return Err(CoreError::InvalidInput(format!(
                "Occurrence {} of series {} is overridden; delete the override instead",
                at, series_id
            )));
        }

        let removed = sqlx::query("DELETE FROM series_exclusions WHERE series_id = $1 AND occurrence_at = $2")
            .bind(series_id)
            .bind(at)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        debug!(%series_id, %at, removed, "restored occurrence");
        Ok(removed > 0)
    }

    async fn exceptions_for(
        &self,
        series_id: Uuid,
    ) -> Result<BTreeMap<DateTime<Utc>, ExceptionEvent>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        require_master(&mut conn, series_id).await?;
        Ok(keyed(load_exceptions(&mut conn, series_id).await?))
    }

    async fn list_exceptions(&self, series_id: Uuid) -> Result<Vec<ExceptionEvent>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        require_master(&mut conn, series_id).await?;
        load_exceptions(&mut conn, series_id).await
    }

    async fn create_exception(
        &self,
        series_id: Uuid,
        at: DateTime<Utc>,
        updates: EventUpdates,
    ) -> Result<ExceptionEvent, CoreError> {
        let mut tx = self.pool().begin().await?;
        let master = require_master(&mut tx, series_id).await?;
        let exception = override_occurrence(&mut tx, &master, at, &updates).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        info!(%series_id, at = %exception.original_start, exception_id = %exception.id, "overrode occurrence");
        Ok(exception)
    }

    async fn delete_exceptions_at_or_after(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<u64, CoreError> {
        let at = at.trunc_subsecs(0);
        let mut tx = self.pool().begin().await?;
        require_master(&mut tx, series_id).await?;
        let removed = delete_exceptions_where(&mut tx, series_id, |e| e.original_start >= at).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        debug!(%series_id, %at, removed, "deleted trailing exceptions");
        Ok(removed)
    }

    async fn delete_all_exceptions(&self, series_id: Uuid) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        require_master(&mut tx, series_id).await?;
        let removed = delete_exceptions_where(&mut tx, series_id, |_| true).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        debug!(%series_id, removed, "deleted all exceptions");
        Ok(removed)
    }
}

pub(crate) fn keyed(exceptions: Vec<ExceptionEvent>) -> BTreeMap<DateTime<Utc>, ExceptionEvent> {
    exceptions.into_iter().map(|e| (e.original_start, e)).collect()
}

/// The parsed rule of a recurring master.
pub(crate) fn recurring_rule(master: &SeriesMaster) -> Result<Rule, CoreError> {
    match master.rule() {
        Some(rule) => Ok(rule?),
        None => Err(CoreError::InvalidInput(format!(
            "Series {} has no recurrence rule",
            master.id
        ))),
    }
}

/// Checks that `at` is a generated occurrence of `master` and returns it
/// truncated to whole seconds.
pub(crate) fn ensure_occurrence(
    master: &SeriesMaster,
    rule: &Rule,
    at: DateTime<Utc>,
) -> Result<DateTime<Utc>, CoreError> {
    let at = at.trunc_subsecs(0);
    if !rule.is_occurrence(master.start_time, at) {
        return Err(CoreError::NotAnOccurrence {
            series_id: master.id,
            at,
        });
    }
    Ok(at)
}

/// Creates or replaces the override of one occurrence and excludes it.
///
/// Fields not set in `updates` come from the existing override when there
/// is one, otherwise from the master. The start defaults to the occurrence
/// itself and the end to start plus the previous duration.
pub(crate) async fn override_occurrence(
    conn: &mut SqliteConnection,
    master: &SeriesMaster,
    at: DateTime<Utc>,
    updates: &EventUpdates,
) -> Result<ExceptionEvent, CoreError> {
    let rule = recurring_rule(master)?;
    let at = ensure_occurrence(master, &rule, at)?;
    let now = Utc::now().trunc_subsecs(0);

    let base = match find_exception(conn, master.id, at).await? {
        Some(existing) => existing,
        None => ExceptionEvent {
            id: Uuid::now_v7(),
            series_id: master.id,
            original_start: at,
            calendar_id: master.calendar_id,
            creator_id: master.creator_id,
            title: master.title.clone(),
            description: master.description.clone(),
            location: master.location.clone(),
            timezone: master.timezone.clone(),
            is_all_day: master.is_all_day,
            start_time: at,
            end_time: at + master.duration(),
            status: master.status,
            created_at: now,
            updated_at: now,
        },
    };

    let duration = base.end_time - base.start_time;
    let start_time = updates.start_time.map(|t| t.trunc_subsecs(0)).unwrap_or(base.start_time);
    let end_time = updates
        .end_time
        .map(|t| t.trunc_subsecs(0))
        .unwrap_or(start_time + duration);
    validate_times(start_time, end_time)?;

    let exception = ExceptionEvent {
        title: updates.title.clone().unwrap_or(base.title),
        description: updates.description.clone().unwrap_or(base.description),
        location: updates.location.clone().unwrap_or(base.location),
        timezone: updates.timezone.clone().unwrap_or(base.timezone),
        is_all_day: updates.is_all_day.unwrap_or(base.is_all_day),
        status: updates.status.unwrap_or(base.status),
        start_time,
        end_time,
        updated_at: now,
        ..base
    };

    save_exception(conn, &exception).await?;
    insert_exclusion(conn, master.id, at).await?;
    Ok(exception)
}

// ============================================================================
// Connection-level helpers
// ============================================================================

pub(crate) async fn load_exclusions(
    conn: &mut SqliteConnection,
    series_id: Uuid,
) -> Result<BTreeSet<DateTime<Utc>>, CoreError> {
    let rows: Vec<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT occurrence_at FROM series_exclusions WHERE series_id = $1")
            .bind(series_id)
            .fetch_all(&mut *conn)
            .await?;
    Ok(rows.into_iter().map(|(at,)| at).collect())
}

/// Idempotent. Returns whether a row was added.
pub(crate) async fn insert_exclusion(
    conn: &mut SqliteConnection,
    series_id: Uuid,
    at: DateTime<Utc>,
) -> Result<bool, CoreError> {
    let result = sqlx::query("INSERT OR IGNORE INTO series_exclusions (series_id, occurrence_at) VALUES ($1, $2)")
        .bind(series_id)
        .bind(at.trunc_subsecs(0))
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn delete_exclusions_at_or_after(
    conn: &mut SqliteConnection,
    series_id: Uuid,
    at: DateTime<Utc>,
) -> Result<u64, CoreError> {
    let stale: Vec<DateTime<Utc>> = load_exclusions(conn, series_id)
        .await?
        .into_iter()
        .filter(|t| *t >= at)
        .collect();

    for t in &stale {
        sqlx::query("DELETE FROM series_exclusions WHERE series_id = $1 AND occurrence_at = $2")
            .bind(series_id)
            .bind(*t)
            .execute(&mut *conn)
            .await?;
    }
    Ok(stale.len() as u64)
}

pub(crate) async fn load_exceptions(
    conn: &mut SqliteConnection,
    series_id: Uuid,
) -> Result<Vec<ExceptionEvent>, CoreError> {
    let mut exceptions: Vec<ExceptionEvent> =
        sqlx::query_as("SELECT * FROM series_exceptions WHERE series_id = $1")
            .bind(series_id)
            .fetch_all(&mut *conn)
            .await?;
    exceptions.sort_by_key(|e| e.original_start);
    Ok(exceptions)
}

pub(crate) async fn find_exception(
    conn: &mut SqliteConnection,
    series_id: Uuid,
    at: DateTime<Utc>,
) -> Result<Option<ExceptionEvent>, CoreError> {
    let exception = sqlx::query_as("SELECT * FROM series_exceptions WHERE series_id = $1 AND original_start = $2")
        .bind(series_id)
        .bind(at)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(exception)
}

/// Upserts on `(series_id, original_start)`.
pub(crate) async fn save_exception(conn: &mut SqliteConnection, exception: &ExceptionEvent) -> Result<(), CoreError> {
    sqlx::query(
        r#"INSERT INTO series_exceptions (id, series_id, original_start, calendar_id, creator_id, title,
            description, location, timezone, is_all_day, start_time, end_time, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        ON CONFLICT (series_id, original_start) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            location = excluded.location,
            timezone = excluded.timezone,
            is_all_day = excluded.is_all_day,
            start_time = excluded.start_time,
            end_time = excluded.end_time,
            status = excluded.status,
            updated_at = excluded.updated_at"#,
    )
    .bind(exception.id)
    .bind(exception.series_id)
    .bind(exception.original_start)
    .bind(exception.calendar_id)
    .bind(exception.creator_id)
    .bind(&exception.title)
    .bind(&exception.description)
    .bind(&exception.location)
    .bind(&exception.timezone)
    .bind(exception.is_all_day)
    .bind(exception.start_time)
    .bind(exception.end_time)
    .bind(exception.status)
    .bind(exception.created_at)
    .bind(exception.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deletes the series' exception rows matching `predicate`.
pub(crate) async fn delete_exceptions_where<F>(
    conn: &mut SqliteConnection,
    series_id: Uuid,
    predicate: F,
) -> Result<u64, CoreError>
where
    F: Fn(&ExceptionEvent) -> bool + Send,
{
    let doomed: Vec<Uuid> = load_exceptions(conn, series_id)
        .await?
        .into_iter()
        .filter(|e| predicate(e))
        .map(|e| e.id)
        .collect();

    for id in &doomed {
        sqlx::query("DELETE FROM series_exceptions WHERE id = $1")
            .bind(*id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(doomed.len() as u64)
}
