use crate::error::CoreError;
use crate::models::{DeleteOutcome, EditOutcome, EditScope, EventUpdates, SeriesMaster};
use crate::repository::exceptions::{
    delete_exceptions_where, delete_exclusions_at_or_after, ensure_occurrence, insert_exclusion,
    override_occurrence, recurring_rule,
};
use crate::repository::series::{delete_master, insert_master, normalize_rule, require_master, save_master};
use crate::repository::{validate_times, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info};
use uuid::Uuid;

#[async_trait]
impl super::SeriesEditor for SqliteRepository {
    async fn apply_edit(
        &self,
        series_id: Uuid,
        scope: EditScope,
        anchor: Option<DateTime<Utc>>,
        updates: EventUpdates,
    ) -> Result<EditOutcome, CoreError> {
        debug!(%series_id, %scope, ?anchor, "applying edit");
        match scope {
            EditScope::This => {
                let at = anchor.ok_or(CoreError::AnchorRequired(scope))?;
                self.edit_occurrence(series_id, at, &updates).await
            }
            EditScope::ThisAndFuture => {
                let at = anchor.ok_or(CoreError::AnchorRequired(scope))?;
                self.split_series(series_id, at, &updates).await
            }
            EditScope::All => self.edit_series(series_id, &updates).await,
        }
    }

    /// `deleted_count` is, per scope: the hidden occurrence plus any removed
    /// override for `This`, the removed overrides for `ThisAndFuture`, and
    /// the master plus its overrides for `All`.
    async fn apply_delete(
        &self,
        series_id: Uuid,
        scope: EditScope,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<DeleteOutcome, CoreError> {
        debug!(%series_id, %scope, ?anchor, "applying delete");
        let deleted_count = match scope {
            EditScope::This => {
                let at = anchor.ok_or(CoreError::AnchorRequired(scope))?;
                self.delete_occurrence(series_id, at).await?
            }
            EditScope::ThisAndFuture => {
                let at = anchor.ok_or(CoreError::AnchorRequired(scope))?;
                self.delete_following(series_id, at).await?
            }
            EditScope::All => self.delete_series(series_id).await?,
        };

        info!(%series_id, %scope, deleted_count, "deleted from series");
        Ok(DeleteOutcome {
            series_id,
            scope,
            deleted_count,
        })
    }
}

impl SqliteRepository {
    async fn edit_occurrence(
        &self,
        series_id: Uuid,
        at: DateTime<Utc>,
        updates: &EventUpdates,
    ) -> Result<EditOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;
        let master = require_master(&mut tx, series_id).await?;
        let exception = override_occurrence(&mut tx, &master, at, updates).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        info!(%series_id, at = %exception.original_start, exception_id = %exception.id, "edited occurrence");
        Ok(EditOutcome::Occurrence(exception))
    }

    /// Ends the series right before `at` and continues it as a new series
    /// carrying `updates`.
    ///
    /// # Behavior
    ///
    /// - The old master keeps its id and every occurrence before `at`.
    /// - Its overrides and exclusions at or after `at` are removed; the
    ///   truncated rule can no longer produce them.
    /// - The new series starts at `updates.start_time` or `at`. Without an
    ///   explicit rule it inherits the old rule with the remaining `COUNT`.
    /// - Both writes share one transaction; any failure leaves the old
    ///   series untouched.
    async fn split_series(
        &self,
        series_id: Uuid,
        at: DateTime<Utc>,
        updates: &EventUpdates,
    ) -> Result<EditOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut previous = require_master(&mut tx, series_id).await?;
        let rule = recurring_rule(&previous)?;
        let at = ensure_occurrence(&previous, &rule, at)?;
        let now = Utc::now().trunc_subsecs(0);


        previous.recurrence_rule = Some(rule.truncate(previous.start_time, at).to_string());
        previous.updated_at = now;
        save_master(&mut tx, &previous).await?;
        let pruned_exceptions = delete_exceptions_where(&mut tx, series_id, |e| e.original_start >= at).await?;
        let pruned_exclusions = delete_exclusions_at_or_after(&mut tx, series_id, at).await?;
        previous.excluded.retain(|t| *t < at);

        let start_time = updates.start_time.map(|t| t.trunc_subsecs(0)).unwrap_or(at);
        let end_time = updates
            .end_time
            .map(|t| t.trunc_subsecs(0))
            .unwrap_or(start_time + previous.duration());
        validate_times(start_time, end_time)?;
        let continued_rule = match &updates.recurrence_rule {
            Some(text) => normalize_rule(text.as_deref(), start_time)?,
            None => Some(rule.rebase(previous.start_time, at).to_string()),
        };

        let series = SeriesMaster {
            id: Uuid::now_v7(),
            calendar_id: previous.calendar_id,
            creator_id: previous.creator_id,
            title: updates.title.clone().unwrap_or_else(|| previous.title.clone()),
            description: updates.description.clone().unwrap_or_else(|| previous.description.clone()),
            location: updates.location.clone().unwrap_or_else(|| previous.location.clone()),
            timezone: updates.timezone.clone().unwrap_or_else(|| previous.timezone.clone()),
            is_all_day: updates.is_all_day.unwrap_or(previous.is_all_day),
            start_time,
            end_time,
            recurrence_rule: continued_rule,
            status: updates.status.unwrap_or(previous.status),
            created_at: now,
            updated_at: now,
            excluded: Default::default(),
        };
        insert_master(&mut tx, &series).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        info!(
            %series_id,
            new_series_id = %series.id,
            %at,
            pruned_exceptions,
            pruned_exclusions,
            "split series"
        );
        Ok(EditOutcome::Split { previous, series })
    }

    /// Updates the master in place. Anchor times are never moved and
    /// existing overrides keep their own field values.
    async fn edit_series(&self, series_id: Uuid, updates: &EventUpdates) -> Result<EditOutcome, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut master = require_master(&mut tx, series_id).await?;

        if updates.start_time.is_some() || updates.end_time.is_some() {
            debug!(%series_id, "ignoring anchor time changes on a whole-series edit");
        }
        if let Some(text) = &updates.recurrence_rule {
            master.recurrence_rule = normalize_rule(text.as_deref(), master.start_time)?;
        }
        if let Some(title) = &updates.title {
            master.title = title.clone();
        }
        if let Some(description) = &updates.description {
            master.description = description.clone();
        }
        if let Some(location) = &updates.location {
            master.location = location.clone();
        }
        if let Some(timezone) = &updates.timezone {
            master.timezone = timezone.clone();
        }
        if let Some(is_all_day) = updates.is_all_day {
            master.is_all_day = is_all_day;
        }
        if let Some(status) = updates.status {
            master.status = status;
        }
        master.updated_at = Utc::now().trunc_subsecs(0);

        save_master(&mut tx, &master).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        info!(%series_id, rule = ?master.recurrence_rule, "edited series");
        Ok(EditOutcome::Series(master))
    }

    async fn delete_occurrence(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        let master = require_master(&mut tx, series_id).await?;
        let rule = recurring_rule(&master)?;
        let at = ensure_occurrence(&master, &rule, at)?;

        let removed = delete_exceptions_where(&mut tx, series_id, |e| e.original_start == at).await?;
        let newly_hidden = insert_exclusion(&mut tx, series_id, at).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        let hidden = u64::from(newly_hidden || removed > 0);
        Ok(hidden + removed)
    }

    async fn delete_following(&self, series_id: Uuid, at: DateTime<Utc>) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        let mut master = require_master(&mut tx, series_id).await?;
        let rule = recurring_rule(&master)?;
        let at = ensure_occurrence(&master, &rule, at)?;

        master.recurrence_rule = Some(rule.truncate(master.start_time, at).to_string());
        master.updated_at = Utc::now().trunc_subsecs(0);
        save_master(&mut tx, &master).await?;
        let removed = delete_exceptions_where(&mut tx, series_id, |e| e.original_start >= at).await?;
        delete_exclusions_at_or_after(&mut tx, series_id, at).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        Ok(removed)
    }

    async fn delete_series(&self, series_id: Uuid) -> Result<u64, CoreError> {
        let mut tx = self.pool().begin().await?;
        require_master(&mut tx, series_id).await?;

        let removed = delete_exceptions_where(&mut tx, series_id, |_| true).await?;
        sqlx::query("DELETE FROM series_exclusions WHERE series_id = $1")
            .bind(series_id)
            .execute(&mut *tx)
            .await?;
        let masters = delete_master(&mut tx, series_id).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        Ok(masters + removed)
    }
}
