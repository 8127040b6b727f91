use crate::error::CoreError;
use crate::models::{NewSeriesData, SeriesMaster};
use crate::recurrence::Rule;
use crate::repository::exceptions::load_exclusions;
use crate::repository::{validate_times, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

#[async_trait]
impl super::SeriesRepository for SqliteRepository {
    async fn create_series(&self, data: NewSeriesData) -> Result<SeriesMaster, CoreError> {
        if data.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Series title cannot be empty".to_string()));
        }
        let start_time = data.start_time.trunc_subsecs(0);
        let end_time = data.end_time.trunc_subsecs(0);
        validate_times(start_time, end_time)?;

        let now = Utc::now().trunc_subsecs(0);
        let master = SeriesMaster {
            id: Uuid::now_v7(),
            calendar_id: data.calendar_id,
            creator_id: data.creator_id,
            title: data.title,
            description: data.description,
            location: data.location,
            timezone: data.timezone,
            is_all_day: data.is_all_day,
            start_time,
            end_time,
            recurrence_rule: normalize_rule(data.recurrence_rule.as_deref(), start_time)?,
            status: data.status,
            created_at: now,
            updated_at: now,
            excluded: Default::default(),
        };

        let mut tx = self.pool().begin().await?;
        insert_master(&mut tx, &master).await?;
        tx.commit().await.map_err(CoreError::TransactionFailure)?;

        info!(series_id = %master.id, rule = ?master.recurrence_rule, "created series");
        Ok(master)
    }

    async fn load_master(&self, id: Uuid) -> Result<Option<SeriesMaster>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        fetch_master(&mut conn, id).await
    }

    async fn find_series_in_range(
        &self,
        calendar_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesMaster>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        let mut masters: Vec<SeriesMaster> = sqlx::query_as(
            r#"SELECT * FROM series_masters
            WHERE calendar_id = $1 AND start_time <= $2 AND (recurrence_rule IS NOT NULL OR end_time >= $3)
            ORDER BY start_time"#,
        )
        .bind(calendar_id)
        .bind(end)
        .bind(start.trunc_subsecs(0))
        .fetch_all(&mut *conn)
        .await?;

        for master in &mut masters {
            master.excluded = load_exclusions(&mut conn, master.id).await?;
        }
        Ok(masters)
    }
}

/// Parses rule text, checks that it expands from `anchor` and returns its
/// canonical form.
pub(crate) fn normalize_rule(text: Option<&str>, anchor: DateTime<Utc>) -> Result<Option<String>, CoreError> {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            let rule = text.parse::<Rule>()?;
            rule.validate(anchor)?;
            Ok(Some(rule.to_string()))
        }
        None => Ok(None),
    }
}

// ============================================================================
// Connection-level helpers shared by the repository modules
// ============================================================================

pub(crate) async fn fetch_master(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<SeriesMaster>, CoreError> {
    let master: Option<SeriesMaster> = sqlx::query_as("SELECT * FROM series_masters WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match master {
        Some(mut master) => {
            master.excluded = load_exclusions(conn, id).await?;
            Ok(Some(master))
        }
        None => Ok(None),
    }
}

pub(crate) async fn require_master(conn: &mut SqliteConnection, id: Uuid) -> Result<SeriesMaster, CoreError> {
    fetch_master(conn, id).await?.ok_or(CoreError::SeriesNotFound(id))
}

pub(crate) async fn insert_master(conn: &mut SqliteConnection, master: &SeriesMaster) -> Result<(), CoreError> {
    sqlx::query(
        r#"INSERT INTO series_masters (id, calendar_id, creator_id, title, description, location, timezone,
            is_all_day, start_time, end_time, recurrence_rule, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"#,
    )
    .bind(master.id)
    .bind(master.calendar_id)
    .bind(master.creator_id)
    .bind(&master.title)
    .bind(&master.description)
    .bind(&master.location)
    .bind(&master.timezone)
    .bind(master.is_all_day)
    .bind(master.start_time)
    .bind(master.end_time)
    .bind(&master.recurrence_rule)
    .bind(master.status)
    .bind(master.created_at)
    .bind(master.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Writes every mutable column of `master`. The excluded set is stored
/// separately and is not touched.
pub(crate) async fn save_master(conn: &mut SqliteConnection, master: &SeriesMaster) -> Result<(), CoreError> {
    let result = sqlx::query(
        r#"UPDATE series_masters SET title = $1, description = $2, location = $3, timezone = $4,
            is_all_day = $5, start_time = $6, end_time = $7, recurrence_rule = $8, status = $9, updated_at = $10
        WHERE id = $11"#,
    )
    .bind(&master.title)
    .bind(&master.description)
    .bind(&master.location)
    .bind(&master.timezone)
    .bind(master.is_all_day)
    .bind(master.start_time)
    .bind(master.end_time)
    .bind(&master.recurrence_rule)
    .bind(master.status)
    .bind(master.updated_at)
    .bind(master.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::SeriesNotFound(master.id));
    }
    Ok(())
}

/// Removes the master row. Its exclusions go with it; exception rows do not.
pub(crate) async fn delete_master(conn: &mut SqliteConnection, id: Uuid) -> Result<u64, CoreError> {
    let result = sqlx::query("DELETE FROM series_masters WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;

    fn anchor() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn normalize_rule_canonicalizes_text() {
        assert_eq!(
            normalize_rule(Some(" rrule:freq=weekly;byday=fr,mo;interval=1 "), anchor()).unwrap(),
            Some("FREQ=WEEKLY;BYDAY=FR,MO".to_string())
        );
        assert_eq!(normalize_rule(Some("   "), anchor()).unwrap(), None);
        assert_eq!(normalize_rule(None, anchor()).unwrap(), None);
    }

    #[test]
    fn normalize_rule_rejects_garbage() {
        assert!(matches!(
            normalize_rule(Some("FREQ=FORTNIGHTLY"), anchor()),
            Err(CoreError::RuleParse(_))
        ));
        assert!(matches!(
            normalize_rule(Some("FREQ=DAILY;INTERVAL=100000000;COUNT=3"), anchor()),
            Err(CoreError::RuleParse(_))
        ));
    }
}
