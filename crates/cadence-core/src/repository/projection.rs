use crate::error::CoreError;
use crate::models::Occurrence;
use crate::repository::exceptions::{keyed, load_exceptions};
use crate::repository::series::fetch_master;
use crate::repository::{SeriesRepository, SqliteRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    async fn expand(
        &self,
        series_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        let Some(master) = fetch_master(&mut conn, series_id).await? else {
            debug!(%series_id, "expand on missing series");
            return Ok(Vec::new());
        };
        let exceptions = keyed(load_exceptions(&mut conn, series_id).await?);

        Ok(self.projector().project(&master, &exceptions, window_start, window_end))
    }

    async fn expand_calendar(
        &self,
        calendar_id: Uuid,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CoreError> {
        let masters = self.find_series_in_range(calendar_id, window_start, window_end).await?;
        let mut conn = self.pool().acquire().await?;

        let mut occurrences = Vec::new();
        for master in &masters {
            let exceptions = keyed(load_exceptions(&mut conn, master.id).await?);
            occurrences.extend(self.projector().project(master, &exceptions, window_start, window_end));
        }
        occurrences.sort_by_key(|o| (o.start_time, o.series_id));

        debug!(%calendar_id, series = masters.len(), count = occurrences.len(), "expanded calendar");
        Ok(occurrences)
    }
}
