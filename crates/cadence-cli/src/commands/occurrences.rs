use anyhow::Result;
use cadence_core::repository::Repository;
use tracing::debug;
use uuid::Uuid;

use super::resolve_window;
use crate::cli::{CalendarCommand, ExpandCommand};
use crate::config::Config;
use crate::views::table::display_occurrences;

pub async fn expand_series(repo: &impl Repository, command: ExpandCommand, config: &Config) -> Result<()> {
    let (start, end) = resolve_window(&command.window, config.default_window_days)?;
    debug!(series_id = %command.id, %start, %end, "expanding series");

    if repo.load_master(command.id).await?.is_none() {
        anyhow::bail!("Series {} not found", command.id);
    }
    let occurrences = repo.expand(command.id, start, end).await?;
    display_occurrences(&occurrences, false);
    Ok(())
}

pub async fn show_calendar(repo: &impl Repository, command: CalendarCommand, config: &Config) -> Result<()> {
    let (start, end) = resolve_window(&command.window, config.default_window_days)?;
    let calendar_id = command.calendar.unwrap_or_else(Uuid::nil);

    let occurrences = repo.expand_calendar(calendar_id, start, end).await?;
    display_occurrences(&occurrences, true);
    Ok(())
}
