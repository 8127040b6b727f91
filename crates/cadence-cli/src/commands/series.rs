use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use cadence_core::models::NewSeriesData;
use cadence_core::repository::Repository;
use uuid::Uuid;

use crate::cli::{CreateCommand, ShowCommand};
use crate::config::Config;
use crate::parser::{parse_datetime, validate_timezone};
use crate::views::table::{display_exceptions, display_series};

const DEFAULT_DURATION_MINUTES: i64 = 60;

pub async fn create_series(repo: &impl Repository, command: CreateCommand, config: &Config) -> Result<()> {
    let start_time = parse_datetime(&command.start)?;
    let end_time = match (&command.end, command.duration) {
        (Some(end), _) => parse_datetime(end)?,
        (None, Some(minutes)) => start_time + Duration::minutes(minutes),
        (None, None) => start_time + Duration::minutes(DEFAULT_DURATION_MINUTES),
    };
    let timezone = validate_timezone(command.timezone.as_deref().unwrap_or(&config.default_timezone))?;

    let data = NewSeriesData {
        calendar_id: command.calendar.unwrap_or_else(Uuid::nil),
        creator_id: command.creator.unwrap_or_else(Uuid::nil),
        title: command.title,
        description: command.description,
        location: command.location,
        timezone,
        is_all_day: command.all_day,
        start_time,
        end_time,
        recurrence_rule: command.rule,
        status: command.status.unwrap_or_default(),
    };

    let series = repo.create_series(data).await?;
    println!("✓ Created series {}", series.id);
    match &series.recurrence_rule {
        Some(rule) => println!("  Repeats {}", rule),
        None => println!("  Does not repeat"),
    }
    Ok(())
}

pub async fn show_series(repo: &impl Repository, command: ShowCommand) -> Result<()> {
    let master = repo
        .load_master(command.id)
        .await?
        .with_context(|| format!("Series {} not found", command.id))?;

    let now = Utc::now();
    let next = repo
        .expand(master.id, now, now + Duration::days(366))
        .await?
        .first()
        .map(|occurrence| occurrence.start_time);

    display_series(&master, next);
    Ok(())
}

pub async fn list_exceptions(repo: &impl Repository, command: ShowCommand) -> Result<()> {
    let exceptions = repo.list_exceptions(command.id).await?;
    display_exceptions(&exceptions);
    Ok(())
}
