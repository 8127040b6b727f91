pub mod delete;
pub mod edit;
pub mod occurrences;
pub mod series;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dialoguer::Select;
use owo_colors::OwoColorize;
use cadence_core::models::{EditScope, SeriesMaster};

use crate::cli::WindowArgs;
use crate::parser::parse_datetime;
use crate::views::format_time;

/// Resolves `--from`/`--to`, defaulting to now and `default_days` after the start.
pub fn resolve_window(window: &WindowArgs, default_days: i64) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = match &window.from {
        Some(from) => parse_datetime(from)?,
        None => Utc::now(),
    };
    let end = match &window.to {
        Some(to) => parse_datetime(to)?,
        None => start + Duration::days(default_days),
    };
    if end < start {
        anyhow::bail!("Window end {} is before its start {}", format_time(end), format_time(start));
    }
    Ok((start, end))
}

/// Picks the scope of an edit or delete. A series that does not repeat is
/// always edited as a whole; otherwise the user is asked unless `--scope`
/// was given.
pub fn resolve_scope(
    master: &SeriesMaster,
    requested: Option<EditScope>,
    at: Option<DateTime<Utc>>,
    verb: &str,
) -> Result<EditScope> {
    if let Some(scope) = requested {
        return Ok(scope);
    }
    if master.recurrence_rule.is_none() {
        return Ok(EditScope::All);
    }

    let this_label = match at {
        Some(at) => format!("This occurrence only ({})", format_time(at)),
        None => "This occurrence only".to_string(),
    };
    let options = vec![
        this_label,
        "This and following occurrences".to_string(),
        "All occurrences".to_string(),
    ];

    println!("{}", "This event is part of a recurring series.".yellow());
    let selection = Select::new()
        .with_prompt(format!("Which occurrences do you want to {}?", verb))
        .items(&options)
        .default(0)
        .interact()?;

    Ok(match selection {
        0 => EditScope::This,
        1 => EditScope::ThisAndFuture,
        _ => EditScope::All,
    })
}
