use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use cadence_core::models::{EditOutcome, EventUpdates};
use cadence_core::repository::Repository;

use super::resolve_scope;
use crate::cli::EditCommand;
use crate::parser::{parse_optional, validate_timezone};
use crate::views::format_time;
use crate::views::table::display_occurrences;

fn clearable(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

pub async fn edit_series(repo: &impl Repository, command: EditCommand) -> Result<()> {
    let master = repo
        .load_master(command.id)
        .await?
        .with_context(|| format!("Series {} not found", command.id))?;

    let at = parse_optional(command.at.as_deref())?;
    let scope = resolve_scope(&master, command.scope, at, "edit")?;

    let updates = EventUpdates {
        title: command.title,
        description: clearable(command.description, command.description_clear),
        location: clearable(command.location, command.location_clear),
        start_time: parse_optional(command.start.as_deref())?,
        end_time: parse_optional(command.end.as_deref())?,
        is_all_day: command.all_day,
        timezone: command.timezone.map(|tz| validate_timezone(&tz)).transpose()?,
        status: command.status,
        recurrence_rule: clearable(command.rule, command.rule_clear),
    };
    if updates.is_empty() {
        println!("{}", "Nothing to change.".yellow());
        return Ok(());
    }

    let outcome = repo.apply_edit(command.id, scope, at, updates).await?;
    match &outcome {
        EditOutcome::Occurrence(exception) => println!(
            "✓ Updated occurrence {} of series {}",
            format_time(exception.original_start),
            exception.series_id
        ),
        EditOutcome::Split { previous, series } => {
            println!("✓ Series {} now ends before {}", previous.id, format_time(series.start_time));
            println!("✓ Created series {}", series.id);
        }
        EditOutcome::Series(master) => println!("✓ Updated series {}", master.id),
    }
    display_occurrences(&[outcome.affected_occurrence()], false);
    Ok(())
}
