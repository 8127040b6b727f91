use anyhow::{Context, Result};
use cadence_core::models::EditScope;
use cadence_core::repository::Repository;
use dialoguer::Confirm;

use super::resolve_scope;
use crate::cli::{DeleteCommand, RestoreCommand};
use crate::parser::{parse_datetime, parse_optional};
use crate::views::format_time;

pub async fn delete_series(repo: &impl Repository, command: DeleteCommand) -> Result<()> {
    let master = repo
        .load_master(command.id)
        .await?
        .with_context(|| format!("Series {} not found", command.id))?;

    let at = parse_optional(command.at.as_deref())?;
    let scope = resolve_scope(&master, command.scope, at, "delete")?;

    if scope == EditScope::All && !command.force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete every occurrence of '{}'?", master.title))
            .default(false)
            .interact()
            .unwrap_or(false);
        if !confirmed {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let outcome = repo.apply_delete(command.id, scope, at).await?;
    match outcome.scope {
        EditScope::All => println!("✓ Deleted series {}", outcome.series_id),
        EditScope::This | EditScope::ThisAndFuture => println!(
            "✓ Deleted from series {} ({} removed)",
            outcome.series_id, outcome.deleted_count
        ),
    }
    Ok(())
}

pub async fn restore_occurrence(repo: &impl Repository, command: RestoreCommand) -> Result<()> {
    let at = parse_datetime(&command.at)?;
    if repo.unmark_excluded(command.id, at).await? {
        println!("✓ Restored occurrence {}", format_time(at));
    } else {
        println!("Occurrence {} was not deleted.", format_time(at));
    }
    Ok(())
}
