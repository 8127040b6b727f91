use cadence_core::models::{EditScope, EventStatus};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Recurring events with per-occurrence exceptions and scoped edits
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path of the SQLite database (overrides configuration)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Create a new event series
    Create(CreateCommand),
    /// Show a series and its bookkeeping
    Show(ShowCommand),
    /// List the occurrences of a series in a window
    Expand(ExpandCommand),
    /// List the modified occurrences of a series
    Exceptions(ShowCommand),
    /// Edit one occurrence, this and following, or the whole series
    Edit(EditCommand),
    /// Delete one occurrence, this and following, or the whole series
    Delete(DeleteCommand),
    /// Bring back a deleted occurrence
    Restore(RestoreCommand),
    /// List the occurrences of every series in a calendar
    Calendar(CalendarCommand),
}

#[derive(Parser, Debug, Clone)]
pub struct CreateCommand {
    /// The title of the event
    pub title: String,
    /// Start of the first occurrence
    #[arg(long)]
    pub start: String,
    /// End of the first occurrence
    #[arg(long, conflicts_with = "duration")]
    pub end: Option<String>,
    /// Length of each occurrence in minutes
    #[arg(long)]
    pub duration: Option<i64>,
    /// Recurrence rule, e.g. "FREQ=WEEKLY;BYDAY=MO,WE"
    #[arg(long)]
    pub rule: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    #[arg(short, long)]
    pub location: Option<String>,
    /// IANA timezone name stored with the event
    #[arg(long)]
    pub timezone: Option<String>,
    #[arg(long)]
    pub all_day: bool,
    #[arg(long)]
    pub calendar: Option<Uuid>,
    #[arg(long)]
    pub creator: Option<Uuid>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<EventStatus>,
}

#[derive(Parser, Debug, Clone)]
pub struct ShowCommand {
    /// The series ID
    pub id: Uuid,
}

#[derive(Args, Debug, Clone)]
pub struct WindowArgs {
    /// Window start (defaults to now)
    #[arg(long)]
    pub from: Option<String>,
    /// Window end (defaults to the configured window length after the start)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ExpandCommand {
    /// The series ID
    pub id: Uuid,
    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct CalendarCommand {
    /// The calendar ID (defaults to the personal calendar)
    #[arg(long)]
    pub calendar: Option<Uuid>,
    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct EditCommand {
    /// The series ID
    pub id: Uuid,

    /// How to apply changes (this|thisAndFuture|all)
    #[arg(long, value_parser = parse_scope)]
    pub scope: Option<EditScope>,

    /// The occurrence being edited, as originally scheduled
    #[arg(long)]
    pub at: Option<String>,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, conflicts_with = "description")]
    pub description_clear: bool,

    #[arg(long)]
    pub location: Option<String>,
    #[arg(long, conflicts_with = "location")]
    pub location_clear: bool,

    #[arg(long)]
    pub start: Option<String>,
    #[arg(long)]
    pub end: Option<String>,

    #[arg(long)]
    pub all_day: Option<bool>,

    #[arg(long)]
    pub timezone: Option<String>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<EventStatus>,

    #[arg(long, help = "Replace the recurrence rule")]
    pub rule: Option<String>,
    #[arg(long, conflicts_with = "rule", help = "Stop the series from recurring")]
    pub rule_clear: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct DeleteCommand {
    /// The series ID
    pub id: Uuid,

    /// What to delete (this|thisAndFuture|all)
    #[arg(long, value_parser = parse_scope)]
    pub scope: Option<EditScope>,

    /// The occurrence being deleted, as originally scheduled
    #[arg(long)]
    pub at: Option<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct RestoreCommand {
    /// The series ID
    pub id: Uuid,
    /// The deleted occurrence
    #[arg(long)]
    pub at: String,
}

fn parse_scope(s: &str) -> Result<EditScope, String> {
    s.parse::<EditScope>().map_err(|e| e.to_string())
}

fn parse_status(s: &str) -> Result<EventStatus, String> {
    s.parse::<EventStatus>().map_err(|e| e.to_string())
}
