use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use comfy_table::{Attribute, Cell, Color, Row, Table};
use cadence_core::models::{EventStatus, ExceptionEvent, Occurrence, OccurrenceKind, SeriesMaster};
use owo_colors::OwoColorize;

use super::format_time;

fn status_cell(status: EventStatus) -> Cell {
    let cell = Cell::new(status.to_string());
    match status {
        EventStatus::Confirmed => cell.fg(Color::Green),
        EventStatus::Tentative => cell.fg(Color::Yellow),
        EventStatus::Cancelled => cell.fg(Color::DarkGrey).add_attribute(Attribute::CrossedOut),
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub fn display_occurrences(occurrences: &[Occurrence], with_series: bool) {
    if occurrences.is_empty() {
        println!("No occurrences found.");
        return;
    }

    let mut table = Table::new();
    let mut header = vec!["Start", "End", "Title", "Location", "Status"];
    if with_series {
        header.push("Series");
    }
    table.set_header(header);

    for occurrence in occurrences {
        let mut row = Row::new();
        row.add_cell(Cell::new(format_time(occurrence.start_time)));
        row.add_cell(Cell::new(format_time(occurrence.end_time)));

        let title_cell = match occurrence.kind {
            OccurrenceKind::Virtual => Cell::new(format!("↻ {}", occurrence.title)),
            OccurrenceKind::Exception { .. } => {
                let mut text = format!("✎ {}", occurrence.title);
                if occurrence.start_time != occurrence.original_start {
                    text.push_str(&format!(" (was {})", format_time(occurrence.original_start)));
                }
                Cell::new(text).fg(Color::Cyan)
            }
            OccurrenceKind::Master => Cell::new(&occurrence.title),
        };
        row.add_cell(title_cell);
        row.add_cell(Cell::new(occurrence.location.as_deref().unwrap_or("-")));
        row.add_cell(status_cell(occurrence.status));
        if with_series {
            row.add_cell(Cell::new(short_id(&occurrence.series_id)));
        }
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_exceptions(exceptions: &[ExceptionEvent]) {
    if exceptions.is_empty() {
        println!("No modified occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Occurrence", "Start", "End", "Title", "Location", "Status"]);

    for exception in exceptions {
        let mut row = Row::new();
        row.add_cell(Cell::new(format_time(exception.original_start)));
        row.add_cell(Cell::new(format_time(exception.start_time)));
        row.add_cell(Cell::new(format_time(exception.end_time)));
        row.add_cell(Cell::new(&exception.title));
        row.add_cell(Cell::new(exception.location.as_deref().unwrap_or("-")));
        row.add_cell(status_cell(exception.status));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_series(master: &SeriesMaster, next: Option<DateTime<Utc>>) {
    println!("{} {}", "Series".bold(), master.id);
    println!("  Title:     {}", master.title);
    if let Some(description) = &master.description {
        println!("  About:     {}", description);
    }
    if let Some(location) = &master.location {
        println!("  Location:  {}", location);
    }
    println!(
        "  First:     {} - {} ({})",
        format_time(master.start_time),
        format_time(master.end_time),
        master.timezone
    );
    println!(
        "  Rule:      {}",
        master.recurrence_rule.as_deref().unwrap_or("does not repeat")
    );
    println!("  Status:    {}", master.status);
    if master.is_all_day {
        println!("  All day");
    }
    match next {
        Some(next) => println!("  Next:      {} ({})", format_time(next), next.humanize()),
        None => println!("  Next:      {}", "none".dimmed()),
    }
    if !master.excluded.is_empty() {
        let excluded: Vec<String> = master.excluded.iter().map(|t| format_time(*t)).collect();
        println!("  Excluded:  {}", excluded.join(", "));
    }
}
