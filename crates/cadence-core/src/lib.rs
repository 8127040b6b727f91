//! # Cadence Core Library
//!
//! The recurring-event engine behind Cadence calendars. A repeating event is
//! stored as one master row with a compact recurrence rule plus a small set
//! of per-occurrence overrides, and is expanded into concrete occurrences on
//! demand.
//!
//! ## Core Modules
//!
//! - [`recurrence`]: Rule parsing, serialization and windowed expansion
//! - [`projection`]: Merges rule output with exclusions and overrides
//! - [`repository`]: SQLite storage, exception bookkeeping and scoped edits
//! - [`models`]: Series, exception and occurrence types
//! - [`db`]: Database connection and migration management
//! - [`config`]: Layered engine configuration
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db, models::{EditScope, EventUpdates, NewSeriesData},
//!     projection::OccurrenceProjector,
//!     repository::{OccurrenceRepository, SeriesEditor, SeriesRepository, SqliteRepository},
//! };
//! use chrono::{Duration, TimeZone, Utc};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let pool = db::establish_connection("calendar.db").await?;
//!     let repo = SqliteRepository::new(pool, OccurrenceProjector::default());
//!
//!     let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
//!     let series = repo
//!         .create_series(NewSeriesData {
//!             title: "Standup".to_string(),
//!             start_time: start,
//!             end_time: start + Duration::minutes(15),
//!             recurrence_rule: Some("FREQ=WEEKLY;BYDAY=MO,WE,FR".to_string()),
//!             ..Default::default()
//!         })
//!         .await?;
//!
//!     // Move one meeting to the afternoon.
//!     let updates = EventUpdates {
//!         start_time: Some(start + Duration::hours(5)),
//!         ..Default::default()
//!     };
//!     repo.apply_edit(series.id, EditScope::This, Some(start), updates).await?;
//!
//!     for occurrence in repo.expand(series.id, start, start + Duration::days(14)).await? {
//!         println!("{} {}", occurrence.start_time, occurrence.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod projection;
pub mod recurrence;
pub mod repository;
