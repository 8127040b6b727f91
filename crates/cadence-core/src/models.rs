use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::recurrence::{Rule, RuleParseError};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Confirmed => write!(f, "confirmed"),
            EventStatus::Tentative => write!(f, "tentative"),
            EventStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid event status: {0}")]
pub struct ParseEventStatusError(String);

impl FromStr for EventStatus {
    type Err = ParseEventStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(EventStatus::Confirmed),
            "tentative" => Ok(EventStatus::Tentative),
            "cancelled" | "canceled" => Ok(EventStatus::Cancelled),
            _ => Err(ParseEventStatusError(s.to_string())),
        }
    }
}

// ============================================================================
// Series Models
// ============================================================================

/// The canonical row of a recurring event.
///
/// `start_time`/`end_time` describe the first occurrence: the start is the
/// anchor the rule is evaluated from and the difference is the duration every
/// generated occurrence inherits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SeriesMaster {
    pub id: Uuid,
    pub calendar_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
    pub is_all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Occurrence timestamps hidden from the raw rule. Stored in
    /// `series_exclusions`, loaded alongside the row.
    #[sqlx(skip)]
    #[serde(default)]
    pub excluded: BTreeSet<DateTime<Utc>>,
}

impl SeriesMaster {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Parses the stored rule text. `None` for a non-recurring master.
    pub fn rule(&self) -> Option<Result<Rule, RuleParseError>> {
        self.recurrence_rule.as_deref().map(str::parse)
    }

    pub fn is_excluded(&self, at: DateTime<Utc>) -> bool {
        self.excluded.contains(&at)
    }
}

/// A concrete row overriding one occurrence of a series.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExceptionEvent {
    pub id: Uuid,
    /// Lookup key of the owning series; the row is not cascade-owned by it.
    pub series_id: Uuid,
    /// The generated timestamp this row replaces.
    pub original_start: DateTime<Utc>,
    pub calendar_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
    pub is_all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSeriesData {
    pub calendar_id: Uuid,
    pub creator_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
    pub is_all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub recurrence_rule: Option<String>,
    pub status: EventStatus,
}

impl Default for NewSeriesData {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            calendar_id: Uuid::nil(),
            creator_id: Uuid::nil(),
            title: String::new(),
            description: None,
            location: None,
            timezone: "UTC".to_string(),
            is_all_day: false,
            start_time: now,
            end_time: now + Duration::hours(1),
            recurrence_rule: None,
            status: EventStatus::default(),
        }
    }
}

/// Partial update applied by the series editor.
///
/// `Option<Option<T>>` fields distinguish "leave alone" (`None`) from
/// "clear" (`Some(None)`).
#[derive(Debug, Clone, Default)]
pub struct EventUpdates {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_all_day: Option<bool>,
    pub timezone: Option<String>,
    pub status: Option<EventStatus>,
    /// Ignored by single-occurrence edits; exceptions never recur.
    pub recurrence_rule: Option<Option<String>>,
}

impl EventUpdates {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.is_all_day.is_none()
            && self.timezone.is_none()
            && self.status.is_none()
            && self.recurrence_rule.is_none()
    }
}

// ============================================================================
// Projection Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OccurrenceKind {
    /// Generated from the rule with master fields.
    Virtual,
    /// Replaced by a stored exception row.
    Exception { exception_id: Uuid },
    /// The master itself; the series has no usable rule.
    Master,
}

/// One instance of a series as shown to a caller. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub series_id: Uuid,
    /// Instance key: the timestamp the rule produced for this occurrence.
    pub original_start: DateTime<Utc>,
    pub kind: OccurrenceKind,
    pub calendar_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub timezone: String,
    pub is_all_day: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
}

impl Occurrence {
    pub fn generated(master: &SeriesMaster, at: DateTime<Utc>) -> Self {
        Self {
            series_id: master.id,
            original_start: at,
            kind: OccurrenceKind::Virtual,
            calendar_id: master.calendar_id,
            title: master.title.clone(),
            description: master.description.clone(),
            location: master.location.clone(),
            timezone: master.timezone.clone(),
            is_all_day: master.is_all_day,
            start_time: at,
            end_time: at + master.duration(),
            status: master.status,
        }
    }

    pub fn single(master: &SeriesMaster) -> Self {
        Self {
            kind: OccurrenceKind::Master,
            ..Self::generated(master, master.start_time)
        }
    }

    pub fn from_exception(exception: &ExceptionEvent) -> Self {
        Self {
            series_id: exception.series_id,
            original_start: exception.original_start,
            kind: OccurrenceKind::Exception {
                exception_id: exception.id,
            },
            calendar_id: exception.calendar_id,
            title: exception.title.clone(),
            description: exception.description.clone(),
            location: exception.location.clone(),
            timezone: exception.timezone.clone(),
            is_all_day: exception.is_all_day,
            start_time: exception.start_time,
            end_time: exception.end_time,
            status: exception.status,
        }
    }

    pub fn is_modified(&self) -> bool {
        matches!(self.kind, OccurrenceKind::Exception { .. })
    }
}

// ============================================================================
// Editing Models
// ============================================================================

/// Which occurrences of a series an edit or delete applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditScope {
    /// Only the selected occurrence
    This,
    /// The selected occurrence and every later one
    ThisAndFuture,
    /// Every occurrence, past and future
    All,
}

impl std::fmt::Display for EditScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditScope::This => write!(f, "this"),
            EditScope::ThisAndFuture => write!(f, "thisAndFuture"),
            EditScope::All => write!(f, "all"),
        }
    }
}

impl FromStr for EditScope {
    type Err = ParseEditScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "this" | "occurrence" => Ok(EditScope::This),
            "thisandfuture" | "this_and_future" | "future" => Ok(EditScope::ThisAndFuture),
            "all" | "series" => Ok(EditScope::All),
            _ => Err(ParseEditScopeError(s.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid edit scope: {0}")]
pub struct ParseEditScopeError(pub String);

#[derive(Debug, Clone)]
pub enum EditOutcome {
    /// A single occurrence was overridden.
    Occurrence(ExceptionEvent),
    /// The series was split: `previous` now ends before the edited
    /// occurrence, `series` continues from it.
    Split {
        previous: SeriesMaster,
        series: SeriesMaster,
    },
    /// The whole series was updated in place.
    Series(SeriesMaster),
}

impl EditOutcome {
    /// The edited occurrence as it now appears: the override for a
    /// single-occurrence edit, otherwise the first occurrence of the series
    /// that carries the changes.
    pub fn affected_occurrence(&self) -> Occurrence {
        match self {
            EditOutcome::Occurrence(exception) => Occurrence::from_exception(exception),
            EditOutcome::Split { series, .. } => Occurrence::generated(series, series.start_time),
            EditOutcome::Series(master) if master.recurrence_rule.is_some() => {
                Occurrence::generated(master, master.start_time)
            }
            EditOutcome::Series(master) => Occurrence::single(master),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub series_id: Uuid,
    pub scope: EditScope,
    /// Stored rows removed plus occurrences newly hidden. The exact
    /// accounting per scope is documented on `SeriesEditor::apply_delete`.
    pub deleted_count: u64,
}
