use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{trace, warn};

use crate::config::EngineConfig;
use crate::models::{ExceptionEvent, Occurrence, SeriesMaster};

/// Merges rule output with a series' exclusions and exception rows.
///
/// The projector is pure: it receives everything it needs from the caller
/// and never touches storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccurrenceProjector {
    max_occurrences: Option<usize>,
}

impl Default for OccurrenceProjector {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl OccurrenceProjector {
    /// `None` returns every occurrence in the window.
    pub fn new(max_occurrences: Option<usize>) -> Self {
        Self { max_occurrences }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.max_occurrences)
    }

    pub fn max_occurrences(&self) -> Option<usize> {
        self.max_occurrences
    }

    /// Projects `master` onto `[window_start, window_end]`.
    ///
    /// # Behavior
    ///
    /// - A master without a rule, or whose rule text no longer parses or
    ///   expand, is returned as a single occurrence when its start lies in
    ///   the window.
    /// - Excluded timestamps are dropped unless an exception row replaces
    ///   them, in which case the exception is emitted.
    /// - Output is ordered by the generated (original) timestamp, so a
    ///   moved exception keeps the position of the occurrence it replaces.
    pub fn project(
        &self,
        master: &SeriesMaster,
        exceptions: &BTreeMap<DateTime<Utc>, ExceptionEvent>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Vec<Occurrence> {
        let single = || -> Vec<Occurrence> {
            let in_window = master.start_time >= window_start && master.start_time <= window_end;
            in_window
                .then(|| Occurrence::single(master))
                .into_iter()
                .collect()
        };

        let rule = match master.rule() {
            None => return single(),
            Some(Ok(rule)) => rule,
            Some(Err(e)) => {
                warn!(
                    series_id = %master.id,
                    error = %e,
                    "stored recurrence rule does not parse, showing the master only"
                );
                return single();
            }
        };

        if let Err(e) = rule.validate(master.start_time) {
            warn!(
                series_id = %master.id,
                error = %e,
                "stored recurrence rule cannot be expanded, showing the master only"
            );
            return single();
        }

        let limit = self.max_occurrences.unwrap_or(usize::MAX);
        let mut occurrences: Vec<Occurrence> = rule
            .occurrences(master.start_time, window_start, window_end)
            .filter_map(|at| match exceptions.get(&at) {
                Some(exception) => Some(Occurrence::from_exception(exception)),
                None if master.is_excluded(at) => None,
                None => Some(Occurrence::generated(master, at)),
            })
            .take(limit.saturating_add(1))
            .collect();
        if occurrences.len() > limit {
            occurrences.truncate(limit);
            warn!(
                series_id = %master.id,
                limit,
                %window_end,
                "expansion reached max_occurrences, later occurrences omitted"
            );
        }

        trace!(
            series_id = %master.id,
            count = occurrences.len(),
            "projected series"
        );
        occurrences
    }
}
