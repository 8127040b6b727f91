use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SubsecRound, Utc, Weekday};
use rrule::{RRuleSet, Tz as RRuleTz};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Basic ISO form used by `UNTIL` and `DTSTART`.
const BASIC_UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";
/// Dates fetched from the rrule iterator per page while streaming a window.
const PAGE_SIZE: u16 = 256;
/// Largest `INTERVAL` the expander can evaluate.
pub const MAX_INTERVAL: u32 = u16::MAX as u32;

/// Errors raised while parsing the textual form of a recurrence rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("Recurrence rule is empty")]
    Empty,

    #[error("Malformed rule part '{0}', expected KEY=VALUE")]
    MalformedPart(String),

    #[error("Unknown rule key '{0}'")]
    UnknownKey(String),

    #[error("Rule key '{0}' appears more than once")]
    DuplicateKey(String),

    #[error("Rule is missing FREQ")]
    MissingFrequency,

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("BYDAY is only supported for weekly rules")]
    WeekdaysRequireWeekly,

    #[error("COUNT and UNTIL are mutually exclusive")]
    CountAndUntil,

    #[error("Rule cannot be expanded: {0}")]
    Unexpandable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DAILY" => Ok(Frequency::Daily),
            "WEEKLY" => Ok(Frequency::Weekly),
            "MONTHLY" => Ok(Frequency::Monthly),
            "YEARLY" => Ok(Frequency::Yearly),
            _ => Err(RuleParseError::InvalidValue {
                key: "FREQ",
                value: s.to_string(),
            }),
        }
    }
}

/// How a series ends. Absent termination means the series is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Count(u32),
    Until(DateTime<Utc>),
}

/// A structured recurrence rule: `FREQ`, `INTERVAL`, `BYDAY` and an optional
/// `COUNT`/`UNTIL` bound.
///
/// A rule carries no start instant of its own. Every evaluation takes the
/// series anchor explicitly, which is what lets a split reuse the same rule
/// against a different anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    frequency: Frequency,
    interval: u32,
    weekdays: Vec<Weekday>,
    termination: Option<Termination>,
}

impl Rule {
    /// An unbounded rule firing every period of `frequency`.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            weekdays: Vec::new(),
            termination: None,
        }
    }

    /// Sets the step between periods, `1..=MAX_INTERVAL`.
    pub fn with_interval(mut self, interval: u32) -> Result<Self, RuleParseError> {
        if interval == 0 || interval > MAX_INTERVAL {
            return Err(RuleParseError::InvalidValue {
                key: "INTERVAL",
                value: interval.to_string(),
            });
        }
        self.interval = interval;
        Ok(self)
    }

    /// Restricts a weekly rule to the given weekdays. Order is kept, repeats
    /// are dropped.
    pub fn with_weekdays(
        mut self,
        weekdays: impl IntoIterator<Item = Weekday>,
    ) -> Result<Self, RuleParseError> {
        let mut unique = Vec::new();
        for day in weekdays {
            if !unique.contains(&day) {
                unique.push(day);
            }
        }
        if !unique.is_empty() && self.frequency != Frequency::Weekly {
            return Err(RuleParseError::WeekdaysRequireWeekly);
        }
        self.weekdays = unique;
        Ok(self)
    }

    pub fn with_count(mut self, count: u32) -> Result<Self, RuleParseError> {
        if count == 0 {
            return Err(RuleParseError::InvalidValue {
                key: "COUNT",
                value: count.to_string(),
            });
        }
        self.termination = Some(Termination::Count(count));
        Ok(self)
    }

    /// Bounds the rule at `until` (inclusive). Sub-second precision is
    /// dropped because the wire form cannot carry it.
    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.termination = Some(Termination::Until(until.trunc_subsecs(0)));
        self
    }

    pub fn unbounded(mut self) -> Self {
        self.termination = None;
        self
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn weekdays(&self) -> &[Weekday] {
        &self.weekdays
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Streams every occurrence at or after `anchor` that falls inside
    /// `[window_start, window_end]`, in ascending order.
    ///
    /// The returned iterator pulls dates from the rule in pages, so asking
    /// for the first few occurrences of an unbounded rule over a wide window
    /// does not expand the whole window.
    pub fn occurrences(
        &self,
        anchor: DateTime<Utc>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Occurrences {
        let anchor = anchor.trunc_subsecs(0);
        let cursor = window_start.max(anchor);
        let set = match self.termination {
            Some(Termination::Until(until)) if until < anchor => None,
            _ if cursor > window_end => None,
            _ => self.to_rrule_set(anchor),
        };

        Occurrences {
            set,
            cursor,
            window_end,
            buffer: Vec::new().into_iter(),
            exhausted: false,
        }
    }

    /// Whether `at` is one of the timestamps this rule produces from `anchor`.
    pub fn is_occurrence(&self, anchor: DateTime<Utc>, at: DateTime<Utc>) -> bool {
        self.occurrences(anchor, at, at).next() == Some(at)
    }

    /// Number of occurrences strictly before `before`.
    pub fn occurrences_before(&self, anchor: DateTime<Utc>, before: DateTime<Utc>) -> u32 {
        let end = before - Duration::seconds(1);
        let count = self.occurrences(anchor, anchor, end).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// First occurrence strictly after `after`, if the series has one.
    pub fn next_after(&self, anchor: DateTime<Utc>, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // Longest gap the grammar can produce: Feb 29 on a yearly rule.
        let horizon = i64::from(self.interval)
            .checked_mul(366 * 8)
            .and_then(Duration::try_days);
        let start = after.checked_add_signed(Duration::seconds(1))?;
        let end = horizon
            .and_then(|horizon| start.checked_add_signed(horizon))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.occurrences(anchor, start, end).next()
    }

    /// Ends the rule right before `before`.
    ///
    /// The result produces exactly the occurrences of `self` that precede
    /// `before`: a `COUNT` or `UNTIL` that already ends earlier is kept, any
    /// other bound becomes `UNTIL = before - 1s`.
    pub fn truncate(&self, anchor: DateTime<Utc>, before: DateTime<Utc>) -> Rule {
        let cutoff = (before - Duration::seconds(1)).trunc_subsecs(0);
        let keep_existing = match self.termination {
            Some(Termination::Until(until)) => until <= cutoff,
            Some(Termination::Count(_)) => self.next_after(anchor, cutoff).is_none(),
            None => false,
        };

        if keep_existing {
            self.clone()
        } else {
            self.clone().with_until(cutoff)
        }
    }

    /// Re-anchors the rule from `current_anchor` to `new_anchor`, a later
    /// occurrence of the same series.
    ///
    /// Frequency, interval, weekdays and any `UNTIL` are preserved. A `COUNT`
    /// becomes the number of occurrences still remaining at `new_anchor`;
    /// when none remain the result is empty. A weekly rule without `BYDAY`
    /// takes its weekday from whatever anchor it is evaluated against, so
    /// anchoring it on another weekday moves the series to that weekday.
    pub fn rebase(&self, current_anchor: DateTime<Utc>, new_anchor: DateTime<Utc>) -> Rule {
        match self.termination {
            Some(Termination::Count(count)) => {
                let consumed = self.occurrences_before(current_anchor, new_anchor);
                match count.checked_sub(consumed).filter(|n| *n > 0) {
                    Some(remaining) => Rule {
                        termination: Some(Termination::Count(remaining)),
                        ..self.clone()
                    },
                    None => self.clone().with_until(new_anchor - Duration::seconds(1)),
                }
            }
            _ => self.clone(),
        }
    }

    /// Checks that the expander accepts this rule when anchored at `anchor`.
    ///
    /// An `UNTIL` before the anchor is not an error here; such a rule simply
    /// produces nothing.
    pub fn validate(&self, anchor: DateTime<Utc>) -> Result<(), RuleParseError> {
        let candidate = match self.termination {
            Some(Termination::Until(_)) => self.clone().unbounded(),
            _ => self.clone(),
        };
        candidate.build_set(anchor.trunc_subsecs(0)).map(|_| ())
    }

    fn build_set(&self, anchor: DateTime<Utc>) -> Result<RRuleSet, RuleParseError> {
        let rrule_string = format!("DTSTART:{}\nRRULE:{}", anchor.format(BASIC_UTC_FORMAT), self);
        rrule_string
            .parse::<RRuleSet>()
            .map_err(|e| RuleParseError::Unexpandable(e.to_string()))
    }

    fn to_rrule_set(&self, anchor: DateTime<Utc>) -> Option<RRuleSet> {
        match self.build_set(anchor) {
            Ok(set) => Some(set),
            Err(e) => {
                warn!(rule = %self, error = %e, "recurrence rule rejected by expander");
                None
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FREQ={}", self.frequency)?;
        if self.interval != 1 {
            write!(f, ";INTERVAL={}", self.interval)?;
        }
        if !self.weekdays.is_empty() {
            let days: Vec<&str> = self.weekdays.iter().map(|d| weekday_code(*d)).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        match self.termination {
            Some(Termination::Count(count)) => write!(f, ";COUNT={}", count),
            Some(Termination::Until(until)) => write!(f, ";UNTIL={}", until.format(BASIC_UTC_FORMAT)),
            None => Ok(()),
        }
    }
}

impl FromStr for Rule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body
            .strip_prefix("RRULE:")
            .or_else(|| body.strip_prefix("rrule:"))
            .unwrap_or(body);
        if body.is_empty() {
            return Err(RuleParseError::Empty);
        }

        let mut frequency = None;
        let mut interval = None;
        let mut weekdays = None;
        let mut count = None;
        let mut until = None;

        for part in body.split(';').filter(|p| !p.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                .ok_or_else(|| RuleParseError::MalformedPart(part.to_string()))?;
            let key = key.trim().to_uppercase();
            let value = value.trim();

            let duplicate = match key.as_str() {
                "FREQ" => frequency.replace(value.parse::<Frequency>()?).is_some(),
                "INTERVAL" => interval.replace(parse_positive("INTERVAL", value)?).is_some(),
                "BYDAY" => weekdays.replace(parse_weekdays(value)?).is_some(),
                "COUNT" => count.replace(parse_positive("COUNT", value)?).is_some(),
                "UNTIL" => until.replace(parse_until(value)?).is_some(),
                _ => return Err(RuleParseError::UnknownKey(key)),
            };
            if duplicate {
                return Err(RuleParseError::DuplicateKey(key));
            }
        }

        let mut rule = Rule::new(frequency.ok_or(RuleParseError::MissingFrequency)?);
        if let Some(interval) = interval {
            rule = rule.with_interval(interval)?;
        }
        if let Some(weekdays) = weekdays {
            rule = rule.with_weekdays(weekdays)?;
        }
        match (count, until) {
            (Some(_), Some(_)) => return Err(RuleParseError::CountAndUntil),
            (Some(count), None) => rule = rule.with_count(count)?,
            (None, Some(until)) => rule = rule.with_until(until),
            (None, None) => {}
        }
        Ok(rule)
    }
}

/// Lazy, ascending sequence of rule occurrences inside one window.
///
/// Produced by [`Rule::occurrences`]. It cannot be restarted; ask the rule
/// again for a fresh sequence.
pub struct Occurrences {
    set: Option<RRuleSet>,
    /// Smallest timestamp the next page may yield.
    cursor: DateTime<Utc>,
    window_end: DateTime<Utc>,
    buffer: std::vec::IntoIter<DateTime<Utc>>,
    exhausted: bool,
}

impl Occurrences {
    fn fill(&mut self) {
        let Some(set) = &self.set else {
            self.exhausted = true;
            return;
        };
        if self.cursor > self.window_end {
            self.exhausted = true;
            return;
        }

        // Pad both bounds by a second so the result does not depend on
        // whether the expander treats them as inclusive.
        let pad = Duration::seconds(1);
        let after = self.cursor.checked_sub_signed(pad).unwrap_or(self.cursor);
        let before = self.window_end.checked_add_signed(pad).unwrap_or(self.window_end);
        let (after, before) = (after.with_timezone(&RRuleTz::UTC), before.with_timezone(&RRuleTz::UTC));
        let (dates, _) = set.clone().after(after).before(before).all(PAGE_SIZE);

        if dates.len() < usize::from(PAGE_SIZE) {
            self.exhausted = true;
        }

        let (cursor, window_end) = (self.cursor, self.window_end);
        let page: Vec<DateTime<Utc>> = dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt >= cursor && *dt <= window_end)
            .collect();

        if page.is_empty() {
            self.exhausted = true;
        }
        self.buffer = page.into_iter();
    }
}

impl Iterator for Occurrences {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(dt) = self.buffer.next() {
                self.cursor = dt.checked_add_signed(Duration::seconds(1)).unwrap_or(dt);
                return Some(dt);
            }
            if self.exhausted {
                return None;
            }
            self.fill();
        }
    }
}

impl fmt::Debug for Occurrences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Occurrences")
            .field("cursor", &self.cursor)
            .field("window_end", &self.window_end)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}

pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday(code: &str) -> Result<Weekday, RuleParseError> {
    match code.trim().to_uppercase().as_str() {
        "MO" => Ok(Weekday::Mon),
        "TU" => Ok(Weekday::Tue),
        "WE" => Ok(Weekday::Wed),
        "TH" => Ok(Weekday::Thu),
        "FR" => Ok(Weekday::Fri),
        "SA" => Ok(Weekday::Sat),
        "SU" => Ok(Weekday::Sun),
        _ => Err(RuleParseError::InvalidValue {
            key: "BYDAY",
            value: code.to_string(),
        }),
    }
}

fn parse_weekdays(value: &str) -> Result<Vec<Weekday>, RuleParseError> {
    value.split(',').map(parse_weekday).collect()
}

fn parse_positive(key: &'static str, value: &str) -> Result<u32, RuleParseError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| RuleParseError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

/// Accepts `YYYYMMDDTHHMMSSZ`, or a bare `YYYYMMDD` which bounds the series
/// through the end of that UTC day.
fn parse_until(value: &str) -> Result<DateTime<Utc>, RuleParseError> {
    let invalid = || RuleParseError::InvalidValue {
        key: "UNTIL",
        value: value.to_string(),
    };

    if value.len() == 8 {
        return NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .map(|dt| dt.and_utc())
            .ok_or_else(invalid);
    }

    NaiveDateTime::parse_from_str(value, BASIC_UTC_FORMAT)
        .map(|dt| dt.and_utc())
        .map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    mod parsing {
        use super::*;

        #[rstest]
        #[case("FREQ=DAILY", Frequency::Daily, 1)]
        #[case("FREQ=WEEKLY;INTERVAL=2", Frequency::Weekly, 2)]
        #[case("RRULE:FREQ=MONTHLY;INTERVAL=3", Frequency::Monthly, 3)]
        #[case("freq=yearly", Frequency::Yearly, 1)]
        fn parses_frequency_and_interval(
            #[case] text: &str,
            #[case] frequency: Frequency,
            #[case] interval: u32,
        ) {
            let rule: Rule = text.parse().unwrap();
            assert_eq!(rule.frequency(), frequency);
            assert_eq!(rule.interval(), interval);
            assert_eq!(rule.termination(), None);
        }

        #[test]
        fn parses_weekdays_and_count() {
            let rule: Rule = "FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=10".parse().unwrap();
            assert_eq!(rule.weekdays(), &[Weekday::Mon, Weekday::Wed, Weekday::Fri]);
            assert_eq!(rule.termination(), Some(Termination::Count(10)));
        }

        #[test]
        fn parses_until_in_both_forms() {
            let rule: Rule = "FREQ=DAILY;UNTIL=20240115T093000Z".parse().unwrap();
            assert_eq!(
                rule.termination(),
                Some(Termination::Until(Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap()))
            );

            let rule: Rule = "FREQ=DAILY;UNTIL=20240115".parse().unwrap();
            assert_eq!(
                rule.termination(),
                Some(Termination::Until(Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 59).unwrap()))
            );
        }

        #[rstest]
        #[case("", RuleParseError::Empty)]
        #[case("INTERVAL=2", RuleParseError::MissingFrequency)]
        #[case("FREQ=HOURLY", RuleParseError::InvalidValue { key: "FREQ", value: "HOURLY".into() })]
        #[case("FREQ=DAILY;INTERVAL=0", RuleParseError::InvalidValue { key: "INTERVAL", value: "0".into() })]
        #[case("FREQ=DAILY;INTERVAL=100000000;COUNT=3", RuleParseError::InvalidValue { key: "INTERVAL", value: "100000000".into() })]
        #[case("FREQ=DAILY;COUNT=-1", RuleParseError::InvalidValue { key: "COUNT", value: "-1".into() })]
        #[case("FREQ=DAILY;COUNT=3;UNTIL=20240101T000000Z", RuleParseError::CountAndUntil)]
        #[case("FREQ=DAILY;BYDAY=MO", RuleParseError::WeekdaysRequireWeekly)]
        #[case("FREQ=WEEKLY;BYDAY=MO,XX", RuleParseError::InvalidValue { key: "BYDAY", value: "XX".into() })]
        #[case("FREQ=DAILY;FREQ=WEEKLY", RuleParseError::DuplicateKey("FREQ".into()))]
        #[case("FREQ=DAILY;BYMONTHDAY=1", RuleParseError::UnknownKey("BYMONTHDAY".into()))]
        #[case("FREQ=DAILY;COUNT", RuleParseError::MalformedPart("COUNT".into()))]
        #[case("FREQ=DAILY;UNTIL=2024-01-01", RuleParseError::InvalidValue { key: "UNTIL", value: "2024-01-01".into() })]
        fn rejects_malformed_text(#[case] text: &str, #[case] expected: RuleParseError) {
            assert_eq!(text.parse::<Rule>().unwrap_err(), expected);
        }

        #[rstest]
        #[case("FREQ=DAILY")]
        #[case("FREQ=WEEKLY;INTERVAL=2;BYDAY=FR,MO")]
        #[case("FREQ=MONTHLY;COUNT=12")]
        #[case("FREQ=YEARLY;UNTIL=20301231T235959Z")]
        fn serializes_back_to_the_same_text(#[case] text: &str) {
            let rule: Rule = text.parse().unwrap();
            assert_eq!(rule.to_string(), text);
        }

        #[test]
        fn interval_is_bounded_by_the_expander() {
            assert!(Rule::new(Frequency::Daily).with_interval(MAX_INTERVAL).is_ok());
            assert!(Rule::new(Frequency::Daily).with_interval(MAX_INTERVAL + 1).is_err());
        }

        #[rstest]
        #[case("FREQ=DAILY")]
        #[case("FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=10")]
        #[case("FREQ=YEARLY;INTERVAL=65535")]
        #[case("FREQ=DAILY;UNTIL=20231231T000000Z")]
        fn expander_accepts_every_parsed_rule(#[case] text: &str) {
            let rule: Rule = text.parse().unwrap();
            assert_eq!(rule.validate(at(2024, 1, 1, 9)), Ok(()));
        }

        #[test]
        fn drops_duplicate_weekdays_but_keeps_order() {
            let rule: Rule = "FREQ=WEEKLY;BYDAY=FR,MO,FR".parse().unwrap();
            assert_eq!(rule.to_string(), "FREQ=WEEKLY;BYDAY=FR,MO");
        }
    }

    mod expansion {
        use super::*;

        #[test]
        fn daily_rule_yields_one_per_day() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, anchor, anchor + Duration::days(6))
                .collect();

            assert_eq!(dates.len(), 7);
            for pair in dates.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::hours(24));
            }
        }

        #[test]
        fn weekly_rule_matches_listed_weekdays() {
            // 2024-01-01 is a Monday.
            let anchor = at(2024, 1, 1, 10);
            let rule: Rule = "FREQ=WEEKLY;BYDAY=MO,WE,FR".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, anchor, at(2024, 1, 14, 23))
                .collect();

            assert_eq!(dates.len(), 6);
            assert!(dates
                .iter()
                .all(|d| matches!(d.weekday(), Weekday::Mon | Weekday::Wed | Weekday::Fri)));
        }

        #[test]
        fn interval_skips_periods() {
            let anchor = at(2024, 1, 1, 10);
            let rule: Rule = "FREQ=WEEKLY;INTERVAL=2".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, anchor, at(2024, 2, 1, 0))
                .collect();

            assert_eq!(dates, vec![at(2024, 1, 1, 10), at(2024, 1, 15, 10), at(2024, 1, 29, 10)]);
        }

        #[test]
        fn window_bounds_are_inclusive() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, at(2024, 1, 3, 9), at(2024, 1, 5, 9))
                .collect();

            assert_eq!(dates, vec![at(2024, 1, 3, 9), at(2024, 1, 4, 9), at(2024, 1, 5, 9)]);
        }

        #[test]
        fn count_is_measured_from_the_anchor() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;COUNT=3".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, at(2024, 1, 2, 0), at(2024, 2, 1, 0))
                .collect();

            assert_eq!(dates, vec![at(2024, 1, 2, 9), at(2024, 1, 3, 9)]);
        }

        #[test]
        fn until_stops_the_series() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;UNTIL=20240103T090000Z".parse().unwrap();
            assert_eq!(rule.occurrences(anchor, anchor, at(2024, 12, 31, 0)).count(), 3);
        }

        #[test]
        fn nothing_before_the_anchor() {
            let anchor = at(2024, 1, 10, 9);
            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            let first = rule.occurrences(anchor, at(2024, 1, 1, 0), at(2024, 1, 31, 0)).next();
            assert_eq!(first, Some(anchor));
        }

        #[test]
        fn degenerate_windows_are_empty_not_errors() {
            let anchor = at(2024, 1, 10, 9);
            let rule: Rule = "FREQ=DAILY;UNTIL=20240101T000000Z".parse().unwrap();
            assert_eq!(rule.occurrences(anchor, anchor, at(2024, 2, 1, 0)).count(), 0);

            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            assert_eq!(rule.occurrences(anchor, at(2024, 2, 1, 0), at(2024, 1, 1, 0)).count(), 0);
        }

        #[test]
        fn streams_past_a_single_page() {
            let anchor = at(2020, 1, 1, 0);
            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            let dates: Vec<_> = rule
                .occurrences(anchor, anchor, anchor + Duration::days(599))
                .collect();

            assert_eq!(dates.len(), 600);
            assert!(dates.windows(2).all(|p| p[0] < p[1]));
        }

        #[test]
        fn helpers_agree_with_expansion() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;INTERVAL=2".parse().unwrap();

            assert!(rule.is_occurrence(anchor, at(2024, 1, 5, 9)));
            assert!(!rule.is_occurrence(anchor, at(2024, 1, 4, 9)));
            assert_eq!(rule.occurrences_before(anchor, at(2024, 1, 5, 9)), 2);
            assert_eq!(rule.next_after(anchor, at(2024, 1, 5, 9)), Some(at(2024, 1, 7, 9)));
        }
    }

    mod editing {
        use super::*;

        #[test]
        fn truncate_ends_right_before_the_split() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY".parse().unwrap();
            let truncated = rule.truncate(anchor, at(2024, 1, 4, 9));

            assert_eq!(truncated.to_string(), "FREQ=DAILY;UNTIL=20240104T085959Z");
            assert_eq!(truncated.occurrences(anchor, anchor, at(2024, 2, 1, 0)).count(), 3);
        }

        #[test]
        fn truncate_replaces_a_count_that_reaches_past_the_split() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;COUNT=10".parse().unwrap();
            let truncated = rule.truncate(anchor, at(2024, 1, 4, 9));

            assert!(matches!(truncated.termination(), Some(Termination::Until(_))));
            assert_eq!(truncated.occurrences(anchor, anchor, at(2024, 2, 1, 0)).count(), 3);
        }

        #[test]
        fn truncate_never_extends_an_earlier_bound() {
            let anchor = at(2024, 1, 1, 9);
            let counted: Rule = "FREQ=DAILY;COUNT=2".parse().unwrap();
            assert_eq!(counted.truncate(anchor, at(2024, 1, 10, 9)), counted);

            let until: Rule = "FREQ=DAILY;UNTIL=20240102T090000Z".parse().unwrap();
            assert_eq!(until.truncate(anchor, at(2024, 1, 10, 9)), until);
        }

        #[test]
        fn truncate_with_the_widest_interval_does_not_overflow() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=YEARLY;INTERVAL=65535;COUNT=3".parse().unwrap();
            let truncated = rule.truncate(anchor, at(2024, 1, 2, 9));

            let dates: Vec<_> = truncated.occurrences(anchor, anchor, at(2100, 1, 1, 0)).collect();
            assert_eq!(dates, vec![anchor]);
            assert_eq!(rule.next_after(anchor, DateTime::<Utc>::MAX_UTC), None);
        }

        #[test]
        fn truncate_at_the_anchor_leaves_no_occurrences() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=WEEKLY".parse().unwrap();
            let truncated = rule.truncate(anchor, anchor);
            assert_eq!(truncated.occurrences(anchor, anchor, at(2025, 1, 1, 0)).count(), 0);
        }

        #[test]
        fn rebase_keeps_explicit_weekdays_and_until() {
            let rule: Rule = "FREQ=WEEKLY;BYDAY=TU,TH;UNTIL=20241231T000000Z".parse().unwrap();
            let rebased = rule.rebase(at(2024, 1, 2, 9), at(2024, 3, 7, 9));
            assert_eq!(rebased, rule);
        }

        #[test]
        fn rebase_carries_the_remaining_count() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;COUNT=10".parse().unwrap();
            let rebased = rule.rebase(anchor, at(2024, 1, 4, 9));

            assert_eq!(rebased.termination(), Some(Termination::Count(7)));
            let dates: Vec<_> = rebased
                .occurrences(at(2024, 1, 4, 9), at(2024, 1, 1, 0), at(2024, 12, 31, 0))
                .collect();
            assert_eq!(dates.first(), Some(&at(2024, 1, 4, 9)));
            assert_eq!(dates.last(), Some(&at(2024, 1, 10, 9)));
        }

        #[test]
        fn rebase_past_an_exhausted_count_is_empty() {
            let anchor = at(2024, 1, 1, 9);
            let rule: Rule = "FREQ=DAILY;COUNT=2".parse().unwrap();
            let rebased = rule.rebase(anchor, at(2024, 1, 5, 9));
            assert_eq!(
                rebased
                    .occurrences(at(2024, 1, 5, 9), at(2024, 1, 1, 0), at(2024, 12, 31, 0))
                    .count(),
                0
            );
        }

        #[test]
        fn implicit_weekday_follows_the_new_anchor() {
            // Monday anchor moved to a Wednesday.
            let rule: Rule = "FREQ=WEEKLY".parse().unwrap();
            let rebased = rule.rebase(at(2024, 1, 1, 9), at(2024, 1, 17, 9));

            assert_eq!(rebased.to_string(), "FREQ=WEEKLY");
            let dates: Vec<_> = rebased
                .occurrences(at(2024, 1, 17, 9), at(2024, 1, 17, 0), at(2024, 2, 1, 0))
                .collect();
            assert_eq!(dates, vec![at(2024, 1, 17, 9), at(2024, 1, 24, 9), at(2024, 1, 31, 9)]);
            assert!(dates.iter().all(|d| d.weekday() == Weekday::Wed));
        }

        #[test]
        fn rebase_on_the_same_weekday_is_a_plain_copy() {
            let rule: Rule = "FREQ=WEEKLY;INTERVAL=2".parse().unwrap();
            assert_eq!(rule.rebase(at(2024, 1, 1, 9), at(2024, 1, 15, 9)), rule);
        }
    }
}
