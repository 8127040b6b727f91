use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_english::{parse_date_string, Dialect};
use chrono_tz::Tz;

/// Parses a timestamp given on the command line as UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DDTHH:MM[:SS]`, a bare
/// date (midnight) and, as a last resort, English expressions such as
/// "tomorrow 9am".
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }

    parse_date_string(input, Utc::now(), Dialect::Uk)
        .map_err(|e| anyhow::anyhow!("Failed to parse date '{}': {}", input, e))
}

pub fn parse_optional(input: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    input.map(parse_datetime).transpose()
}

/// Checks that `name` is an IANA timezone and returns it unchanged.
pub fn validate_timezone(name: &str) -> Result<String> {
    if name.parse::<Tz>().is_err() {
        bail!(
            "Invalid timezone: '{}'. Use IANA timezone names like 'Europe/Berlin'",
            name
        );
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("2024-01-05T09:00:00Z")]
    #[case("2024-01-05T10:00:00+01:00")]
    #[case("2024-01-05 09:00")]
    #[case("2024-01-05T09:00")]
    #[case("2024-01-05 09:00:00")]
    fn parses_explicit_formats(#[case] input: &str) {
        assert_eq!(
            parse_datetime(input).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn bare_date_is_midnight() {
        assert_eq!(
            parse_datetime("2024-01-05").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_datetime("the day after never").is_err());
    }

    #[test]
    fn timezone_validation() {
        assert_eq!(validate_timezone("Europe/Berlin").unwrap(), "Europe/Berlin");
        assert!(validate_timezone("Mars/Olympus").is_err());
    }
}
