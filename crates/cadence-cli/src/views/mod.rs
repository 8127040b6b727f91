pub mod table;

use chrono::{DateTime, Utc};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format(TIME_FORMAT).to_string()
}
