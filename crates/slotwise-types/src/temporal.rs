use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::TypeError;

/// Format used for per-day appointment buckets.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A payload that carries its own signing time.
///
/// Timestamps live inside the signed data rather than in transport metadata,
/// so freshness checks work the same over any transport.
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Day bucket key (`YYYY-MM-DD`, UTC) for a timestamp.
pub fn date_key(at: &DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

/// Parse a day bucket key back into a date.
pub fn parse_date_key(key: &str) -> Result<NaiveDate, TypeError> {
    NaiveDate::parse_from_str(key, DATE_FORMAT).map_err(|e| TypeError::InvalidDate(e.to_string()))
}

/// All day keys from `from` to `to`, both inclusive. Empty if `to < from`.
pub fn date_keys_between(from: NaiveDate, to: NaiveDate) -> Vec<String> {
    let mut keys = Vec::new();
    let mut day = from;
    while day <= to {
        keys.push(day.format(DATE_FORMAT).to_string());
        day += Duration::days(1);
    }
    keys
}
