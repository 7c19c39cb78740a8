use chrono::{DateTime, Utc};

use crate::error::{Result, TracelensError};

/// Width of the window used when the caller gives no lower bound.
pub const DEFAULT_WINDOW_SECS: i64 = 3600;

pub fn parse_time_or_relative_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }

    if let Ok(duration) = humantime::parse_duration(input) {
        return Ok(now
            - chrono::Duration::from_std(duration).map_err(|e| {
                TracelensError::Parse(format!("failed to parse duration to chrono: {e}"))
            })?);
    }

    Err(TracelensError::Parse(format!(
        "expected RFC3339 time or duration, got {input}"
    )))
}

/// Resolves an optional `[from, to]` pair in Unix seconds: `to` defaults to
/// `now`, `from` to one hour before `to`.
pub fn resolve_window(from: Option<i64>, to: Option<i64>, now: DateTime<Utc>) -> (i64, i64) {
    let to = to.unwrap_or_else(|| now.timestamp());
    let from = from.unwrap_or(to - DEFAULT_WINDOW_SECS);
    (from, to)
}
