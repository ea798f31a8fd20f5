//! Clock helpers for request logs

use chrono::{DateTime, SecondsFormat, Utc};
use std::time::{Duration, Instant};

/// Wall-clock time stamped on each request record
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// RFC3339 with millisecond precision, e.g. `2024-05-01T12:00:00.123Z`
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds elapsed since `start`
pub fn elapsed_ms(start: Instant) -> u64 {
    duration_to_ms(start.elapsed())
}
