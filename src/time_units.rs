use serde::Serialize;

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * SECONDS_PER_MINUTE;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// A duration broken down into display units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeUnits {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub total_seconds: i64,
    /// How many of the four units are non-zero
    pub cells_used: usize,
    pub string: String,
}

/// Splits a millisecond duration into days, hours, minutes and seconds.
///
/// The units drop partial seconds, only `total_seconds` rounds up. Negative
/// durations count as zero.
pub fn format_duration(ms: i64) -> TimeUnits {
    let ms = ms.max(0);
    let total_seconds = (ms as u64).div_ceil(1000) as i64;
    let whole_seconds = ms / 1000;

    let days = whole_seconds / SECONDS_PER_DAY;
    let hours = whole_seconds % SECONDS_PER_DAY / SECONDS_PER_HOUR;
    let minutes = whole_seconds % SECONDS_PER_HOUR / SECONDS_PER_MINUTE;
    let seconds = whole_seconds % SECONDS_PER_MINUTE;

    let parts: Vec<String> = [
        (days, "day"),
        (hours, "hour"),
        (minutes, "minute"),
        (seconds, "second"),
    ]
    .into_iter()
    .filter(|(value, _)| *value > 0)
    .map(|(value, unit)| {
        if value == 1 {
            format!("{value} {unit}")
        } else {
            format!("{value} {unit}s")
        }
    })
    .collect();

    TimeUnits {
        days,
        hours,
        minutes,
        seconds,
        total_seconds,
        cells_used: parts.len(),
        string: parts.join(", "),
    }
}
