use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Shortest job that can be posted, in hours
pub const MIN_DURATION_HOURS: f64 = 0.5;

/// Parse a wall-clock start time in strict `HH:mm` form (00:00 - 23:59)
pub fn parse_start_time(value: &str) -> Result<NaiveTime, String> {
    let bytes = value.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(format!("Invalid start time '{}', expected HH:mm", value));
    }

    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| format!("Invalid start time '{}', expected HH:mm", value))
}

/// Derive the `[start, end)` window of a booking from the job's calendar
/// day, its `HH:mm` start time and its duration. Fractional hours are kept to
/// the second (1.5h is 90 minutes).
pub fn booking_window(
    date: NaiveDate,
    start_time: &str,
    duration_hours: f64,
) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    if !duration_hours.is_finite() || duration_hours < MIN_DURATION_HOURS {
        return Err(format!(
            "Duration must be at least {} hours",
            MIN_DURATION_HOURS
        ));
    }

    let time = parse_start_time(start_time)?;
    let start = date.and_time(time).and_utc();
    let seconds = (duration_hours * 3600.0).round() as i64;
    let end = start + Duration::seconds(seconds);

    Ok((start, end))
}

/// Half-open interval overlap: `[a_start, a_end)` and `[b_start, b_end)`
/// overlap iff `a_start < b_end && b_start < a_end`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}
