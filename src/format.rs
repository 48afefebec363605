//! Display formatting shared by the dashboard presenters: 12-hour clock
//! times, coarse elapsed-time labels, and legend percentages.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Shown in place of a missing value.
pub const PLACEHOLDER: &str = "—";

const HOURS_PER_DAY: i64 = 24;
const HOURS_PER_WEEK: i64 = 168;
const HOURS_PER_MONTH: i64 = 730;

/// Formats an "HH:MM" (optionally ":SS") time as "H:MM AM/PM".
///
/// Missing or empty input yields the placeholder; anything that does not
/// look like a clock time is returned unchanged.
pub fn format_time_12h(time: Option<&str>) -> String {
    let raw = match time {
        Some(t) if !t.trim().is_empty() => t,
        _ => return PLACEHOLDER.to_string(),
    };

    let mut parts = raw.trim().split(':');
    let (Some(h), Some(m)) = (parts.next(), parts.next()) else {
        return raw.to_string();
    };

    let hours = match h.trim().parse::<u32>() {
        Ok(hours) if hours < 24 => hours,
        _ => return raw.to_string(),
    };
    let minutes = m.trim();
    let minutes_valid = (1..=2).contains(&minutes.len())
        && minutes.chars().all(|c| c.is_ascii_digit())
        && minutes.parse::<u32>().is_ok_and(|v| v < 60);
    if !minutes_valid {
        return raw.to_string();
    }

    let period = if hours >= 12 { "PM" } else { "AM" };
    let hour12 = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour12}:{minutes} {period}")
}

/// Coarse "time since" label: hours under a day, days under a week, weeks
/// under a month (730 h), months beyond. Future timestamps read as 0 hours.
pub fn time_passed(created_at: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(created) = created_at.and_then(parse_timestamp) else {
        return "0 hours".to_string();
    };

    let hours = (now - created).num_hours().max(0);

    if hours < HOURS_PER_DAY {
        plural(hours, "hour")
    } else if hours < HOURS_PER_WEEK {
        plural(hours / HOURS_PER_DAY, "day")
    } else if hours < HOURS_PER_MONTH {
        plural(hours / HOURS_PER_WEEK, "week")
    } else {
        plural(hours / HOURS_PER_MONTH, "month")
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Parses RFC 3339, Postgres text timestamps, naive ISO date-times (as UTC)
/// and plain dates (as UTC midnight).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// `round(value / total * 100)`, or `None` when there is nothing to divide by.
pub fn percentage_of_total(value: u64, total: u64) -> Option<u32> {
    if total == 0 {
        return None;
    }
    Some(((value as f64 / total as f64) * 100.0).round() as u32)
}
