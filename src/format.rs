use chrono::{DateTime, FixedOffset, Timelike, Utc};

pub const DUE_MARKER: &str = "≤1 мин";

/// `≤1 мин` up to a minute, `MM мин` below an hour, `HH:MM` beyond.
pub fn format_arrival(seconds: u64) -> String {
    if seconds <= 60 {
        return DUE_MARKER.to_string();
    }
    let minutes = (seconds + 30) / 60;
    if minutes < 60 {
        return format!("{:02} мин", minutes);
    }
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn format_clock(now: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = now.with_timezone(&offset);
    format!("{:02}:{:02}", local.hour(), local.minute())
}
