//! Human readable text helpers for notifications.

/// Format a duration in seconds as days, hours and minutes.
///
/// Seconds are only shown when the duration is under a minute.
pub fn format_duration(duration_secs: u64) -> String {
    let days = duration_secs / 86_400;
    let hours = (duration_secs % 86_400) / 3_600;
    let minutes = (duration_secs % 3_600) / 60;
    let seconds = duration_secs % 60;

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, unit)| plural(value, unit))
        .collect();

    if parts.is_empty() {
        plural(seconds, "second")
    } else {
        parts.join(" ")
    }
}

fn plural(value: u64, unit: &str) -> String {
    if value == 1 {
        format!("{} {}", value, unit)
    } else {
        format!("{} {}s", value, unit)
    }
}

/// Truncate `input` to at most `length` characters, marking the cut with `...`.
pub fn truncate(input: &str, length: usize) -> String {
    if input.chars().count() <= length {
        return input.to_string();
    }
    let keep = length.saturating_sub(3);
    let mut out: String = input.chars().take(keep).collect();
    out.push_str("...");
    out
}
