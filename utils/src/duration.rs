//! Duration formatting helpers.

/// Format a duration in seconds to a human-readable string.
///
/// Shows the two most significant units: `45s`, `3m 20s`, `2h 5m`, `1d 4h`,
/// `8w 0d`.
pub fn format_duration(secs: u64) -> String {
    const MINUTE: u64 = 60;
    const HOUR: u64 = 60 * MINUTE;
    const DAY: u64 = 24 * HOUR;
    const WEEK: u64 = 7 * DAY;

    match secs {
        s if s < MINUTE => format!("{s}s"),
        s if s < HOUR => format!("{}m {}s", s / MINUTE, s % MINUTE),
        s if s < DAY => format!("{}h {}m", s / HOUR, (s % HOUR) / MINUTE),
        s if s < WEEK => format!("{}d {}h", s / DAY, (s % DAY) / HOUR),
        s => format!("{}w {}d", s / WEEK, (s % WEEK) / DAY),
    }
}
