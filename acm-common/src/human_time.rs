//! Human-readable duration formatting for task status displays

use std::time::Duration;

/// Format thresholds (seconds)
const SHORT_FORMAT_MAX: u64 = 100; // < 100s → X.Xs
const MEDIUM_FORMAT_MAX: u64 = 6000; // < 100m → M:SS
const LONG_FORMAT_MAX: u64 = 90000; // < 25h → H:MM:SS, else Dd-H:MM:SS

/// Format an elapsed duration by magnitude
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use acm_common::human_time::format_elapsed;
///
/// assert_eq!(format_elapsed(Duration::from_millis(4250)), "4.2s");
/// assert_eq!(format_elapsed(Duration::from_secs(330)), "5:30");
/// assert_eq!(format_elapsed(Duration::from_secs(7322)), "2:02:02");
/// assert_eq!(format_elapsed(Duration::from_secs(90061)), "1d-1:01:01");
/// ```
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();

    if secs < SHORT_FORMAT_MAX {
        // Truncated to tenths
        let tenths = elapsed.as_millis() / 100;
        format!("{}.{}s", tenths / 10, tenths % 10)
    } else if secs < MEDIUM_FORMAT_MAX {
        format!("{}:{:02}", secs / 60, secs % 60)
    } else if secs < LONG_FORMAT_MAX {
        format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else {
        let days = secs / 86400;
        let rest = secs % 86400;
        format!(
            "{}d-{}:{:02}:{:02}",
            days,
            rest / 3600,
            (rest % 3600) / 60,
            rest % 60
        )
    }
}
