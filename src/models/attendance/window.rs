//! Check-in window around an agenda's scheduled time.

use chrono::{Duration, NaiveDateTime};

/// Grace margin on both ends of the agenda.
pub const GRACE_MINUTES: i64 = 15;

/// `[start − 15min, end + 15min]`.
pub fn attendance_window(start: NaiveDateTime, end: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
    let grace = Duration::minutes(GRACE_MINUTES);
    (start - grace, end + grace)
}

/// Both bounds are inclusive.
pub fn is_within_window(start: NaiveDateTime, end: NaiveDateTime, now: NaiveDateTime) -> bool {
    let (opens, closes) = attendance_window(start, end);
    opens <= now && now <= closes
}
