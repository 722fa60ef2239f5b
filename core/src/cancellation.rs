//! Cancellation Window Guard.
//!
//! Members may cancel their own booking up to a cut-off before the session starts (60 minutes
//! unless configured otherwise). The cut-off is inclusive: exactly 60 minutes before the start
//! is still allowed. Staff cancellations through the registry are never gated by it.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Default cut-off in minutes.
pub const DEFAULT_WINDOW_MINUTES: i64 = 60;

/// Answer of the guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelWindow {
    /// Whether a member may still cancel
    pub allowed: bool,
    /// Whole minutes until the session starts, truncated toward zero. Zero in the last minute
    /// before the start, negative once the session is running
    pub minutes_until_start: i64,
    /// Whether the start instant has been reached, as opposed to merely being too close
    pub started: bool,
}

/// Guard with the default 60-minute cut-off.
///
/// `now` is the studio's local wall-clock time.
#[must_use]
pub fn can_cancel(session_date: NaiveDate, start_time: NaiveTime, now: NaiveDateTime) -> CancelWindow {
    can_cancel_within(session_date, start_time, now, DEFAULT_WINDOW_MINUTES)
}

/// Guard with a custom cut-off in minutes.
#[must_use]
pub fn can_cancel_within(
    session_date: NaiveDate,
    start_time: NaiveTime,
    now: NaiveDateTime,
    window_minutes: i64,
) -> CancelWindow {
    let until_start = session_date.and_time(start_time) - now;
    let minutes_until_start = until_start.num_minutes();
    let started = until_start <= Duration::zero();

    CancelWindow {
        allowed: !started && minutes_until_start >= window_minutes,
        minutes_until_start,
        started,
    }
}
