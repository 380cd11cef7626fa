//! Daily time-window arithmetic.
//!
//! A [`WindowSchedule`] is a start/end pair of wall-clock times evaluated in one
//! reference timezone. When start is later in the day than end the window wraps
//! past midnight. Evaluation is pure: callers supply the instant.

use chrono::{DateTime, Days, NaiveTime, TimeDelta, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{local_datetime, VcWardenError};

pub const MINUTES_PER_DAY: u32 = 24 * 60;
pub const MS_PER_MINUTE: u64 = 60_000;
pub const MS_PER_DAY: u64 = MINUTES_PER_DAY as u64 * MS_PER_MINUTE;
/// Added past every computed boundary so a wakeup never lands just before it.
pub const WINDOW_BOUNDARY_BUFFER_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
/// Wall-clock time of day with minute precision.
pub struct TimeOfDay {
    pub hour: u32,
    pub minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, VcWardenError> {
        let time = Self { hour, minute };
        time.validate()?;
        Ok(time)
    }

    pub fn validate(&self) -> Result<(), VcWardenError> {
        if self.hour >= 24 || self.minute >= 60 {
            return Err(VcWardenError::Config(format!(
                "time of day {:02}:{:02} is out of range",
                self.hour, self.minute
            )));
        }
        Ok(())
    }

    pub fn minute_of_day(&self) -> u32 {
        self.hour * 60 + self.minute
    }

    pub fn from_minute_of_day(minute_of_day: u32) -> Self {
        let minute_of_day = minute_of_day % MINUTES_PER_DAY;
        Self {
            hour: minute_of_day / 60,
            minute: minute_of_day % 60,
        }
    }

    /// Returns this time shifted forward by `minutes`, wrapping at midnight.
    pub fn plus_minutes(&self, minutes: u32) -> Self {
        Self::from_minute_of_day(self.minute_of_day() + minutes % MINUTES_PER_DAY)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Daily active window. Start is inclusive, end exclusive.
pub struct WindowSchedule {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl WindowSchedule {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), VcWardenError> {
        self.start.validate()?;
        self.end.validate()
    }

    /// True when the window crosses midnight.
    pub fn wraps_midnight(&self) -> bool {
        self.start.minute_of_day() > self.end.minute_of_day()
    }

    /// A zero-length window is never active.
    pub fn is_empty(&self) -> bool {
        self.start.minute_of_day() == self.end.minute_of_day()
    }

    /// Whether minute-of-day `minute` falls inside the window.
    pub fn contains_minute(&self, minute: u32) -> bool {
        let start = self.start.minute_of_day();
        let end = self.end.minute_of_day();
        if start < end {
            start <= minute && minute < end
        } else if start > end {
            minute >= start || minute < end
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `WindowPhase` values.
pub enum WindowPhase {
    Active,
    Inactive,
}

impl WindowPhase {
    pub fn from_active(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Inactive
        }
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Result of evaluating a schedule at one instant.
pub struct WindowEvaluation {
    pub phase: WindowPhase,
    /// Delay until the next boundary, including [`WINDOW_BOUNDARY_BUFFER_MS`]. Always > 0.
    pub ms_until_next_transition: u64,
    /// The boundary being waited for (`end` while active, `start` otherwise).
    pub next_boundary: TimeOfDay,
}

impl WindowEvaluation {
    pub fn is_active(&self) -> bool {
        self.phase.is_active()
    }
}

/// Evaluates `schedule` at the wall-clock instant `now`.
///
/// An empty window (`start == end`) is inactive and reports a full day until it
/// should be looked at again.
pub fn evaluate_window(now: &DateTime<Tz>, schedule: &WindowSchedule) -> WindowEvaluation {
    let now_ms_of_day = u64::from(now.num_seconds_from_midnight()) * 1_000
        + u64::from(now.nanosecond().min(999_999_999) / 1_000_000);
    let now_minute = now.hour() * 60 + now.minute();

    if schedule.is_empty() {
        return WindowEvaluation {
            phase: WindowPhase::Inactive,
            ms_until_next_transition: MS_PER_DAY + WINDOW_BOUNDARY_BUFFER_MS,
            next_boundary: schedule.start,
        };
    }

    let phase = WindowPhase::from_active(schedule.contains_minute(now_minute));
    let next_boundary = if phase.is_active() {
        schedule.end
    } else {
        schedule.start
    };
    let boundary_ms = u64::from(next_boundary.minute_of_day()) * MS_PER_MINUTE;
    let rolls_over = boundary_ms <= now_ms_of_day;
    let until_boundary = boundary_instant(now, next_boundary, rolls_over)
        .and_then(|boundary| u64::try_from((boundary - *now).num_milliseconds()).ok())
        .unwrap_or((boundary_ms + MS_PER_DAY - now_ms_of_day) % MS_PER_DAY);

    WindowEvaluation {
        phase,
        ms_until_next_transition: until_boundary + WINDOW_BOUNDARY_BUFFER_MS,
        next_boundary,
    }
}

/// Real instant of `boundary` on today's local date, or tomorrow's when `next_day`.
///
/// Delays are measured between instants, so a day with a DST shift is 23 or 25
/// hours long. A boundary inside a spring-forward gap resolves to the first
/// wall-clock time after the gap; an ambiguous one resolves to its earlier instant.
fn boundary_instant(
    now: &DateTime<Tz>,
    boundary: TimeOfDay,
    next_day: bool,
) -> Option<DateTime<Tz>> {
    let mut date = now.date_naive();
    if next_day {
        date = date.checked_add_days(Days::new(1))?;
    }
    let local = date.and_time(NaiveTime::from_hms_opt(boundary.hour, boundary.minute, 0)?);
    let timezone = now.timezone();
    timezone
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            timezone
                .from_local_datetime(&(local + TimeDelta::hours(1)))
                .earliest()
        })
}

/// Evaluates `schedule` at a Unix millisecond instant in `timezone`.
pub fn evaluate_window_at(
    now_unix_ms: u64,
    timezone: Tz,
    schedule: &WindowSchedule,
) -> Result<WindowEvaluation, VcWardenError> {
    let now = local_datetime(now_unix_ms, timezone).ok_or_else(|| {
        VcWardenError::validation(format!("timestamp {now_unix_ms} is out of range"))
    })?;
    Ok(evaluate_window(&now, schedule))
}
